pub mod access;
pub mod announcement;
pub mod audit;
pub mod department;
pub mod document;
pub mod error;
pub mod incident;
pub mod messaging;
pub mod metrics;
pub mod profile;
pub mod uploads;
pub mod watermark;

pub use error::*;

use chrono::{DateTime, SecondsFormat, Utc};

/// Search text reduced to characters that are safe inside a PostgREST
/// `or=(...)` expression. `None` when nothing searchable remains.
pub(crate) fn search_term(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '*' | '%' | ',' | '(' | ')' | '"' | '\\' | ':' | '.'))
        .collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Timestamp quoted for use as a value inside `or=(...)`.
pub(crate) fn quoted_timestamp(at: DateTime<Utc>) -> String {
    format!("\"{}\"", at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_term_strips_filter_syntax() {
        assert_eq!(search_term("  ward (a),b* "), Some("ward ab".to_string()));
        assert_eq!(search_term("*%"), None);
    }

    #[test]
    fn quoted_timestamp_is_rfc3339_utc() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(quoted_timestamp(at), "\"2024-05-01T10:00:00Z\"");
    }
}
