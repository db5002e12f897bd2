use std::fmt::Display;

use reqwest::{
    header::{HeaderMap, ACCEPT, CONTENT_RANGE},
    Client, Method, RequestBuilder, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::{
    error::{postgrest_error, RANGE_NOT_SATISFIABLE},
    SupabaseError,
};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Rows plus the exact total reported by PostgREST.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: Option<u64>,
}

/// Builder for one PostgREST request. Filters accumulate as query
/// parameters and the request is sent by one of the terminal methods.
pub struct QueryBuilder {
    http: Client,
    url: String,
    anon_key: String,
    access_token: String,
    select: Option<String>,
    params: Vec<(String, String)>,
    order: Vec<String>,
}

impl QueryBuilder {
    pub(crate) fn new(http: Client, url: String, anon_key: String, access_token: String) -> Self {
        Self {
            http,
            url,
            anon_key,
            access_token,
            select: None,
            params: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    fn filter(mut self, column: &str, operator: &str, value: impl Display) -> Self {
        self.params
            .push((column.to_string(), format!("{operator}.{value}")));
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "neq", value)
    }

    pub fn gt(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gt", value)
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn lt(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "lt", value)
    }

    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "lte", value)
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(column, "is", "null")
    }

    pub fn is_true(self, column: &str) -> Self {
        self.filter(column, "is", "true")
    }

    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        self.params
            .push((column.to_string(), format!("in.{}", in_values(values))));
        self
    }

    /// Case-insensitive substring match. PostgREST syntax characters are
    /// stripped from `term`.
    pub fn ilike_contains(self, column: &str, term: &str) -> Self {
        let cleaned: String = term
            .chars()
            .filter(|c| !matches!(c, '*' | '%' | ',' | '(' | ')' | '"' | '\\'))
            .collect();
        self.filter(column, "ilike", format!("*{}*", cleaned.trim()))
    }

    /// Logical OR of PostgREST filter expressions, e.g.
    /// `is_system_wide.is.true,department_id.in.(...)`.
    pub fn or(mut self, expression: impl Into<String>) -> Self {
        self.params
            .push(("or".to_string(), format!("({})", expression.into())));
        self
    }

    /// Logical AND of filter expressions. Needed when a query carries more
    /// than one `or(...)` group, e.g. `or(a,b),or(c,d)`.
    pub fn and(mut self, expression: impl Into<String>) -> Self {
        self.params
            .push(("and".to_string(), format!("({})", expression.into())));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{column}.{direction}"));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.params.push(("limit".to_string(), limit.to_string()));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.params.push(("offset".to_string(), offset.to_string()));
        self
    }

    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.params
            .push(("on_conflict".to_string(), columns.to_string()));
        self
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, SupabaseError> {
        let (_, body) = execute(self.request(Method::GET)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Rows plus the exact total. An offset past the last row yields an
    /// empty page instead of PostgREST's `PGRST103`.
    pub async fn fetch_page<T: DeserializeOwned>(self) -> Result<Page<T>, SupabaseError> {
        let request = self.request(Method::GET).header("Prefer", "count=exact");
        let (status, headers, body) = send(request).await?;
        let total = headers
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range);

        if !status.is_success() {
            let error = postgrest_error(status.as_u16(), &body);
            if error.code() == Some(RANGE_NOT_SATISFIABLE) {
                return Ok(Page {
                    rows: Vec::new(),
                    total,
                });
            }
            return Err(error);
        }

        Ok(Page {
            rows: serde_json::from_str(&body)?,
            total,
        })
    }

    /// Exactly one row. Zero rows surfaces as PostgREST `PGRST116`.
    pub async fn fetch_one<T: DeserializeOwned>(self) -> Result<T, SupabaseError> {
        let request = self.request(Method::GET).header(ACCEPT, SINGLE_OBJECT);
        let (_, body) = execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, SupabaseError> {
        let rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert<B, T>(self, row: &B) -> Result<T, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST)
            .header("Prefer", "return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(row);
        let (_, body) = execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn insert_many<B, T>(self, rows: &[B]) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST)
            .header("Prefer", "return=representation")
            .json(rows);
        let (_, body) = execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Insert without reading the row back, for tables the caller may write
    /// but not select.
    pub async fn insert_only<B>(self, row: &B) -> Result<(), SupabaseError>
    where
        B: Serialize + ?Sized,
    {
        let request = self
            .request(Method::POST)
            .header("Prefer", "return=minimal")
            .json(row);
        execute(request).await.map(|_| ())
    }

    /// Insert or merge on the columns given to [`QueryBuilder::on_conflict`].
    pub async fn upsert<B, T>(self, row: &B) -> Result<T, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(row);
        let (_, body) = execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Patch the single matching row and return it.
    pub async fn update<B, T>(self, changes: &B) -> Result<T, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::PATCH)
            .header("Prefer", "return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(changes);
        let (_, body) = execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Patch every matching row without reading them back.
    pub async fn update_all<B>(self, changes: &B) -> Result<(), SupabaseError>
    where
        B: Serialize + ?Sized,
    {
        let request = self
            .request(Method::PATCH)
            .header("Prefer", "return=minimal")
            .json(changes);
        execute(request).await.map(|_| ())
    }

    pub async fn delete(self) -> Result<(), SupabaseError> {
        let request = self
            .request(Method::DELETE)
            .header("Prefer", "return=minimal");
        execute(request).await.map(|_| ())
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let mut query = self.params.clone();
        if let Some(select) = &self.select {
            query.push(("select".to_string(), select.clone()));
        }
        if !self.order.is_empty() {
            query.push(("order".to_string(), self.order.join(",")));
        }

        debug!(%method, url = %self.url, "postgrest request");

        self.http
            .request(method, &self.url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
            .query(&query)
    }
}

async fn send(request: RequestBuilder) -> Result<(StatusCode, HeaderMap, String), SupabaseError> {
    let response = request.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await?;
    Ok((status, headers, body))
}

async fn execute(request: RequestBuilder) -> Result<(HeaderMap, String), SupabaseError> {
    let (status, headers, body) = send(request).await?;

    if !status.is_success() {
        return Err(postgrest_error(status.as_u16(), &body));
    }

    Ok((headers, body))
}

/// `column.in.(a,b)` expression for use inside [`QueryBuilder::or`].
pub fn in_filter<I, V>(column: &str, values: I) -> String
where
    I: IntoIterator<Item = V>,
    V: Display,
{
    format!("{column}.in.{}", in_values(values))
}

fn in_values<I, V>(values: I) -> String
where
    I: IntoIterator<Item = V>,
    V: Display,
{
    let quoted: Vec<String> = values
        .into_iter()
        .map(|value| quote_value(&value.to_string()))
        .collect();
    format!("({})", quoted.join(","))
}

fn quote_value(value: &str) -> String {
    let reserved = value
        .chars()
        .any(|c| matches!(c, ',' | '(' | ')' | '"' | '\\' | ':') || c.is_whitespace());
    if !reserved {
        return value.to_string();
    }

    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Total row count from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub fn parse_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_with_rows() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
    }

    #[test]
    fn content_range_without_rows() {
        assert_eq!(parse_content_range("*/0"), Some(0));
    }

    #[test]
    fn content_range_with_unknown_total() {
        assert_eq!(parse_content_range("0-9/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn in_filter_quotes_reserved_values() {
        assert_eq!(in_filter("code", ["ER", "ICU"]), "code.in.(ER,ICU)");
        assert_eq!(
            in_filter("category", ["labs, imaging", "say \"hi\""]),
            r#"category.in.("labs, imaging","say \"hi\"")"#
        );
    }
}
