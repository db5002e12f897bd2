//! Row types as PostgREST returns them, the enums stored in text columns,
//! and the JSON request payloads.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::validation::{Validate, ValidationError, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Executive,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    Head,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DepartmentMembership {
    pub id: Uuid,
    pub department_id: Uuid,
    pub user_id: Uuid,
    pub membership_role: MembershipRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub is_system_wide: bool,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    pub author_id: Uuid,
    #[serde(default)]
    pub memo_path: Option<String>,
    #[serde(default)]
    pub memo_file_name: Option<String>,
    #[serde(default)]
    pub memo_mime_type: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Policy,
    Procedure,
    Form,
    Report,
    Training,
    Other,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Procedure => "procedure",
            Self::Form => "form",
            Self::Report => "report",
            Self::Training => "training",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "policy" => Some(Self::Policy),
            "procedure" => Some(Self::Procedure),
            "form" => Some(Self::Form),
            "report" => Some(Self::Report),
            "training" => Some(Self::Training),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: DocumentCategory,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    pub storage_path: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Submitted,
    UnderReview,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Whether a reviewer may move an incident from `self` to `next`.
    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;
        matches!(
            (self, next),
            (Submitted, UnderReview)
                | (Submitted, Closed)
                | (UnderReview, Resolved)
                | (UnderReview, Closed)
                | (Resolved, UnderReview)
                | (Resolved, Closed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Incident {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub department_id: Uuid,
    pub title: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    pub situation: String,
    pub background: String,
    pub assessment: String,
    pub recommendation: String,
    pub patient_involved: bool,
    #[serde(default)]
    pub reviewed_by: Option<Uuid>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncidentFile {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub storage_path: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageThread {
    pub id: Uuid,
    pub subject: String,
    pub created_by: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ThreadParticipant {
    pub thread_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub last_read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThreadSummary {
    #[serde(flatten)]
    pub thread: MessageThread,
    pub last_read_at: Option<DateTime<Utc>>,
    pub unread: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DailyMetric {
    pub id: Uuid,
    pub department_id: Uuid,
    pub metric_date: NaiveDate,
    pub revenue: f64,
    pub census_total: i64,
    pub census_opd: i64,
    pub census_er: i64,
    #[serde(default)]
    pub admissions: i64,
    #[serde(default)]
    pub discharges: i64,
    #[serde(default)]
    pub notes: Option<String>,
    pub entered_by: Uuid,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionEntry {
    pub id: Uuid,
    pub department_id: Uuid,
    pub entry_date: NaiveDate,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub transaction_count: i64,
    #[serde(default)]
    pub notes: Option<String>,
    pub entered_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub id: Uuid,
    #[serde(default)]
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

// Multipart forms. These describe upload bodies in the OpenAPI document;
// handlers read the parts directly from `Multipart`.

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct FileUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct DocumentUploadForm {
    pub title: String,
    pub description: Option<String>,
    pub category: DocumentCategory,
    pub department_id: Option<Uuid>,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// Request payloads

const TITLE_MAX: usize = 200;
const SBAR_MAX: usize = 5000;
const OCCURRED_AT_SKEW_MINUTES: i64 = 5;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMeRequest {
    pub full_name: String,
}

impl Validate for UpdateMeRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::required_text("full_name", &self.full_name, 120)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.role.is_none() && self.is_active.is_none() {
            return Err(ValidationError::new(
                "role",
                "at least one of role or is_active is required",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for CreateDepartmentRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::required_text("name", &self.name, 120)?;
        Validator::department_code(&self.code)?;
        Validator::optional_text("description", self.description.as_deref(), 1000)
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateDepartmentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl Validate for UpdateDepartmentRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_none()
            && self.code.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
        {
            return Err(ValidationError::new("name", "no changes supplied"));
        }
        if let Some(name) = &self.name {
            Validator::required_text("name", name, 120)?;
        }
        if let Some(code) = &self.code {
            Validator::department_code(code)?;
        }
        Validator::optional_text("description", self.description.as_deref(), 1000)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[serde(default = "default_membership_role")]
    pub membership_role: MembershipRole,
}

fn default_membership_role() -> MembershipRole {
    MembershipRole::Member
}

impl Validate for AddMemberRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.is_nil() {
            return Err(ValidationError::new("user_id", "must not be nil"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub is_system_wide: bool,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Validate for CreateAnnouncementRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::required_text("title", &self.title, TITLE_MAX)?;
        Validator::required_text("body", &self.body, 10_000)?;
        check_announcement_scope(self.is_system_wide, self.department_id)?;
        check_expiry(self.published_at.unwrap_or_else(Utc::now), self.expires_at)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAnnouncementRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub is_system_wide: Option<bool>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Validate for UpdateAnnouncementRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            Validator::required_text("title", title, TITLE_MAX)?;
        }
        if let Some(body) = &self.body {
            Validator::required_text("body", body, 10_000)?;
        }
        Ok(())
    }
}

/// A system-wide announcement has no department; any other announcement
/// belongs to exactly one.
pub fn check_announcement_scope(
    is_system_wide: bool,
    department_id: Option<Uuid>,
) -> Result<(), ValidationError> {
    match (is_system_wide, department_id) {
        (true, Some(_)) => Err(ValidationError::new(
            "department_id",
            "must be omitted for system-wide announcements",
        )),
        (false, None) => Err(ValidationError::new(
            "department_id",
            "is required unless the announcement is system-wide",
        )),
        _ => Ok(()),
    }
}

pub fn check_expiry(
    published_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match expires_at {
        Some(expires_at) if expires_at <= published_at => Err(ValidationError::new(
            "expires_at",
            "must be after published_at",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIncidentRequest {
    pub title: String,
    pub department_id: Uuid,
    pub severity: Severity,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    pub situation: String,
    pub background: String,
    pub assessment: String,
    pub recommendation: String,
    #[serde(default)]
    pub patient_involved: bool,
}

impl Validate for CreateIncidentRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::required_text("title", &self.title, TITLE_MAX)?;
        Validator::not_future_instant(
            "occurred_at",
            self.occurred_at,
            Duration::minutes(OCCURRED_AT_SKEW_MINUTES),
        )?;
        Validator::optional_text("location", self.location.as_deref(), 200)?;
        Validator::required_text("situation", &self.situation, SBAR_MAX)?;
        Validator::required_text("background", &self.background, SBAR_MAX)?;
        Validator::required_text("assessment", &self.assessment, SBAR_MAX)?;
        Validator::required_text("recommendation", &self.recommendation, SBAR_MAX)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIncidentStatusRequest {
    pub status: IncidentStatus,
    #[serde(default)]
    pub resolution_notes: Option<String>,
}

impl Validate for UpdateIncidentStatusRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::optional_text("resolution_notes", self.resolution_notes.as_deref(), SBAR_MAX)?;
        let has_notes = self
            .resolution_notes
            .as_deref()
            .is_some_and(|notes| !notes.trim().is_empty());
        if self.status == IncidentStatus::Resolved && !has_notes {
            return Err(ValidationError::new(
                "resolution_notes",
                "is required when resolving an incident",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct DailyMetricRequest {
    pub department_id: Uuid,
    pub metric_date: NaiveDate,
    pub revenue: f64,
    pub census_total: i64,
    pub census_opd: i64,
    pub census_er: i64,
    #[serde(default)]
    pub admissions: i64,
    #[serde(default)]
    pub discharges: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for DailyMetricRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::not_future_date("metric_date", self.metric_date)?;
        Validator::amount("revenue", self.revenue)?;
        Validator::non_negative("census_total", self.census_total)?;
        Validator::non_negative("census_opd", self.census_opd)?;
        Validator::non_negative("census_er", self.census_er)?;
        Validator::non_negative("admissions", self.admissions)?;
        Validator::non_negative("discharges", self.discharges)?;
        let breakdown = self.census_opd.checked_add(self.census_er);
        if breakdown.map_or(true, |sum| sum > self.census_total) {
            return Err(ValidationError::new(
                "census_total",
                "must be at least census_opd + census_er",
            ));
        }
        Validator::optional_text("notes", self.notes.as_deref(), 2000)
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TransactionRequest {
    pub department_id: Uuid,
    pub entry_date: NaiveDate,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub transaction_count: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for TransactionRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::not_future_date("entry_date", self.entry_date)?;
        Validator::required_text("category", &self.category, 100)?;
        Validator::amount("amount", self.amount)?;
        Validator::non_negative("transaction_count", self.transaction_count)?;
        Validator::optional_text("notes", self.notes.as_deref(), 2000)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateThreadRequest {
    pub subject: String,
    pub participant_ids: Vec<Uuid>,
    pub body: String,
}

impl Validate for CreateThreadRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::required_text("subject", &self.subject, TITLE_MAX)?;
        Validator::id_list("participant_ids", &self.participant_ids, 1, 50)?;
        Validator::required_text("body", &self.body, SBAR_MAX)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub body: String,
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::required_text("body", &self.body, SBAR_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_status_transitions() {
        use IncidentStatus::*;

        assert!(Submitted.can_transition_to(UnderReview));
        assert!(Submitted.can_transition_to(Closed));
        assert!(!Submitted.can_transition_to(Resolved));
        assert!(UnderReview.can_transition_to(Resolved));
        assert!(Resolved.can_transition_to(UnderReview));
        assert!(!Closed.can_transition_to(UnderReview));
        assert!(!Closed.can_transition_to(Closed));
        assert!(!UnderReview.can_transition_to(UnderReview));
    }

    #[test]
    fn enums_use_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_value(IncidentStatus::UnderReview).unwrap(),
            "under_review"
        );
        assert_eq!(serde_json::to_value(Role::Executive).unwrap(), "executive");
        let priority: Priority = serde_json::from_str("\"urgent\"").unwrap();
        assert_eq!(priority, Priority::Urgent);
    }

    #[test]
    fn document_category_parses_form_values() {
        assert_eq!(DocumentCategory::parse("policy"), Some(DocumentCategory::Policy));
        assert_eq!(DocumentCategory::parse(" training "), Some(DocumentCategory::Training));
        assert_eq!(DocumentCategory::parse("memo"), None);
    }

    fn daily(census_total: i64, census_opd: i64, census_er: i64) -> DailyMetricRequest {
        DailyMetricRequest {
            department_id: Uuid::new_v4(),
            metric_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            revenue: 1000.0,
            census_total,
            census_opd,
            census_er,
            admissions: 0,
            discharges: 0,
            notes: None,
        }
    }

    #[test]
    fn census_breakdown_cannot_exceed_total() {
        assert!(daily(10, 6, 4).validate().is_ok());
        let error = daily(10, 6, 5).validate().unwrap_err();
        assert_eq!(error.field, "census_total");
    }

    #[test]
    fn oversized_census_breakdown_is_rejected_not_overflowed() {
        let mut request = daily(5, 0, 1);
        request.census_opd = i64::MAX;
        assert!(request.validate().is_err());
    }

    #[test]
    fn counts_must_fit_an_integer_column() {
        let error = daily(5_000_000_000, 0, 0).validate().unwrap_err();
        assert_eq!(error.field, "census_total");
        assert!(daily(2_147_483_647, 0, 0).validate().is_ok());

        let transaction = TransactionRequest {
            department_id: Uuid::new_v4(),
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            category: "Pharmacy".to_string(),
            amount: 10.0,
            transaction_count: 3_000_000_000,
            notes: None,
        };
        assert_eq!(transaction.validate().unwrap_err().field, "transaction_count");
    }

    #[test]
    fn announcement_scope_invariant() {
        assert!(check_announcement_scope(true, None).is_ok());
        assert!(check_announcement_scope(false, Some(Uuid::new_v4())).is_ok());
        assert!(check_announcement_scope(true, Some(Uuid::new_v4())).is_err());
        assert!(check_announcement_scope(false, None).is_err());
    }

    #[test]
    fn expiry_must_follow_publication() {
        let now = Utc::now();
        assert!(check_expiry(now, None).is_ok());
        assert!(check_expiry(now, Some(now + Duration::days(1))).is_ok());
        assert!(check_expiry(now, Some(now)).is_err());
    }

    #[test]
    fn resolving_requires_notes() {
        let missing = UpdateIncidentStatusRequest {
            status: IncidentStatus::Resolved,
            resolution_notes: Some("  ".to_string()),
        };
        assert!(missing.validate().is_err());

        let closing = UpdateIncidentStatusRequest {
            status: IncidentStatus::Closed,
            resolution_notes: None,
        };
        assert!(closing.validate().is_ok());
    }

    #[test]
    fn thread_needs_participants() {
        let request = CreateThreadRequest {
            subject: "Bed allocation".to_string(),
            participant_ids: Vec::new(),
            body: "Can we talk?".to_string(),
        };
        assert_eq!(request.validate().unwrap_err().field, "participant_ids");
    }
}
