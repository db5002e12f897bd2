//! Daily department metrics, transaction entries and the month-over-month
//! summary computed from them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use wardline_supabase::{Page, QueryBuilder, SupabaseError};

use crate::pagination::Pagination;
use crate::routes::models::{DailyMetric, DailyMetricRequest, TransactionEntry, TransactionRequest};
use crate::services::{access::Access, audit::AuditLog, ServiceError};
use crate::state::Session;
use crate::validation::{ValidationError, Validator};

pub const DEFAULT_SUMMARY_MONTHS: u32 = 6;
pub const MAX_SUMMARY_MONTHS: u32 = 24;
const FETCH_CHUNK: u64 = 1000;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MetricFilters {
    pub department_id: Option<Uuid>,
    /// Inclusive lower bound (`YYYY-MM-DD`).
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound (`YYYY-MM-DD`).
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryParams {
    pub department_id: Option<Uuid>,
    /// Number of calendar months, 1 to 24. Defaults to 6.
    pub months: Option<u32>,
    /// Last month of the window as `YYYY-MM`. Defaults to the current month.
    pub end_month: Option<String>,
}

#[derive(Debug, Serialize)]
struct DailyMetricUpsert<'a> {
    #[serde(flatten)]
    values: &'a DailyMetricRequest,
    entered_by: Uuid,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct NewTransaction<'a> {
    #[serde(flatten)]
    values: &'a TransactionRequest,
    entered_by: Uuid,
}

pub async fn upsert_daily(
    session: &Session,
    req: DailyMetricRequest,
) -> Result<DailyMetric, ServiceError> {
    session.access.require_contribute(req.department_id)?;

    let row = DailyMetricUpsert {
        values: &req,
        entered_by: session.user_id(),
        updated_at: Utc::now(),
    };
    let metric: DailyMetric = session
        .db
        .from("department_metrics_daily")
        .on_conflict("department_id,metric_date")
        .upsert(&row)
        .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "metrics.daily_upsert",
        "department_metrics_daily",
        Some(metric.id.to_string()),
        json!({
            "department_id": metric.department_id,
            "metric_date": metric.metric_date,
        }),
    )
    .await;

    Ok(metric)
}

/// Narrow a metrics list to `department_id` if given, otherwise to what the
/// caller may see. `None` means the caller can see nothing.
fn scope_list(
    access: &Access,
    department_id: Option<Uuid>,
    query: QueryBuilder,
) -> Result<Option<QueryBuilder>, ServiceError> {
    if let Some(department_id) = department_id {
        access.require_view(department_id)?;
        return Ok(Some(query.eq("department_id", department_id)));
    }

    match access.visible_departments() {
        None => Ok(Some(query)),
        Some(departments) if departments.is_empty() => Ok(None),
        Some(departments) => Ok(Some(query.in_list("department_id", departments))),
    }
}

pub async fn list_daily(
    session: &Session,
    filters: &MetricFilters,
    pagination: Pagination,
) -> Result<Page<DailyMetric>, ServiceError> {
    Validator::date_range(filters.from, filters.to)?;

    let query = session.db.from("department_metrics_daily").select("*");
    let Some(mut query) = scope_list(&session.access, filters.department_id, query)? else {
        return Ok(Page {
            rows: Vec::new(),
            total: Some(0),
        });
    };
    if let Some(from) = filters.from {
        query = query.gte("metric_date", from);
    }
    if let Some(to) = filters.to {
        query = query.lte("metric_date", to);
    }

    Ok(pagination
        .apply(query.order("metric_date", false))
        .fetch_page()
        .await?)
}

pub async fn create_transaction(
    session: &Session,
    req: TransactionRequest,
) -> Result<TransactionEntry, ServiceError> {
    session.access.require_contribute(req.department_id)?;

    let row = NewTransaction {
        values: &req,
        entered_by: session.user_id(),
    };
    let entry: TransactionEntry = session
        .db
        .from("transaction_category_entries")
        .insert(&row)
        .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "metrics.transaction_create",
        "transaction_category_entries",
        Some(entry.id.to_string()),
        json!({
            "department_id": entry.department_id,
            "entry_date": entry.entry_date,
            "category": entry.category,
        }),
    )
    .await;

    Ok(entry)
}

pub async fn list_transactions(
    session: &Session,
    filters: &MetricFilters,
    pagination: Pagination,
) -> Result<Page<TransactionEntry>, ServiceError> {
    Validator::date_range(filters.from, filters.to)?;

    let query = session.db.from("transaction_category_entries").select("*");
    let Some(mut query) = scope_list(&session.access, filters.department_id, query)? else {
        return Ok(Page {
            rows: Vec::new(),
            total: Some(0),
        });
    };
    if let Some(from) = filters.from {
        query = query.gte("entry_date", from);
    }
    if let Some(to) = filters.to {
        query = query.lte("entry_date", to);
    }

    Ok(pagination
        .apply(query.order("entry_date", false).order("created_at", false))
        .fetch_page()
        .await?)
}

// Summary

/// Contiguous run of calendar months ending at `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    start: NaiveDate,
    end: NaiveDate,
    months: u32,
}

impl MonthWindow {
    pub fn resolve(
        months: Option<u32>,
        end_month: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let months = months.unwrap_or(DEFAULT_SUMMARY_MONTHS);
        if !(1..=MAX_SUMMARY_MONTHS).contains(&months) {
            return Err(ValidationError::new(
                "months",
                format!("must be between 1 and {MAX_SUMMARY_MONTHS}"),
            ));
        }

        let end = match end_month {
            Some(value) => parse_month(value)?,
            None => first_of_month(today),
        };
        let start = end
            .checked_sub_months(Months::new(months - 1))
            .ok_or_else(|| ValidationError::new("end_month", "is out of range"))?;

        Ok(Self { start, end, months })
    }

    pub fn first_day(&self) -> NaiveDate {
        self.start
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn month_starts(&self) -> Vec<NaiveDate> {
        (0..self.months)
            .filter_map(|offset| self.start.checked_add_months(Months::new(offset)))
            .collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day() && date <= self.last_day()
    }
}

fn parse_month(value: &str) -> Result<NaiveDate, ValidationError> {
    let invalid = || ValidationError::new("end_month", "must be formatted as YYYY-MM");
    let trimmed = value.trim();
    if trimmed.len() != 7 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d").map_err(|_| invalid())
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricSample {
    pub metric_date: NaiveDate,
    pub revenue: f64,
    pub census_total: i64,
    pub census_opd: i64,
    pub census_er: i64,
    #[serde(default)]
    pub admissions: i64,
    #[serde(default)]
    pub discharges: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionSample {
    pub entry_date: NaiveDate,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub transaction_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
    pub transaction_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthSummary {
    /// `YYYY-MM`
    pub month: String,
    pub days_reported: u32,
    pub revenue: f64,
    pub census_total: i64,
    pub census_opd: i64,
    pub census_er: i64,
    pub admissions: i64,
    pub discharges: i64,
    pub average_daily_census: f64,
    /// Percent change against the previous month; null when that month is
    /// zero or outside the window.
    pub revenue_change_pct: Option<f64>,
    pub census_change_pct: Option<f64>,
    pub transactions: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SummaryTotals {
    pub days_reported: u32,
    pub revenue: f64,
    pub census_total: i64,
    pub census_opd: i64,
    pub census_er: i64,
    pub admissions: i64,
    pub discharges: i64,
    pub average_daily_census: f64,
    pub transactions: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryScopeKind {
    Department,
    Hospital,
    Memberships,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsSummary {
    pub scope: SummaryScopeKind,
    pub department_ids: Vec<Uuid>,
    pub start_month: String,
    pub end_month: String,
    pub months: Vec<MonthSummary>,
    pub totals: SummaryTotals,
}

#[derive(Debug, Default)]
struct Bucket {
    days: BTreeSet<NaiveDate>,
    revenue: f64,
    census_total: i64,
    census_opd: i64,
    census_er: i64,
    admissions: i64,
    discharges: i64,
    categories: BTreeMap<String, (f64, i64)>,
}

impl Bucket {
    fn absorb_metric(&mut self, sample: &MetricSample) {
        self.days.insert(sample.metric_date);
        self.revenue += sample.revenue;
        self.census_total += sample.census_total;
        self.census_opd += sample.census_opd;
        self.census_er += sample.census_er;
        self.admissions += sample.admissions;
        self.discharges += sample.discharges;
    }

    fn absorb_transaction(&mut self, sample: &TransactionSample) {
        let entry = self
            .categories
            .entry(sample.category.trim().to_string())
            .or_insert((0.0, 0));
        entry.0 += sample.amount;
        entry.1 += sample.transaction_count;
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn change_pct(previous: f64, current: f64) -> Option<f64> {
    (previous > 0.0).then(|| round2((current - previous) / previous * 100.0))
}

fn average(total: i64, days: u32) -> f64 {
    if days == 0 {
        0.0
    } else {
        round2(total as f64 / f64::from(days))
    }
}

fn category_totals(categories: &BTreeMap<String, (f64, i64)>) -> Vec<CategoryTotal> {
    categories
        .iter()
        .map(|(category, (amount, count))| CategoryTotal {
            category: category.clone(),
            amount: round2(*amount),
            transaction_count: *count,
        })
        .collect()
}

/// Fold raw rows into one entry per month of `window`. Months without rows
/// are reported as zeros; rows outside the window are ignored.
pub fn summarize(
    window: &MonthWindow,
    metrics: &[MetricSample],
    transactions: &[TransactionSample],
) -> (Vec<MonthSummary>, SummaryTotals) {
    let mut buckets: BTreeMap<NaiveDate, Bucket> = window
        .month_starts()
        .into_iter()
        .map(|month| (month, Bucket::default()))
        .collect();

    for sample in metrics.iter().filter(|s| window.contains(s.metric_date)) {
        if let Some(bucket) = buckets.get_mut(&first_of_month(sample.metric_date)) {
            bucket.absorb_metric(sample);
        }
    }
    for sample in transactions.iter().filter(|s| window.contains(s.entry_date)) {
        if let Some(bucket) = buckets.get_mut(&first_of_month(sample.entry_date)) {
            bucket.absorb_transaction(sample);
        }
    }

    let mut months = Vec::with_capacity(buckets.len());
    let mut totals = Bucket::default();
    let mut previous: Option<(f64, i64)> = None;

    for (month, bucket) in &buckets {
        let days_reported = bucket.days.len() as u32;
        months.push(MonthSummary {
            month: month.format("%Y-%m").to_string(),
            days_reported,
            revenue: round2(bucket.revenue),
            census_total: bucket.census_total,
            census_opd: bucket.census_opd,
            census_er: bucket.census_er,
            admissions: bucket.admissions,
            discharges: bucket.discharges,
            average_daily_census: average(bucket.census_total, days_reported),
            revenue_change_pct: previous.and_then(|(revenue, _)| change_pct(revenue, bucket.revenue)),
            census_change_pct: previous
                .and_then(|(_, census)| change_pct(census as f64, bucket.census_total as f64)),
            transactions: category_totals(&bucket.categories),
        });
        previous = Some((bucket.revenue, bucket.census_total));

        totals.days.extend(bucket.days.iter().copied());
        totals.revenue += bucket.revenue;
        totals.census_total += bucket.census_total;
        totals.census_opd += bucket.census_opd;
        totals.census_er += bucket.census_er;
        totals.admissions += bucket.admissions;
        totals.discharges += bucket.discharges;
        for (category, (amount, count)) in &bucket.categories {
            let entry = totals.categories.entry(category.clone()).or_insert((0.0, 0));
            entry.0 += amount;
            entry.1 += count;
        }
    }

    let days_reported = totals.days.len() as u32;
    let summary = SummaryTotals {
        days_reported,
        revenue: round2(totals.revenue),
        census_total: totals.census_total,
        census_opd: totals.census_opd,
        census_er: totals.census_er,
        admissions: totals.admissions,
        discharges: totals.discharges,
        average_daily_census: average(totals.census_total, days_reported),
        transactions: category_totals(&totals.categories),
    };

    (months, summary)
}

enum SummaryScope {
    Department(Uuid),
    Hospital,
    Memberships(Vec<Uuid>),
}

impl SummaryScope {
    fn resolve(access: &Access, department_id: Option<Uuid>) -> Result<Self, ServiceError> {
        if let Some(department_id) = department_id {
            access.require_view(department_id)?;
            return Ok(Self::Department(department_id));
        }
        if access.is_org_wide() {
            return Ok(Self::Hospital);
        }

        let departments = access.department_ids();
        if departments.is_empty() {
            return Err(ServiceError::forbidden(
                "metrics summary requires a department membership",
            ));
        }
        Ok(Self::Memberships(departments))
    }

    fn apply(&self, query: QueryBuilder) -> QueryBuilder {
        match self {
            Self::Department(id) => query.eq("department_id", id),
            Self::Hospital => query,
            Self::Memberships(ids) => query.in_list("department_id", ids),
        }
    }

    fn kind(&self) -> SummaryScopeKind {
        match self {
            Self::Department(_) => SummaryScopeKind::Department,
            Self::Hospital => SummaryScopeKind::Hospital,
            Self::Memberships(_) => SummaryScopeKind::Memberships,
        }
    }

    fn department_ids(&self) -> Vec<Uuid> {
        match self {
            Self::Department(id) => vec![*id],
            Self::Hospital => Vec::new(),
            Self::Memberships(ids) => ids.clone(),
        }
    }
}

/// Page through every row a query matches. PostgREST caps responses at its
/// `max-rows` setting so a single request may come back short.
async fn fetch_all<T, F>(build: F) -> Result<Vec<T>, SupabaseError>
where
    T: DeserializeOwned,
    F: Fn() -> QueryBuilder,
{
    let mut rows = Vec::new();
    let mut offset = 0;
    loop {
        let chunk: Vec<T> = build().limit(FETCH_CHUNK).offset(offset).fetch().await?;
        let fetched = chunk.len() as u64;
        rows.extend(chunk);
        if fetched < FETCH_CHUNK {
            return Ok(rows);
        }
        offset += FETCH_CHUNK;
    }
}

pub async fn summary(
    session: &Session,
    params: &SummaryParams,
) -> Result<MetricsSummary, ServiceError> {
    let window = MonthWindow::resolve(
        params.months,
        params.end_month.as_deref(),
        Utc::now().date_naive(),
    )?;
    let scope = SummaryScope::resolve(&session.access, params.department_id)?;

    let metrics: Vec<MetricSample> = fetch_all(|| {
        scope.apply(
            session
                .db
                .from("department_metrics_daily")
                .select(
                    "metric_date,revenue,census_total,census_opd,census_er,admissions,discharges",
                )
                .gte("metric_date", window.first_day())
                .lte("metric_date", window.last_day())
                .order("metric_date", true)
                .order("id", true),
        )
    })
    .await?;

    let transactions: Vec<TransactionSample> = fetch_all(|| {
        scope.apply(
            session
                .db
                .from("transaction_category_entries")
                .select("entry_date,category,amount,transaction_count")
                .gte("entry_date", window.first_day())
                .lte("entry_date", window.last_day())
                .order("entry_date", true)
                .order("id", true),
        )
    })
    .await?;

    tracing::debug!(
        metrics = metrics.len(),
        transactions = transactions.len(),
        months = window.months,
        "computing metrics summary"
    );

    let (months, totals) = summarize(&window, &metrics, &transactions);
    Ok(MetricsSummary {
        scope: scope.kind(),
        department_ids: scope.department_ids(),
        start_month: window.first_day().format("%Y-%m").to_string(),
        end_month: window.end.format("%Y-%m").to_string(),
        months,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn metric(on: NaiveDate, revenue: f64, census_total: i64) -> MetricSample {
        MetricSample {
            metric_date: on,
            revenue,
            census_total,
            census_opd: census_total / 2,
            census_er: census_total / 4,
            admissions: 1,
            discharges: 1,
        }
    }

    fn transaction(on: NaiveDate, category: &str, amount: f64) -> TransactionSample {
        TransactionSample {
            entry_date: on,
            category: category.to_string(),
            amount,
            transaction_count: 2,
        }
    }

    #[test]
    fn window_defaults_to_six_months_ending_this_month() {
        let window = MonthWindow::resolve(None, None, date(2024, 3, 17)).unwrap();
        assert_eq!(window.first_day(), date(2023, 10, 1));
        assert_eq!(window.last_day(), date(2024, 3, 31));
        assert_eq!(window.month_starts().len(), 6);
    }

    #[test]
    fn window_respects_end_month_and_leap_years() {
        let window = MonthWindow::resolve(Some(2), Some("2024-02"), date(2024, 6, 1)).unwrap();
        assert_eq!(window.first_day(), date(2024, 1, 1));
        assert_eq!(window.last_day(), date(2024, 2, 29));
    }

    #[test]
    fn window_rejects_bad_input() {
        let today = date(2024, 6, 1);
        assert_eq!(
            MonthWindow::resolve(Some(0), None, today).unwrap_err().field,
            "months"
        );
        assert_eq!(
            MonthWindow::resolve(Some(25), None, today).unwrap_err().field,
            "months"
        );
        assert_eq!(
            MonthWindow::resolve(None, Some("2024-13"), today).unwrap_err().field,
            "end_month"
        );
        assert!(MonthWindow::resolve(None, Some("March"), today).is_err());
    }

    #[test]
    fn months_are_contiguous_and_zero_filled() {
        let window = MonthWindow::resolve(Some(3), Some("2024-03"), date(2024, 3, 31)).unwrap();
        let metrics = vec![metric(date(2024, 3, 2), 500.0, 40)];

        let (months, totals) = summarize(&window, &metrics, &[]);

        let labels: Vec<&str> = months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(months[0].days_reported, 0);
        assert_eq!(months[0].revenue, 0.0);
        assert_eq!(months[0].average_daily_census, 0.0);
        assert_eq!(months[2].revenue, 500.0);
        assert_eq!(totals.days_reported, 1);
    }

    #[test]
    fn change_pct_is_null_without_a_baseline() {
        let window = MonthWindow::resolve(Some(3), Some("2024-03"), date(2024, 3, 31)).unwrap();
        let metrics = vec![
            metric(date(2024, 2, 1), 1000.0, 100),
            metric(date(2024, 3, 1), 1500.0, 80),
        ];

        let (months, _) = summarize(&window, &metrics, &[]);

        // January is first in the window, February follows an empty month.
        assert_eq!(months[0].revenue_change_pct, None);
        assert_eq!(months[1].revenue_change_pct, None);
        assert_eq!(months[2].revenue_change_pct, Some(50.0));
        assert_eq!(months[2].census_change_pct, Some(-20.0));
    }

    #[test]
    fn departments_reporting_the_same_day_count_once() {
        let window = MonthWindow::resolve(Some(1), Some("2024-03"), date(2024, 3, 31)).unwrap();
        let metrics = vec![
            metric(date(2024, 3, 1), 100.0, 30),
            metric(date(2024, 3, 1), 200.0, 50),
            metric(date(2024, 3, 2), 300.0, 40),
        ];

        let (months, totals) = summarize(&window, &metrics, &[]);

        assert_eq!(months[0].days_reported, 2);
        assert_eq!(months[0].census_total, 120);
        assert_eq!(months[0].average_daily_census, 60.0);
        assert_eq!(totals.revenue, 600.0);
    }

    #[test]
    fn transactions_are_totalled_per_category() {
        let window = MonthWindow::resolve(Some(2), Some("2024-03"), date(2024, 3, 31)).unwrap();
        let transactions = vec![
            transaction(date(2024, 2, 10), "pharmacy", 10.5),
            transaction(date(2024, 3, 10), "pharmacy", 20.25),
            transaction(date(2024, 3, 11), "laboratory", 5.0),
            transaction(date(2023, 12, 31), "pharmacy", 999.0),
        ];

        let (months, totals) = summarize(&window, &[], &transactions);

        assert_eq!(months[0].transactions.len(), 1);
        assert_eq!(
            months[1].transactions,
            vec![
                CategoryTotal {
                    category: "laboratory".to_string(),
                    amount: 5.0,
                    transaction_count: 2,
                },
                CategoryTotal {
                    category: "pharmacy".to_string(),
                    amount: 20.25,
                    transaction_count: 2,
                },
            ]
        );
        let pharmacy = totals
            .transactions
            .iter()
            .find(|t| t.category == "pharmacy")
            .unwrap();
        assert_eq!(pharmacy.amount, 30.75);
        assert_eq!(pharmacy.transaction_count, 4);
    }

    #[test]
    fn staff_without_departments_cannot_summarise() {
        use crate::routes::models::Role;

        let access = Access::new(Role::Staff, Vec::new());
        assert!(matches!(
            SummaryScope::resolve(&access, None),
            Err(ServiceError::Forbidden(_))
        ));

        let executive = Access::new(Role::Executive, Vec::new());
        assert!(matches!(
            SummaryScope::resolve(&executive, None),
            Ok(SummaryScope::Hospital)
        ));
    }
}
