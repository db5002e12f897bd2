use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    pagination::{PageParams, Paginated, Pagination},
    routes::models::{DailyMetric, DailyMetricRequest, TransactionEntry, TransactionRequest},
    services::metrics::{self as metrics_service, MetricFilters, MetricsSummary, SummaryParams},
    util::require_bearer,
    validation::ValidJson,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyMetricResponse {
    pub metric: DailyMetric,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub transaction: TransactionEntry,
}

#[utoipa::path(
    post,
    path = "/api/metrics/daily",
    tag = "Metrics",
    security(("bearerAuth" = [])),
    request_body = DailyMetricRequest,
    responses(
        (status = 200, description = "Daily figures recorded; replaces any earlier entry for that date", body = DailyMetricResponse),
        (status = 400, description = "Invalid figures", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a member of this department", body = crate::error::ErrorResponse)
    )
)]
pub async fn upsert_daily(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<DailyMetricRequest>,
) -> Result<Json<DailyMetricResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let metric = metrics_service::upsert_daily(&session, req).await?;
    Ok(Json(DailyMetricResponse { metric }))
}

#[utoipa::path(
    get,
    path = "/api/metrics/daily",
    tag = "Metrics",
    security(("bearerAuth" = [])),
    params(PageParams, MetricFilters),
    responses(
        (status = 200, description = "Daily figures, newest first", body = crate::pagination::DailyMetricPage),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a member of this department", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_daily(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
    Query(filters): Query<MetricFilters>,
) -> Result<Json<Paginated<DailyMetric>>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let metrics = metrics_service::list_daily(&session, &filters, pagination).await?;
    Ok(Json(pagination.wrap(metrics)))
}

#[utoipa::path(
    post,
    path = "/api/metrics/transactions",
    tag = "Metrics",
    security(("bearerAuth" = [])),
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction recorded", body = TransactionResponse),
        (status = 400, description = "Invalid transaction", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a member of this department", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<TransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let transaction = metrics_service::create_transaction(&session, req).await?;
    Ok((StatusCode::CREATED, Json(TransactionResponse { transaction })))
}

#[utoipa::path(
    get,
    path = "/api/metrics/transactions",
    tag = "Metrics",
    security(("bearerAuth" = [])),
    params(PageParams, MetricFilters),
    responses(
        (status = 200, description = "Transactions, newest first", body = crate::pagination::TransactionPage),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a member of this department", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
    Query(filters): Query<MetricFilters>,
) -> Result<Json<Paginated<TransactionEntry>>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let transactions = metrics_service::list_transactions(&session, &filters, pagination).await?;
    Ok(Json(pagination.wrap(transactions)))
}

#[utoipa::path(
    get,
    path = "/api/metrics/summary",
    tag = "Metrics",
    security(("bearerAuth" = [])),
    params(SummaryParams),
    responses(
        (status = 200, description = "Monthly totals with month-over-month change", body = MetricsSummary),
        (status = 400, description = "Invalid month window", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a member of this department", body = crate::error::ErrorResponse)
    )
)]
pub async fn summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SummaryParams>,
) -> Result<Json<MetricsSummary>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let summary = metrics_service::summary(&session, &params).await?;
    Ok(Json(summary))
}
