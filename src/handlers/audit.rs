use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use super::common::ListQuery;
use crate::{
    auth::{consts as perm, AuthRouterExt},
    entities::audit_log,
    services::audit::AuditFilter,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/audit-logs", get(list_audit_logs))
        .with_permission(perm::AUDIT_READ)
}

#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    params(ListQuery, AuditFilter),
    responses(
        (status = 200, description = "Audit entries, newest first"),
        (status = 403, description = "Missing audit:read", body = crate::errors::ErrorResponse)
    ),
    tag = "audit"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<AuditFilter>,
) -> ApiResult<PaginatedResponse<audit_log::Model>> {
    let entries = state
        .services
        .audit
        .list(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}
