use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::common::{created, done, ListQuery};
use crate::{
    auth::{consts as perm, AuthRouterExt, AuthUser},
    commands::requests::dispatch_request_command::DispatchRequestResult,
    entities::{request, request_history},
    errors::ServiceError,
    services::requests::{
        ApprovePayload, DispatchLinesView, DispatchPayload, RejectPayload, RequestDetailView,
        RequestFilter, RequestPayload, RequestSummary, Visibility,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

/// Requesters see their own requests; `requests:read` sees everyone's.
fn visibility(user: &AuthUser) -> Visibility {
    if user.has_permission(perm::REQUESTS_READ) {
        Visibility::All
    } else {
        Visibility::OwnOnly(user.user_id)
    }
}

pub fn routes() -> Router<AppState> {
    let read_all = Router::new()
        .route("/requests", get(list_requests))
        .with_permission(perm::REQUESTS_READ);

    let own = Router::new()
        .route("/requests", post(create_request))
        .route("/requests/mine", get(list_my_requests))
        .route("/requests/summary", get(summary))
        .route(
            "/requests/:id",
            get(get_request).put(update_request).delete(delete_request),
        )
        .route("/requests/:id/history", get(get_history))
        .with_permission(perm::REQUESTS_CREATE);

    let approve = Router::new()
        .route("/requests/:id/approve", post(approve_request))
        .with_permission(perm::REQUESTS_APPROVE);

    let reject = Router::new()
        .route("/requests/:id/reject", post(reject_request))
        .with_permission(perm::REQUESTS_REJECT);

    let dispatch = Router::new()
        .route("/requests/:id/dispatch", post(dispatch_request))
        .route("/requests/:id/lines", get(dispatch_lines))
        .with_permission(perm::REQUESTS_DISPATCH);

    Router::new()
        .merge(read_all)
        .merge(own)
        .merge(approve)
        .merge(reject)
        .merge(dispatch)
}

#[utoipa::path(
    get,
    path = "/api/v1/requests",
    params(ListQuery),
    responses(
        (status = 200, description = "Requests listed, newest first"),
        (status = 403, description = "Missing requests:read", body = crate::errors::ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<RequestFilter>,
) -> ApiResult<PaginatedResponse<request::Model>> {
    let rows = state
        .services
        .requests
        .list(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/requests/mine",
    params(ListQuery),
    responses((status = 200, description = "Requests of the caller")),
    tag = "requests"
)]
pub async fn list_my_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<ListQuery>,
    Query(filter): Query<RequestFilter>,
) -> ApiResult<PaginatedResponse<request::Model>> {
    let rows = state
        .services
        .requests
        .list_mine(user.user_id, filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/requests/summary",
    responses((status = 200, description = "Request counters", body = ApiResponse<RequestSummary>)),
    tag = "requests"
)]
pub async fn summary(State(state): State<AppState>, user: AuthUser) -> ApiResult<RequestSummary> {
    let summary = state.services.requests.summary(user.user_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request with lines and history", body = ApiResponse<RequestDetailView>),
        (status = 403, description = "Request of another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::errors::ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn get_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<RequestDetailView> {
    let view = state.services.requests.get(id, visibility(&user)).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/requests",
    request_body = RequestPayload,
    responses(
        (status = 201, description = "Request created", body = ApiResponse<RequestDetailView>),
        (status = 400, description = "Invalid lines or references", body = crate::errors::ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn create_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RequestPayload>,
) -> Result<(StatusCode, Json<ApiResponse<RequestDetailView>>), ServiceError> {
    let view = state.services.requests.create(user.user_id, payload).await?;
    Ok(created(view))
}

#[utoipa::path(
    put,
    path = "/api/v1/requests/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RequestPayload,
    responses(
        (status = 200, description = "Request updated", body = ApiResponse<RequestDetailView>),
        (status = 400, description = "Request is no longer editable", body = crate::errors::ErrorResponse),
        (status = 403, description = "Request of another user", body = crate::errors::ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn update_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RequestPayload>,
) -> ApiResult<RequestDetailView> {
    let can_change_any = user.has_permission(perm::REQUESTS_CHANGE_ANY);
    let view = state
        .services
        .requests
        .update(user.user_id, can_change_any, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/requests/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request deleted"),
        (status = 400, description = "Request is not PENDING", body = crate::errors::ErrorResponse),
        (status = 403, description = "Request of another user", body = crate::errors::ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn delete_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let can_delete_any = user.has_permission(perm::REQUESTS_DELETE_ANY);
    state
        .services
        .requests
        .delete(user.user_id, can_delete_any, id)
        .await?;
    Ok(done("Request deleted"))
}

#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}/history",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses((status = 200, description = "Status transitions, oldest first")),
    tag = "requests"
)]
pub async fn get_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<request_history::Model>> {
    let history = state.services.requests.history(id, visibility(&user)).await?;
    Ok(Json(ApiResponse::success(history)))
}

#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/approve",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = ApprovePayload,
    responses(
        (status = 200, description = "Request approved", body = ApiResponse<RequestDetailView>),
        (status = 400, description = "Already approved, final, or over-approved", body = crate::errors::ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn approve_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ApprovePayload>>,
) -> ApiResult<RequestDetailView> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let view = state
        .services
        .requests
        .approve(user.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(view).with_message("Request approved")))
}

#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/reject",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Request rejected", body = ApiResponse<RequestDetailView>),
        (status = 400, description = "Request is already final", body = crate::errors::ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn reject_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> ApiResult<RequestDetailView> {
    let view = state
        .services
        .requests
        .reject(user.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(view).with_message("Request rejected")))
}

#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/dispatch",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = DispatchPayload,
    responses(
        (status = 200, description = "Request dispatched; delivery document created"),
        (status = 400, description = "Request not approved or over-dispatched", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn dispatch_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DispatchPayload>>,
) -> ApiResult<DispatchRequestResult> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let result = state
        .services
        .requests
        .dispatch(user.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(result).with_message("Request dispatched")))
}

#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}/lines",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Lines with pending quantities and stock", body = ApiResponse<DispatchLinesView>),
        (status = 404, description = "Request not found", body = crate::errors::ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn dispatch_lines(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DispatchLinesView> {
    let view = state.services.requests.dispatch_lines(id).await?;
    Ok(Json(ApiResponse::success(view)))
}
