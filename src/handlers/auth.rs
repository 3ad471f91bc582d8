use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use super::common::done;
use crate::{
    auth::{AuthRouterExt, AuthUser},
    services::accounts::{ChangePasswordRequest, LoginRequest, LoginResponse, UserView},
    ApiResponse, ApiResult, AppState,
};

/// Routes for the caller's own account; any authenticated user may use them.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/password", post(change_password))
        .with_auth()
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
        (status = 403, description = "Account disabled", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = state.services.accounts.login(payload).await?;
    Ok(Json(ApiResponse::success(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserView>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<UserView> {
    let view = state.services.accounts.get_user(user.user_id).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Current password is wrong", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    state
        .services
        .accounts
        .change_password(user.user_id, payload)
        .await?;
    Ok(done("Password changed"))
}
