use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::common::{created, done, ListQuery};
use crate::{
    auth::{consts as perm, AuthRouterExt, AuthUser},
    entities::permission,
    services::accounts::{
        CreateUserRequest, GroupRequest, GroupView, UpdateUserRequest, UserFilter, UserView,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize)]
pub struct PermissionQuery {
    pub module: Option<String>,
}

pub fn routes() -> Router<AppState> {
    let users_read = Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .with_permission(perm::USERS_READ);

    let users_manage = Router::new()
        .route("/users", post(create_user))
        .route("/users/:id", put(update_user))
        .route("/users/:id", delete(delete_user))
        .with_permission(perm::USERS_MANAGE);

    let groups = Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/:id",
            get(get_group).put(update_group).delete(delete_group),
        )
        .with_permission(perm::GROUPS_MANAGE);

    let permissions = Router::new()
        .route("/permissions", get(list_permissions))
        .with_permission(perm::PERMISSIONS_READ);

    Router::new()
        .merge(users_read)
        .merge(users_manage)
        .merge(groups)
        .merge(permissions)
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(ListQuery),
    responses(
        (status = 200, description = "Users listed", body = ApiResponse<PaginatedResponse<UserView>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "accounts"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<PaginatedResponse<UserView>> {
    let users = state
        .services
        .accounts
        .list_users(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(users)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User fetched", body = ApiResponse<UserView>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "accounts"
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<UserView> {
    let user = state.services.accounts.get_user(id).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserView>),
        (status = 409, description = "Username or email taken", body = crate::errors::ErrorResponse)
    ),
    tag = "accounts"
)]
pub async fn create_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>), crate::errors::ServiceError> {
    let user = state
        .services
        .accounts
        .create_user(actor.user_id, payload)
        .await?;
    Ok(created(user))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserView>),
        (status = 400, description = "Invalid change", body = crate::errors::ErrorResponse)
    ),
    tag = "accounts"
)]
pub async fn update_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<UserView> {
    let user = state
        .services
        .accounts
        .update_user(actor.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deactivated"),
        (status = 400, description = "User cannot be deleted", body = crate::errors::ErrorResponse)
    ),
    tag = "accounts"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.accounts.delete_user(actor.user_id, id).await?;
    Ok(done("User deactivated"))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups",
    params(ListQuery),
    responses(
        (status = 200, description = "Groups listed", body = ApiResponse<PaginatedResponse<GroupView>>)
    ),
    tag = "accounts"
)]
pub async fn list_groups(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<GroupView>> {
    let groups = state
        .services
        .accounts
        .list_groups(page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(groups)))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{id}",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group fetched", body = ApiResponse<GroupView>),
        (status = 404, description = "Group not found", body = crate::errors::ErrorResponse)
    ),
    tag = "accounts"
)]
pub async fn get_group(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<GroupView> {
    let group = state.services.accounts.get_group(id).await?;
    Ok(Json(ApiResponse::success(group)))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups",
    request_body = GroupRequest,
    responses(
        (status = 201, description = "Group created", body = ApiResponse<GroupView>),
        (status = 409, description = "Group name taken", body = crate::errors::ErrorResponse)
    ),
    tag = "accounts"
)]
pub async fn create_group(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<GroupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GroupView>>), crate::errors::ServiceError> {
    let group = state
        .services
        .accounts
        .create_group(actor.user_id, payload)
        .await?;
    Ok(created(group))
}

#[utoipa::path(
    put,
    path = "/api/v1/groups/{id}",
    params(("id" = Uuid, Path, description = "Group ID")),
    request_body = GroupRequest,
    responses(
        (status = 200, description = "Group updated", body = ApiResponse<GroupView>)
    ),
    tag = "accounts"
)]
pub async fn update_group(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<GroupRequest>,
) -> ApiResult<GroupView> {
    let group = state
        .services
        .accounts
        .update_group(actor.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(group)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/groups/{id}",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group deleted"),
        (status = 409, description = "Group still has members", body = crate::errors::ErrorResponse)
    ),
    tag = "accounts"
)]
pub async fn delete_group(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.accounts.delete_group(actor.user_id, id).await?;
    Ok(done("Group deleted"))
}

#[utoipa::path(
    get,
    path = "/api/v1/permissions",
    params(("module" = Option<String>, Query, description = "Only permissions of this module")),
    responses(
        (status = 200, description = "Permissions listed")
    ),
    tag = "accounts"
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Query(query): Query<PermissionQuery>,
) -> ApiResult<Vec<permission::Model>> {
    let permissions = state.services.accounts.list_permissions(query.module).await?;
    Ok(Json(ApiResponse::success(permissions)))
}
