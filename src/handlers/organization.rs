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
    entities::org_unit,
    errors::ServiceError,
    models::OrgUnitKind,
    services::organization::{OrgUnitFilter, OrgUnitRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/org-units/:kind", get(list_units))
        .route("/org-units/:kind/:id", get(get_unit))
        .with_permission(perm::ORG_READ);

    let manage = Router::new()
        .route("/org-units/:kind", post(create_unit))
        .route(
            "/org-units/:kind/:id",
            axum::routing::put(update_unit).delete(delete_unit),
        )
        .with_permission(perm::ORG_MANAGE);

    Router::new().merge(read).merge(manage)
}

fn parse_kind(raw: &str) -> Result<OrgUnitKind, ServiceError> {
    raw.parse().map_err(ServiceError::NotFound)
}

#[utoipa::path(
    get,
    path = "/api/v1/org-units/{kind}",
    params(
        ("kind" = String, Path, description = "locations, workshops, areas or departments"),
        ListQuery
    ),
    responses(
        (status = 200, description = "Units listed"),
        (status = 404, description = "Unknown kind", body = crate::errors::ErrorResponse)
    ),
    tag = "organization"
)]
pub async fn list_units(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<OrgUnitFilter>,
) -> ApiResult<PaginatedResponse<org_unit::Model>> {
    let units = state
        .services
        .organization
        .list(parse_kind(&kind)?, filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(units)))
}

#[utoipa::path(
    get,
    path = "/api/v1/org-units/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Unit kind"),
        ("id" = Uuid, Path, description = "Unit ID")
    ),
    responses(
        (status = 200, description = "Unit fetched"),
        (status = 404, description = "Unit not found", body = crate::errors::ErrorResponse)
    ),
    tag = "organization"
)]
pub async fn get_unit(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> ApiResult<org_unit::Model> {
    let unit = state.services.organization.get(parse_kind(&kind)?, id).await?;
    Ok(Json(ApiResponse::success(unit)))
}

#[utoipa::path(
    post,
    path = "/api/v1/org-units/{kind}",
    params(("kind" = String, Path, description = "Unit kind")),
    request_body = OrgUnitRequest,
    responses(
        (status = 201, description = "Unit created"),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "organization"
)]
pub async fn create_unit(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(kind): Path<String>,
    Json(payload): Json<OrgUnitRequest>,
) -> Result<(StatusCode, Json<ApiResponse<org_unit::Model>>), ServiceError> {
    let unit = state
        .services
        .organization
        .create(actor.user_id, parse_kind(&kind)?, payload)
        .await?;
    Ok(created(unit))
}

#[utoipa::path(
    put,
    path = "/api/v1/org-units/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Unit kind"),
        ("id" = Uuid, Path, description = "Unit ID")
    ),
    request_body = OrgUnitRequest,
    responses((status = 200, description = "Unit updated")),
    tag = "organization"
)]
pub async fn update_unit(
    State(state): State<AppState>,
    actor: AuthUser,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(payload): Json<OrgUnitRequest>,
) -> ApiResult<org_unit::Model> {
    let unit = state
        .services
        .organization
        .update(actor.user_id, parse_kind(&kind)?, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(unit)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/org-units/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Unit kind"),
        ("id" = Uuid, Path, description = "Unit ID")
    ),
    responses(
        (status = 200, description = "Unit deleted"),
        (status = 409, description = "Unit still referenced", body = crate::errors::ErrorResponse)
    ),
    tag = "organization"
)]
pub async fn delete_unit(
    State(state): State<AppState>,
    actor: AuthUser,
    Path((kind, id)): Path<(String, Uuid)>,
) -> ApiResult<()> {
    let kind = parse_kind(&kind)?;
    state
        .services
        .organization
        .delete(actor.user_id, kind, id)
        .await?;
    Ok(done(format!("{} deleted", kind.slug())))
}
