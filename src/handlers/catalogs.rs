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
    entities::catalog_entry,
    errors::ServiceError,
    models::CatalogKind,
    services::catalogs::{CatalogEntryRequest, CatalogFilter},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/catalogs/:kind", get(list_entries))
        .route("/catalogs/:kind/:id", get(get_entry))
        .with_permission(perm::CATALOGS_READ);

    let manage = Router::new()
        .route("/catalogs/:kind", post(create_entry))
        .route(
            "/catalogs/:kind/:id",
            axum::routing::put(update_entry).delete(delete_entry),
        )
        .with_permission(perm::CATALOGS_MANAGE);

    Router::new().merge(read).merge(manage)
}

fn parse_kind(raw: &str) -> Result<CatalogKind, ServiceError> {
    raw.parse().map_err(ServiceError::NotFound)
}

#[utoipa::path(
    get,
    path = "/api/v1/catalogs/{kind}",
    params(
        ("kind" = String, Path, description = "categories, units, brands, movement-types, request-types or reception-types"),
        ListQuery
    ),
    responses(
        (status = 200, description = "Entries listed"),
        (status = 404, description = "Unknown catalog", body = crate::errors::ErrorResponse)
    ),
    tag = "catalogs"
)]
pub async fn list_entries(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<CatalogFilter>,
) -> ApiResult<PaginatedResponse<catalog_entry::Model>> {
    let entries = state
        .services
        .catalogs
        .list(parse_kind(&kind)?, filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

#[utoipa::path(
    get,
    path = "/api/v1/catalogs/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Catalog"),
        ("id" = Uuid, Path, description = "Entry ID")
    ),
    responses(
        (status = 200, description = "Entry fetched"),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse)
    ),
    tag = "catalogs"
)]
pub async fn get_entry(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> ApiResult<catalog_entry::Model> {
    let entry = state.services.catalogs.get(parse_kind(&kind)?, id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

#[utoipa::path(
    post,
    path = "/api/v1/catalogs/{kind}",
    params(("kind" = String, Path, description = "Catalog")),
    request_body = CatalogEntryRequest,
    responses(
        (status = 201, description = "Entry created"),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "catalogs"
)]
pub async fn create_entry(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(kind): Path<String>,
    Json(payload): Json<CatalogEntryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<catalog_entry::Model>>), ServiceError> {
    let entry = state
        .services
        .catalogs
        .create(actor.user_id, parse_kind(&kind)?, payload)
        .await?;
    Ok(created(entry))
}

#[utoipa::path(
    put,
    path = "/api/v1/catalogs/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Catalog"),
        ("id" = Uuid, Path, description = "Entry ID")
    ),
    request_body = CatalogEntryRequest,
    responses((status = 200, description = "Entry updated")),
    tag = "catalogs"
)]
pub async fn update_entry(
    State(state): State<AppState>,
    actor: AuthUser,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(payload): Json<CatalogEntryRequest>,
) -> ApiResult<catalog_entry::Model> {
    let entry = state
        .services
        .catalogs
        .update(actor.user_id, parse_kind(&kind)?, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(entry)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/catalogs/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Catalog"),
        ("id" = Uuid, Path, description = "Entry ID")
    ),
    responses(
        (status = 200, description = "Entry deleted"),
        (status = 409, description = "Entry still referenced", body = crate::errors::ErrorResponse)
    ),
    tag = "catalogs"
)]
pub async fn delete_entry(
    State(state): State<AppState>,
    actor: AuthUser,
    Path((kind, id)): Path<(String, Uuid)>,
) -> ApiResult<()> {
    let kind = parse_kind(&kind)?;
    state.services.catalogs.delete(actor.user_id, kind, id).await?;
    Ok(done(format!("{} entry deleted", kind.label())))
}
