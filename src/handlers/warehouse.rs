use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use super::common::{created, done, ListQuery};
use crate::{
    auth::{consts as perm, AuthRouterExt, AuthUser},
    entities::{article, asset, delivery, movement, warehouse},
    errors::ServiceError,
    services::warehouse::{
        ArticleFilter, ArticleRequest, AssetFilter, AssetRequest, DeliveryDetail, DeliveryFilter,
        DeliveryRequest, MovementFilter, MovementRequest, WarehouseFilter, WarehouseRequest,
        WarehouseSummary,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/warehouses", get(list_warehouses))
        .route("/warehouses/:id", get(get_warehouse))
        .route("/articles", get(list_articles))
        .route("/articles/:id", get(get_article))
        .route("/assets", get(list_assets))
        .route("/assets/:id", get(get_asset))
        .route("/movements", get(list_movements))
        .route("/deliveries", get(list_deliveries))
        .route("/deliveries/:id", get(get_delivery))
        .route("/warehouse/summary", get(summary))
        .with_permission(perm::WAREHOUSE_READ);

    let manage = Router::new()
        .route("/warehouses", post(create_warehouse))
        .route(
            "/warehouses/:id",
            put(update_warehouse).delete(delete_warehouse),
        )
        .route("/articles", post(create_article))
        .route("/articles/:id", put(update_article).delete(delete_article))
        .route("/assets", post(create_asset))
        .route("/assets/:id", put(update_asset).delete(delete_asset))
        .with_permission(perm::WAREHOUSE_MANAGE);

    let movements = Router::new()
        .route("/movements", post(register_movement))
        .with_permission(perm::MOVEMENTS_CREATE);

    let deliveries = Router::new()
        .route("/deliveries", post(create_delivery))
        .with_permission(perm::DELIVERIES_CREATE);

    Router::new()
        .merge(read)
        .merge(manage)
        .merge(movements)
        .merge(deliveries)
}

// Warehouses

#[utoipa::path(
    get,
    path = "/api/v1/warehouses",
    params(ListQuery),
    responses((status = 200, description = "Warehouses listed")),
    tag = "warehouse"
)]
pub async fn list_warehouses(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<WarehouseFilter>,
) -> ApiResult<PaginatedResponse<warehouse::Model>> {
    let rows = state
        .services
        .warehouse
        .list_warehouses(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/warehouses/{id}",
    params(("id" = Uuid, Path, description = "Warehouse ID")),
    responses(
        (status = 200, description = "Warehouse fetched"),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn get_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<warehouse::Model> {
    let found = state.services.warehouse.get_warehouse(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    post,
    path = "/api/v1/warehouses",
    request_body = WarehouseRequest,
    responses(
        (status = 201, description = "Warehouse created"),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn create_warehouse(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<WarehouseRequest>,
) -> Created<warehouse::Model> {
    let saved = state
        .services
        .warehouse
        .create_warehouse(actor.user_id, payload)
        .await?;
    Ok(created(saved))
}

#[utoipa::path(
    put,
    path = "/api/v1/warehouses/{id}",
    params(("id" = Uuid, Path, description = "Warehouse ID")),
    request_body = WarehouseRequest,
    responses((status = 200, description = "Warehouse updated")),
    tag = "warehouse"
)]
pub async fn update_warehouse(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<WarehouseRequest>,
) -> ApiResult<warehouse::Model> {
    let saved = state
        .services
        .warehouse
        .update_warehouse(actor.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/warehouses/{id}",
    params(("id" = Uuid, Path, description = "Warehouse ID")),
    responses(
        (status = 200, description = "Warehouse deleted"),
        (status = 409, description = "Warehouse still in use", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn delete_warehouse(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state
        .services
        .warehouse
        .delete_warehouse(actor.user_id, id)
        .await?;
    Ok(done("Warehouse deleted"))
}

// Articles

#[utoipa::path(
    get,
    path = "/api/v1/articles",
    params(ListQuery),
    responses((status = 200, description = "Articles listed")),
    tag = "warehouse"
)]
pub async fn list_articles(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<ArticleFilter>,
) -> ApiResult<PaginatedResponse<article::Model>> {
    let rows = state
        .services
        .warehouse
        .list_articles(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article fetched"),
        (status = 404, description = "Article not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<article::Model> {
    let found = state.services.warehouse.get_article(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    post,
    path = "/api/v1/articles",
    request_body = ArticleRequest,
    responses(
        (status = 201, description = "Article created, initial stock booked as an entry"),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn create_article(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<ArticleRequest>,
) -> Created<article::Model> {
    let saved = state
        .services
        .warehouse
        .create_article(actor.user_id, payload)
        .await?;
    Ok(created(saved))
}

#[utoipa::path(
    put,
    path = "/api/v1/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = ArticleRequest,
    responses((status = 200, description = "Article updated")),
    tag = "warehouse"
)]
pub async fn update_article(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ArticleRequest>,
) -> ApiResult<article::Model> {
    let saved = state
        .services
        .warehouse
        .update_article(actor.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article deleted"),
        (status = 400, description = "Article still has stock", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn delete_article(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state
        .services
        .warehouse
        .delete_article(actor.user_id, id)
        .await?;
    Ok(done("Article deleted"))
}

// Assets

#[utoipa::path(
    get,
    path = "/api/v1/assets",
    params(ListQuery),
    responses((status = 200, description = "Assets listed")),
    tag = "warehouse"
)]
pub async fn list_assets(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<AssetFilter>,
) -> ApiResult<PaginatedResponse<asset::Model>> {
    let rows = state
        .services
        .warehouse
        .list_assets(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset fetched"),
        (status = 404, description = "Asset not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn get_asset(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<asset::Model> {
    let found = state.services.warehouse.get_asset(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    post,
    path = "/api/v1/assets",
    request_body = AssetRequest,
    responses((status = 201, description = "Asset created")),
    tag = "warehouse"
)]
pub async fn create_asset(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<AssetRequest>,
) -> Created<asset::Model> {
    let saved = state
        .services
        .warehouse
        .create_asset(actor.user_id, payload)
        .await?;
    Ok(created(saved))
}

#[utoipa::path(
    put,
    path = "/api/v1/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset ID")),
    request_body = AssetRequest,
    responses((status = 200, description = "Asset updated")),
    tag = "warehouse"
)]
pub async fn update_asset(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssetRequest>,
) -> ApiResult<asset::Model> {
    let saved = state
        .services
        .warehouse
        .update_asset(actor.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses((status = 200, description = "Asset deleted")),
    tag = "warehouse"
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.warehouse.delete_asset(actor.user_id, id).await?;
    Ok(done("Asset deleted"))
}

// Movements

#[utoipa::path(
    get,
    path = "/api/v1/movements",
    params(ListQuery, crate::common::DateRangeParams),
    responses((status = 200, description = "Movements listed, newest first")),
    tag = "warehouse"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<MovementFilter>,
) -> ApiResult<PaginatedResponse<movement::Model>> {
    let rows = state
        .services
        .warehouse
        .list_movements(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    post,
    path = "/api/v1/movements",
    request_body = MovementRequest,
    responses(
        (status = 201, description = "Movement registered and stock updated"),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn register_movement(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<MovementRequest>,
) -> Created<movement::Model> {
    let saved = state
        .services
        .warehouse
        .register_movement(actor.user_id, payload)
        .await?;
    Ok(created(saved))
}

// Deliveries

#[utoipa::path(
    get,
    path = "/api/v1/deliveries",
    params(ListQuery),
    responses((status = 200, description = "Deliveries listed")),
    tag = "warehouse"
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<DeliveryFilter>,
) -> ApiResult<PaginatedResponse<delivery::Model>> {
    let rows = state
        .services
        .warehouse
        .list_deliveries(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/{id}",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery with its lines", body = ApiResponse<DeliveryDetail>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeliveryDetail> {
    let detail = state.services.warehouse.get_delivery(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries",
    request_body = DeliveryRequest,
    responses(
        (status = 201, description = "Delivery registered", body = ApiResponse<DeliveryDetail>),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouse"
)]
pub async fn create_delivery(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<DeliveryRequest>,
) -> Created<DeliveryDetail> {
    let detail = state
        .services
        .warehouse
        .create_delivery(actor.user_id, payload)
        .await?;
    Ok(created(detail))
}

#[utoipa::path(
    get,
    path = "/api/v1/warehouse/summary",
    responses((status = 200, description = "Warehouse totals", body = ApiResponse<WarehouseSummary>)),
    tag = "warehouse"
)]
pub async fn summary(State(state): State<AppState>) -> ApiResult<WarehouseSummary> {
    let summary = state.services.warehouse.summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}
