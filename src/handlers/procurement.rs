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
    entities::{purchase_order, reception, supplier},
    errors::ServiceError,
    services::procurement::{
        CancelOrderRequest, PurchaseOrderDetail, PurchaseOrderFilter, PurchaseOrderRequest,
        ReceptionDetail, ReceptionFilter, ReceptionRequest, SupplierFilter, SupplierRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/suppliers", get(list_suppliers))
        .route("/suppliers/:id", get(get_supplier))
        .route("/purchase-orders", get(list_orders))
        .route("/purchase-orders/:id", get(get_order))
        .route("/receptions", get(list_receptions))
        .route("/receptions/:id", get(get_reception))
        .with_permission(perm::PROCUREMENT_READ);

    let suppliers = Router::new()
        .route("/suppliers", post(create_supplier))
        .route("/suppliers/:id", put(update_supplier).delete(delete_supplier))
        .with_permission(perm::SUPPLIERS_MANAGE);

    let orders = Router::new()
        .route("/purchase-orders", post(create_order))
        .route("/purchase-orders/:id", put(update_order).delete(delete_order))
        .route("/purchase-orders/:id/cancel", post(cancel_order))
        .with_permission(perm::PURCHASE_ORDERS_MANAGE);

    let receptions = Router::new()
        .route("/receptions", post(create_reception))
        .route("/receptions/:id/cancel", post(cancel_reception))
        .with_permission(perm::RECEPTIONS_MANAGE);

    let confirm = Router::new()
        .route("/receptions/:id/confirm", post(confirm_reception))
        .with_permission(perm::RECEPTIONS_CONFIRM);

    Router::new()
        .merge(read)
        .merge(suppliers)
        .merge(orders)
        .merge(receptions)
        .merge(confirm)
}

// Suppliers

#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    params(ListQuery),
    responses((status = 200, description = "Suppliers listed")),
    tag = "procurement"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<SupplierFilter>,
) -> ApiResult<PaginatedResponse<supplier::Model>> {
    let rows = state
        .services
        .procurement
        .list_suppliers(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier fetched"),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<supplier::Model> {
    let found = state.services.procurement.get_supplier(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    request_body = SupplierRequest,
    responses(
        (status = 201, description = "Supplier created"),
        (status = 409, description = "Tax id already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<SupplierRequest>,
) -> Created<supplier::Model> {
    let saved = state
        .services
        .procurement
        .create_supplier(actor.user_id, payload)
        .await?;
    Ok(created(saved))
}

#[utoipa::path(
    put,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    request_body = SupplierRequest,
    responses((status = 200, description = "Supplier updated")),
    tag = "procurement"
)]
pub async fn update_supplier(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SupplierRequest>,
) -> ApiResult<supplier::Model> {
    let saved = state
        .services
        .procurement
        .update_supplier(actor.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier deleted"),
        (status = 409, description = "Supplier has open purchase orders", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn delete_supplier(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state
        .services
        .procurement
        .delete_supplier(actor.user_id, id)
        .await?;
    Ok(done("Supplier deleted"))
}

// Purchase orders

#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders",
    params(ListQuery),
    responses((status = 200, description = "Purchase orders listed")),
    tag = "procurement"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<PurchaseOrderFilter>,
) -> ApiResult<PaginatedResponse<purchase_order::Model>> {
    let rows = state
        .services
        .procurement
        .list_orders(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Order with lines and receptions", body = ApiResponse<PurchaseOrderDetail>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseOrderDetail> {
    let detail = state.services.procurement.get_order(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders",
    request_body = PurchaseOrderRequest,
    responses(
        (status = 201, description = "Purchase order created", body = ApiResponse<PurchaseOrderDetail>),
        (status = 400, description = "Invalid lines", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn create_order(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<PurchaseOrderRequest>,
) -> Created<PurchaseOrderDetail> {
    let detail = state
        .services
        .procurement
        .create_order(actor.user_id, payload)
        .await?;
    Ok(created(detail))
}

#[utoipa::path(
    put,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body = PurchaseOrderRequest,
    responses(
        (status = 200, description = "Purchase order updated", body = ApiResponse<PurchaseOrderDetail>),
        (status = 400, description = "Order is no longer PENDING", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn update_order(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PurchaseOrderRequest>,
) -> ApiResult<PurchaseOrderDetail> {
    let detail = state
        .services
        .procurement
        .update_order(actor.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Purchase order cancelled"),
        (status = 400, description = "Order already received or cancelled", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<CancelOrderRequest>>,
) -> ApiResult<purchase_order::Model> {
    let reason = payload.and_then(|Json(p)| p.reason);
    let order = state
        .services
        .procurement
        .cancel_order(actor.user_id, id, reason)
        .await?;
    Ok(Json(
        ApiResponse::success(order).with_message("Purchase order cancelled"),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order deleted"),
        (status = 400, description = "Order is no longer PENDING", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state
        .services
        .procurement
        .delete_order(actor.user_id, id)
        .await?;
    Ok(done("Purchase order deleted"))
}

// Receptions

#[utoipa::path(
    get,
    path = "/api/v1/receptions",
    params(ListQuery),
    responses((status = 200, description = "Receptions listed")),
    tag = "procurement"
)]
pub async fn list_receptions(
    State(state): State<AppState>,
    Query(page): Query<ListQuery>,
    Query(filter): Query<ReceptionFilter>,
) -> ApiResult<PaginatedResponse<reception::Model>> {
    let rows = state
        .services
        .procurement
        .list_receptions(filter, page.page_request(&state.config))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/receptions/{id}",
    params(("id" = Uuid, Path, description = "Reception ID")),
    responses(
        (status = 200, description = "Reception with its lines", body = ApiResponse<ReceptionDetail>),
        (status = 404, description = "Reception not found", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn get_reception(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReceptionDetail> {
    let detail = state.services.procurement.get_reception(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/receptions",
    request_body = ReceptionRequest,
    responses(
        (status = 201, description = "Reception registered as PENDING", body = ApiResponse<ReceptionDetail>),
        (status = 400, description = "Reception type requires an order", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn create_reception(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<ReceptionRequest>,
) -> Created<ReceptionDetail> {
    let detail = state
        .services
        .procurement
        .create_reception(actor.user_id, payload)
        .await?;
    Ok(created(detail))
}

#[utoipa::path(
    post,
    path = "/api/v1/receptions/{id}/confirm",
    params(("id" = Uuid, Path, description = "Reception ID")),
    responses(
        (status = 200, description = "Reception confirmed, stock and order updated", body = ApiResponse<ReceptionDetail>),
        (status = 400, description = "Reception not PENDING or over-received", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn confirm_reception(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ReceptionDetail> {
    let detail = state
        .services
        .procurement
        .confirm_reception(actor.user_id, id)
        .await?;
    Ok(Json(
        ApiResponse::success(detail).with_message("Reception confirmed"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/receptions/{id}/cancel",
    params(("id" = Uuid, Path, description = "Reception ID")),
    responses(
        (status = 200, description = "Reception cancelled"),
        (status = 400, description = "Reception is not PENDING", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn cancel_reception(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<reception::Model> {
    let cancelled = state
        .services
        .procurement
        .cancel_reception(actor.user_id, id)
        .await?;
    Ok(Json(
        ApiResponse::success(cancelled).with_message("Reception cancelled"),
    ))
}
