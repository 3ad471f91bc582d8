use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};

use super::common::csv_attachment;
use crate::{
    auth::{consts as perm, AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::import_export::{import_catalog, ImportResult},
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/import/:catalog/template", get(download_template))
        .route("/import/:catalog", post(import))
        .with_permission(perm::IMPORT_RUN)
}

#[utoipa::path(
    get,
    path = "/api/v1/import/{catalog}/template",
    params(("catalog" = String, Path, description = "brands, categories, units, movement-types, request-types or reception-types")),
    responses(
        (status = 200, description = "CSV template with up to ten existing entries", content_type = "text/csv"),
        (status = 404, description = "Unknown catalog", body = crate::errors::ErrorResponse)
    ),
    tag = "import"
)]
pub async fn download_template(
    State(state): State<AppState>,
    Path(catalog): Path<String>,
) -> Result<Response, ServiceError> {
    let kind = import_catalog(&catalog)?;
    let body = state.services.import_export.template(kind).await?;
    Ok(csv_attachment(&format!("{}_template.csv", kind.slug()), body))
}

#[utoipa::path(
    post,
    path = "/api/v1/import/{catalog}",
    params(("catalog" = String, Path, description = "Catalog to import into")),
    request_body(content = String, content_type = "text/csv", description = "CSV with a header row"),
    responses(
        (status = 200, description = "Rows upserted; row errors reported", body = ApiResponse<ImportResult>),
        (status = 400, description = "Empty file or missing columns", body = crate::errors::ErrorResponse)
    ),
    tag = "import"
)]
pub async fn import(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(catalog): Path<String>,
    body: Bytes,
) -> ApiResult<ImportResult> {
    let kind = import_catalog(&catalog)?;
    let result = state
        .services
        .import_export
        .import(actor.user_id, kind, body.to_vec())
        .await?;
    let message = result.message.clone();
    Ok(Json(ApiResponse::success(result).with_message(message)))
}
