use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::common::{csv_attachment, FormatQuery, ReportFormat};
use crate::{
    auth::{consts as perm, AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::{
        import_export::write_csv,
        reports::{
            Dashboard, IdleArticleParams, IdleArticleReport, LateOrderParams, LateOrderReport,
            MovementReport, MovementReportParams, ReportModule,
        },
    },
    ApiResponse, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DashboardQuery {
    /// warehouse, procurement, requests or all
    pub module: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/dashboard", get(dashboard))
        .route("/reports/movements", get(movements))
        .route("/reports/idle-articles", get(idle_articles))
        .route("/reports/late-orders", get(late_orders))
        .with_permission(perm::REPORTS_READ)
}

fn json_body<T: serde::Serialize>(data: T) -> Response {
    Json(ApiResponse::success(data)).into_response()
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard",
    params(DashboardQuery, FormatQuery),
    responses(
        (status = 200, description = "Counters per module", body = ApiResponse<Dashboard>),
        (status = 403, description = "Missing reports:read", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DashboardQuery>,
    Query(format): Query<FormatQuery>,
) -> Result<Response, ServiceError> {
    let module = query
        .module
        .as_deref()
        .and_then(|m| m.parse::<ReportModule>().ok())
        .unwrap_or(ReportModule::All);
    let dashboard = state.services.reports.dashboard(module, user.user_id).await?;

    Ok(match format.format {
        ReportFormat::Json => json_body(dashboard),
        ReportFormat::Csv => csv_attachment(
            &format!("dashboard_{}.csv", module),
            write_csv(&dashboard.rows())?,
        ),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/movements",
    params(crate::common::DateRangeParams, FormatQuery),
    responses((status = 200, description = "Movements in the window with per-type counts", body = ApiResponse<MovementReport>)),
    tag = "reports"
)]
pub async fn movements(
    State(state): State<AppState>,
    Query(params): Query<MovementReportParams>,
    Query(format): Query<FormatQuery>,
) -> Result<Response, ServiceError> {
    let report = state.services.reports.movements(params).await?;

    Ok(match format.format {
        ReportFormat::Json => json_body(report),
        ReportFormat::Csv => csv_attachment(
            &format!(
                "movements_{}_{}.csv",
                report.from.date_naive(),
                report.to.date_naive()
            ),
            write_csv(&report.rows)?,
        ),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/idle-articles",
    params(crate::common::DateRangeParams, FormatQuery),
    responses((status = 200, description = "Active articles without movements in the window", body = ApiResponse<IdleArticleReport>)),
    tag = "reports"
)]
pub async fn idle_articles(
    State(state): State<AppState>,
    Query(params): Query<IdleArticleParams>,
    Query(format): Query<FormatQuery>,
) -> Result<Response, ServiceError> {
    let report = state.services.reports.idle_articles(params).await?;

    Ok(match format.format {
        ReportFormat::Json => json_body(report),
        ReportFormat::Csv => csv_attachment("idle_articles.csv", write_csv(&report.rows)?),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/late-orders",
    params(FormatQuery),
    responses((status = 200, description = "Open purchase orders past their expected date", body = ApiResponse<LateOrderReport>)),
    tag = "reports"
)]
pub async fn late_orders(
    State(state): State<AppState>,
    Query(params): Query<LateOrderParams>,
    Query(format): Query<FormatQuery>,
) -> Result<Response, ServiceError> {
    let report = state.services.reports.late_orders(params).await?;

    Ok(match format.format {
        ReportFormat::Json => json_body(report),
        ReportFormat::Csv => csv_attachment(
            &format!("late_orders_{}.csv", report.today),
            write_csv(&report.rows())?,
        ),
    })
}
