use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ERP API",
        version = "1.0.0",
        description = r#"
# ERP API

Internal resource-management backend: accounts, organisational units, warehouse inventory,
procurement, internal requests with an approval and dispatch workflow, and reports.

## Authentication

Obtain a token from `POST /auth/login` and send it on every `/api/v1` call:

```
Authorization: Bearer <your-jwt-token>
```

Each route is gated by a permission codename such as `requests:approve`. Superusers pass
every gate.

## Errors

Failures return `{ error, message, request_id, timestamp }` with a 4xx or 5xx status.
Business-rule violations (wrong workflow state, over-quantity) are `400`; insufficient stock is
`422`.

## Pagination

List endpoints take `page` (1-based) and `limit`, and answer
`{ items, total, page, limit, total_pages }`.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Login and own account"),
        (name = "accounts", description = "Users, groups and permissions"),
        (name = "organization", description = "Locations, workshops, areas and departments"),
        (name = "catalogs", description = "Categories, units, brands and workflow types"),
        (name = "warehouse", description = "Warehouses, articles, assets, movements and deliveries"),
        (name = "procurement", description = "Suppliers, purchase orders and receptions"),
        (name = "requests", description = "Internal requests: approval and dispatch"),
        (name = "reports", description = "Dashboards and CSV-exportable reports"),
        (name = "import", description = "CSV catalog templates and imports"),
        (name = "audit", description = "Audit trail")
    ),
    paths(
        handlers::auth::login,
        handlers::auth::me,
        handlers::auth::change_password,
        handlers::accounts::list_users,
        handlers::accounts::get_user,
        handlers::accounts::create_user,
        handlers::accounts::update_user,
        handlers::accounts::delete_user,
        handlers::accounts::list_groups,
        handlers::accounts::get_group,
        handlers::accounts::create_group,
        handlers::accounts::update_group,
        handlers::accounts::delete_group,
        handlers::accounts::list_permissions,
        handlers::organization::list_units,
        handlers::organization::get_unit,
        handlers::organization::create_unit,
        handlers::organization::update_unit,
        handlers::organization::delete_unit,
        handlers::catalogs::list_entries,
        handlers::catalogs::get_entry,
        handlers::catalogs::create_entry,
        handlers::catalogs::update_entry,
        handlers::catalogs::delete_entry,
        handlers::warehouse::list_warehouses,
        handlers::warehouse::get_warehouse,
        handlers::warehouse::create_warehouse,
        handlers::warehouse::update_warehouse,
        handlers::warehouse::delete_warehouse,
        handlers::warehouse::list_articles,
        handlers::warehouse::get_article,
        handlers::warehouse::create_article,
        handlers::warehouse::update_article,
        handlers::warehouse::delete_article,
        handlers::warehouse::list_assets,
        handlers::warehouse::get_asset,
        handlers::warehouse::create_asset,
        handlers::warehouse::update_asset,
        handlers::warehouse::delete_asset,
        handlers::warehouse::list_movements,
        handlers::warehouse::register_movement,
        handlers::warehouse::list_deliveries,
        handlers::warehouse::get_delivery,
        handlers::warehouse::create_delivery,
        handlers::warehouse::summary,
        handlers::procurement::list_suppliers,
        handlers::procurement::get_supplier,
        handlers::procurement::create_supplier,
        handlers::procurement::update_supplier,
        handlers::procurement::delete_supplier,
        handlers::procurement::list_orders,
        handlers::procurement::get_order,
        handlers::procurement::create_order,
        handlers::procurement::update_order,
        handlers::procurement::cancel_order,
        handlers::procurement::delete_order,
        handlers::procurement::list_receptions,
        handlers::procurement::get_reception,
        handlers::procurement::create_reception,
        handlers::procurement::confirm_reception,
        handlers::procurement::cancel_reception,
        handlers::requests::list_requests,
        handlers::requests::list_my_requests,
        handlers::requests::summary,
        handlers::requests::get_request,
        handlers::requests::create_request,
        handlers::requests::update_request,
        handlers::requests::delete_request,
        handlers::requests::get_history,
        handlers::requests::approve_request,
        handlers::requests::reject_request,
        handlers::requests::dispatch_request,
        handlers::requests::dispatch_lines,
        handlers::reports::dashboard,
        handlers::reports::movements,
        handlers::reports::idle_articles,
        handlers::reports::late_orders,
        handlers::import_export::download_template,
        handlers::import_export::import,
        handlers::audit::list_audit_logs,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::models::ItemKind,
            crate::models::RequestStatus,
            crate::models::PurchaseOrderStatus,
            crate::models::ReceptionStatus,
            crate::models::MovementOperation,
            crate::services::requests::RequestPayload,
            crate::services::requests::ApprovePayload,
            crate::services::requests::RejectPayload,
            crate::services::requests::DispatchPayload,
            crate::services::requests::DispatchLinesView,
            crate::services::requests::RequestSummary,
            crate::services::warehouse::MovementRequest,
            crate::services::warehouse::DeliveryRequest,
            crate::services::procurement::PurchaseOrderRequest,
            crate::services::procurement::ReceptionRequest,
            crate::services::import_export::ImportResult,
            crate::services::reports::Dashboard,
            crate::services::reports::MovementReport,
            crate::services::reports::IdleArticleReport,
            crate::services::reports::LateOrderReport,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_workflow_routes() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("ERP API"));
        assert!(json.contains("/api/v1/requests/{id}/approve"));
        assert!(json.contains("/api/v1/receptions/{id}/confirm"));
        assert!(json.contains("bearer_auth"));
    }
}
