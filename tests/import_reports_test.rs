mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;

use common::{id_of, TestApp};
use erp_api::auth::consts as perm;

fn csv_upload(app_token: &str, slug: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/api/v1/import/{}", slug))
        .header(header::AUTHORIZATION, format!("Bearer {}", app_token))
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(body.to_string()))
        .expect("build upload")
}

#[tokio::test]
async fn catalog_import_creates_updates_and_reports_bad_rows() {
    let app = TestApp::new().await;
    app.catalog_entry("brands", "ACME", json!({})).await;

    let csv = "Code,Name,Description,Active\n\
               acme,Acme Industrial,Renamed on import,YES\n\
               BOSCH,Bosch,,yes\n\
               ,Missing code,,NO\n";
    let response = app.send(csv_upload(app.admin_token(), "brands", csv)).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());

    let result = response.data();
    assert_eq!(result["created"], 1);
    assert_eq!(result["updated"], 1);
    assert_eq!(result["error_count"], 1);
    assert!(result["errors"][0]
        .as_str()
        .unwrap_or_default()
        .contains("Row 4"));

    let brands = app.get("/api/v1/catalogs/brands?limit=50").await.data();
    assert_eq!(brands["total"], 2);
    let acme = brands["items"]
        .as_array()
        .and_then(|items| items.iter().find(|b| b["code"] == "ACME").cloned())
        .expect("ACME listed");
    assert_eq!(acme["name"], "Acme Industrial");
}

#[tokio::test]
async fn import_without_required_columns_fails_whole_file() {
    let app = TestApp::new().await;
    let response = app
        .send(csv_upload(app.admin_token(), "units", "Code,Label\nUN,Unit\n"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let units = app.get("/api/v1/catalogs/units").await.data();
    assert_eq!(units["total"], 0);
}

#[tokio::test]
async fn import_template_lists_the_catalog_columns() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/import/request-types/template").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap_or_default()
        .contains("request-types_template.csv"));
    assert!(response.text().starts_with("Code,Name,Description,Active,RequiresApproval"));

    let unknown = app.get("/api/v1/import/planets/template").await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn movement_report_exports_csv() {
    let app = TestApp::new().await;
    let warehouse_id = app.warehouse("MAIN").await;
    let article_id = app.article("GLV-01", warehouse_id, 7).await;
    app.post(
        "/api/v1/movements",
        json!({ "article_id": article_id, "operation": "EXIT", "quantity": 2 }),
    )
    .await;

    let json_report = app.get("/api/v1/reports/movements").await;
    assert_eq!(json_report.status, StatusCode::OK, "{}", json_report.text());
    assert_eq!(
        json_report.data()["rows"].as_array().map(Vec::len),
        Some(2)
    );

    let csv_report = app.get("/api/v1/reports/movements?format=csv").await;
    assert_eq!(csv_report.status, StatusCode::OK);
    assert!(csv_report.headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap_or_default()
        .starts_with("text/csv"));
    let text = csv_report.text();
    let mut lines = text.lines();
    assert!(lines.next().unwrap_or_default().contains("article_code"));
    assert_eq!(lines.filter(|l| l.contains("GLV-01")).count(), 2);
}

#[tokio::test]
async fn dashboard_sums_warehouse_stock() {
    let app = TestApp::new().await;
    let warehouse_id = app.warehouse("MAIN").await;
    app.post(
        "/api/v1/articles",
        json!({ "code": "LOW-1", "name": "Low", "warehouse_id": warehouse_id, "min_stock": 5, "initial_stock": 2 }),
    )
    .await;
    app.article("OK-1", warehouse_id, 40).await;

    let dashboard = app.get("/api/v1/reports/dashboard?module=warehouse").await;
    assert_eq!(dashboard.status, StatusCode::OK, "{}", dashboard.text());
    let warehouse = &dashboard.data()["warehouse"];
    assert_eq!(warehouse["total_articles"], 2);
    assert_eq!(warehouse["total_warehouses"], 1);
    assert_eq!(warehouse["total_stock"], 42);
    assert!(dashboard.data().get("procurement").is_none());

    let csv = app
        .get("/api/v1/reports/dashboard?module=warehouse&format=csv")
        .await;
    assert_eq!(csv.status, StatusCode::OK);
    assert!(csv.text().contains("warehouse,total_stock,42"));
}

#[tokio::test]
async fn reports_and_imports_need_their_permissions() {
    let app = TestApp::new().await;
    let (_, reader) = app.user_with("reader", &[perm::REPORTS_READ]).await;

    let allowed = app
        .request(Method::GET, "/api/v1/reports/late-orders", Some(&reader), None)
        .await;
    assert_eq!(allowed.status, StatusCode::OK);

    let denied = app.send(csv_upload(&reader, "brands", "Code,Name\n")).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let anonymous = app
        .request(Method::GET, "/api/v1/reports/dashboard", None, None)
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn audit_trail_records_catalog_changes() {
    let app = TestApp::new().await;
    let brand_id = app.catalog_entry("brands", "ACME", json!({})).await;
    app.settle_events().await;

    let logs = app
        .get(&format!("/api/v1/audit-logs?entity_id={}", brand_id))
        .await;
    assert_eq!(logs.status, StatusCode::OK, "{}", logs.text());
    let items = logs.data()["items"].as_array().cloned().unwrap_or_default();
    assert!(!items.is_empty());
    assert_eq!(items[0]["action"], "create");
    assert_eq!(id_of(&json!({ "id": items[0]["actor_id"] })), app.admin_id);
}
