mod common;

use axum::http::StatusCode;
use rstest::rstest;
use serde_json::json;
use uuid::Uuid;

use common::{id_of, TestApp};

async fn movement(app: &TestApp, article_id: Uuid, operation: &str, quantity: i32) -> StatusCode {
    app.post(
        "/api/v1/movements",
        json!({
            "article_id": article_id,
            "operation": operation,
            "quantity": quantity,
            "reason": "cycle count",
        }),
    )
    .await
    .status
}

#[tokio::test]
async fn stock_equals_the_sum_of_signed_movements() {
    let app = TestApp::new().await;
    let warehouse_id = app.warehouse("MAIN").await;
    let article_id = app.article("GLV-01", warehouse_id, 12).await;

    assert_eq!(movement(&app, article_id, "ENTRY", 8).await, StatusCode::CREATED);
    assert_eq!(movement(&app, article_id, "EXIT", 5).await, StatusCode::CREATED);
    assert_eq!(movement(&app, article_id, "EXIT", 15).await, StatusCode::CREATED);
    assert_eq!(
        movement(&app, article_id, "EXIT", 1).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let listed = app
        .get(&format!("/api/v1/movements?article_id={}&limit=100", article_id))
        .await;
    assert_eq!(listed.status, StatusCode::OK, "{}", listed.text());
    let rows = listed.data()["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 4, "opening entry plus three accepted movements");

    let signed: i64 = rows
        .iter()
        .map(|row| {
            let quantity = row["quantity"].as_i64().unwrap_or(0);
            if row["operation"] == "ENTRY" {
                quantity
            } else {
                -quantity
            }
        })
        .sum();
    assert_eq!(signed, 0);
    assert_eq!(app.stock_of(article_id).await, signed);

    for row in &rows {
        let before = row["stock_before"].as_i64().unwrap_or(-1);
        let after = row["stock_after"].as_i64().unwrap_or(-1);
        assert!(before >= 0 && after >= 0);
    }
}

#[rstest]
#[case("ENTRY", 0)]
#[case("EXIT", -3)]
#[tokio::test]
async fn non_positive_quantities_are_rejected(#[case] operation: &str, #[case] quantity: i32) {
    let app = TestApp::new().await;
    let warehouse_id = app.warehouse("MAIN").await;
    let article_id = app.article("TAP-01", warehouse_id, 10).await;

    assert_eq!(
        movement(&app, article_id, operation, quantity).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(app.stock_of(article_id).await, 10);
}

#[tokio::test]
async fn articles_with_stock_cannot_be_deleted() {
    let app = TestApp::new().await;
    let warehouse_id = app.warehouse("MAIN").await;
    let stocked = app.article("OIL-01", warehouse_id, 3).await;
    let empty = app.article("OIL-02", warehouse_id, 0).await;

    let blocked = app.delete(&format!("/api/v1/articles/{}", stocked)).await;
    assert_eq!(blocked.status, StatusCode::BAD_REQUEST);

    let deleted = app.delete(&format!("/api/v1/articles/{}", empty)).await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.text());

    let gone = app.get(&format!("/api/v1/articles/{}", empty)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let listed = app.get("/api/v1/articles?limit=100").await.data();
    assert_eq!(listed["total"], 1);
    assert_eq!(id_of(&listed["items"][0]), stocked);
}

#[tokio::test]
async fn article_codes_stay_unique_after_deletion() {
    let app = TestApp::new().await;
    let warehouse_id = app.warehouse("MAIN").await;
    let first = app.article("HAM-01", warehouse_id, 0).await;

    let body = json!({ "code": "ham-01", "name": "Another hammer", "warehouse_id": warehouse_id });
    let clash = app.post("/api/v1/articles", body.clone()).await;
    assert_eq!(clash.status, StatusCode::CONFLICT);

    let deleted = app.delete(&format!("/api/v1/articles/{}", first)).await;
    assert_eq!(deleted.status, StatusCode::OK);
    let after_delete = app.post("/api/v1/articles", body).await;
    assert_eq!(after_delete.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn direct_delivery_books_exits() {
    let app = TestApp::new().await;
    let warehouse_id = app.warehouse("MAIN").await;
    let article_id = app.article("SCW-01", warehouse_id, 9).await;

    let delivered = app
        .post(
            "/api/v1/deliveries",
            json!({
                "kind": "ARTICLE",
                "warehouse_id": warehouse_id,
                "reason": "Shop floor top-up",
                "lines": [{ "article_id": article_id, "quantity": 4 }],
            }),
        )
        .await;
    assert_eq!(delivered.status, StatusCode::CREATED, "{}", delivered.text());
    assert_eq!(app.stock_of(article_id).await, 5);

    let too_much = app
        .post(
            "/api/v1/deliveries",
            json!({
                "kind": "ARTICLE",
                "warehouse_id": warehouse_id,
                "reason": "Shop floor top-up",
                "lines": [{ "article_id": article_id, "quantity": 6 }],
            }),
        )
        .await;
    assert_eq!(too_much.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.stock_of(article_id).await, 5);
}

#[tokio::test]
async fn catalog_entries_used_by_live_articles_cannot_be_deleted() {
    let app = TestApp::new().await;
    let warehouse_id = app.warehouse("MAIN").await;
    let brand_id = app.catalog_entry("brands", "ACME", json!({})).await;
    let category_id = app.catalog_entry("categories", "TOOLS", json!({})).await;

    let article = app
        .post(
            "/api/v1/articles",
            json!({
                "code": "WRN-01",
                "name": "Wrench",
                "warehouse_id": warehouse_id,
                "brand_id": brand_id,
                "category_id": category_id,
            }),
        )
        .await;
    assert_eq!(article.status, StatusCode::CREATED, "{}", article.text());
    let article_id = id_of(&article.data());

    for uri in [
        format!("/api/v1/catalogs/brands/{}", brand_id),
        format!("/api/v1/catalogs/categories/{}", category_id),
    ] {
        let blocked = app.delete(&uri).await;
        assert_eq!(blocked.status, StatusCode::BAD_REQUEST, "{}", blocked.text());
        assert_eq!(app.get(&uri).await.status, StatusCode::OK);
    }

    app.delete(&format!("/api/v1/articles/{}", article_id)).await;
    let freed = app
        .delete(&format!("/api/v1/catalogs/brands/{}", brand_id))
        .await;
    assert_eq!(freed.status, StatusCode::OK, "{}", freed.text());
}

struct ApprovedRequest {
    id: Uuid,
    detail_id: Uuid,
    article_id: Uuid,
    warehouse_id: Uuid,
}

async fn approved_request(app: &TestApp, stock: i32, quantity: i32) -> ApprovedRequest {
    let warehouse_id = app.warehouse("MAIN").await;
    let article_id = app.article("FLT-01", warehouse_id, stock).await;
    let type_id = app
        .catalog_entry("request-types", "MAINT", json!({ "requires_approval": true }))
        .await;

    let view = app
        .post(
            "/api/v1/requests",
            json!({
                "request_type_id": type_id,
                "kind": "ARTICLE",
                "reason": "Filter change on compressor 3",
                "warehouse_id": warehouse_id,
                "lines": [{ "article_id": article_id, "quantity": quantity }],
            }),
        )
        .await
        .data();
    let id = id_of(&view["request"]);
    let approved = app
        .post(&format!("/api/v1/requests/{}/approve", id), json!({}))
        .await;
    assert_eq!(approved.status, StatusCode::OK, "{}", approved.text());

    ApprovedRequest {
        id,
        detail_id: id_of(&view["lines"][0]),
        article_id,
        warehouse_id,
    }
}

fn request_delivery(
    request: &ApprovedRequest,
    warehouse_id: Option<Uuid>,
    quantities: &[i32],
) -> serde_json::Value {
    let lines: Vec<_> = quantities
        .iter()
        .map(|quantity| {
            json!({
                "article_id": request.article_id,
                "quantity": quantity,
                "request_detail_id": request.detail_id,
            })
        })
        .collect();
    json!({
        "kind": "ARTICLE",
        "warehouse_id": warehouse_id,
        "reason": "Handed over at the counter",
        "request_id": request.id,
        "lines": lines,
    })
}

async fn request_line(app: &TestApp, request_id: Uuid) -> (serde_json::Value, serde_json::Value) {
    let detail = app
        .get(&format!("/api/v1/requests/{}", request_id))
        .await
        .data();
    (detail["request"].clone(), detail["lines"][0].clone())
}

#[tokio::test]
async fn request_linked_delivery_closes_the_request() {
    let app = TestApp::new().await;
    let request = approved_request(&app, 50, 4).await;

    let delivered = app
        .post(
            "/api/v1/deliveries",
            request_delivery(&request, Some(request.warehouse_id), &[4]),
        )
        .await;
    assert_eq!(delivered.status, StatusCode::CREATED, "{}", delivered.text());
    assert_eq!(delivered.data()["delivery"]["request_id"], json!(request.id));
    assert_eq!(app.stock_of(request.article_id).await, 46);

    let (header, line) = request_line(&app, request.id).await;
    assert_eq!(header["status"], "DISPATCHED");
    assert_eq!(line["dispatched_quantity"], 4);
}

#[tokio::test]
async fn repeated_request_lines_count_towards_the_approved_quantity() {
    let app = TestApp::new().await;
    let request = approved_request(&app, 50, 4).await;

    let over = app
        .post(
            "/api/v1/deliveries",
            request_delivery(&request, Some(request.warehouse_id), &[3, 3]),
        )
        .await;
    assert_eq!(over.status, StatusCode::BAD_REQUEST, "{}", over.text());
    assert_eq!(app.stock_of(request.article_id).await, 50);
    let (header, line) = request_line(&app, request.id).await;
    assert_eq!(header["status"], "APPROVED");
    assert_eq!(line["dispatched_quantity"], 0);

    let split = app
        .post(
            "/api/v1/deliveries",
            request_delivery(&request, Some(request.warehouse_id), &[2, 2]),
        )
        .await;
    assert_eq!(split.status, StatusCode::CREATED, "{}", split.text());
    assert_eq!(app.stock_of(request.article_id).await, 46);
    let (header, line) = request_line(&app, request.id).await;
    assert_eq!(header["status"], "DISPATCHED");
    assert_eq!(line["dispatched_quantity"], 4);
}

#[tokio::test]
async fn request_deliveries_draw_from_the_request_warehouse() {
    let app = TestApp::new().await;
    let request = approved_request(&app, 20, 5).await;
    let other_warehouse = app.warehouse("SIDE").await;

    let elsewhere = app
        .post(
            "/api/v1/deliveries",
            request_delivery(&request, Some(other_warehouse), &[5]),
        )
        .await;
    assert_eq!(elsewhere.status, StatusCode::BAD_REQUEST, "{}", elsewhere.text());
    assert_eq!(app.stock_of(request.article_id).await, 20);

    let defaulted = app
        .post("/api/v1/deliveries", request_delivery(&request, None, &[5]))
        .await;
    assert_eq!(defaulted.status, StatusCode::CREATED, "{}", defaulted.text());
    assert_eq!(
        defaulted.data()["delivery"]["warehouse_id"],
        json!(request.warehouse_id)
    );
    assert_eq!(app.stock_of(request.article_id).await, 15);
}
