mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{id_of, TestApp};

struct Order {
    id: Uuid,
    line_id: Uuid,
    article_id: Uuid,
    warehouse_id: Uuid,
}

async fn open_order(app: &TestApp, quantity: i32) -> Order {
    let warehouse_id = app.warehouse("MAIN").await;
    let article_id = app.article("MSK-01", warehouse_id, 2).await;

    let supplier = app
        .post(
            "/api/v1/suppliers",
            json!({ "tax_id": "20100070970", "business_name": "Ferreteria Industrial SAC" }),
        )
        .await;
    assert_eq!(supplier.status, StatusCode::CREATED, "{}", supplier.text());

    let order = app
        .post(
            "/api/v1/purchase-orders",
            json!({
                "supplier_id": id_of(&supplier.data()),
                "warehouse_id": warehouse_id,
                "tax_rate": "18",
                "lines": [{ "article_id": article_id, "quantity": quantity, "unit_price": "10.00" }],
            }),
        )
        .await;
    assert_eq!(order.status, StatusCode::CREATED, "{}", order.text());
    let detail = order.data();
    assert_eq!(detail["order"]["status"], "PENDING");

    Order {
        id: id_of(&detail["order"]),
        line_id: id_of(&detail["lines"][0]),
        article_id,
        warehouse_id,
    }
}

async fn receive(app: &TestApp, order: &Order, quantity: i32) -> Value {
    let response = app
        .post(
            "/api/v1/receptions",
            json!({
                "kind": "ARTICLE",
                "purchase_order_id": order.id,
                "warehouse_id": order.warehouse_id,
                "lines": [{ "purchase_order_line_id": order.line_id, "quantity": quantity }],
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    response.data()
}

#[tokio::test]
async fn order_totals_include_tax() {
    let app = TestApp::new().await;
    let order = open_order(&app, 5).await;

    let detail = app
        .get(&format!("/api/v1/purchase-orders/{}", order.id))
        .await
        .data();
    let total: f64 = detail["order"]["total"]
        .as_str()
        .and_then(|t| t.parse().ok())
        .unwrap_or_default();
    assert!((total - 59.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn confirming_receptions_books_stock_and_closes_the_order() {
    let app = TestApp::new().await;
    let order = open_order(&app, 10).await;

    let first = receive(&app, &order, 4).await;
    assert_eq!(first["reception"]["status"], "PENDING");
    assert_eq!(app.stock_of(order.article_id).await, 2, "pending receptions hold no stock");

    let confirmed = app
        .post(
            &format!("/api/v1/receptions/{}/confirm", id_of(&first["reception"])),
            json!({}),
        )
        .await;
    assert_eq!(confirmed.status, StatusCode::OK, "{}", confirmed.text());
    assert_eq!(app.stock_of(order.article_id).await, 6);

    let partial = app
        .get(&format!("/api/v1/purchase-orders/{}", order.id))
        .await
        .data();
    assert_eq!(partial["order"]["status"], "PARTIALLY_RECEIVED");
    assert_eq!(partial["lines"][0]["received_quantity"], 4);

    let rest = receive(&app, &order, 6).await;
    app.post(
        &format!("/api/v1/receptions/{}/confirm", id_of(&rest["reception"])),
        json!({}),
    )
    .await;

    let closed = app
        .get(&format!("/api/v1/purchase-orders/{}", order.id))
        .await
        .data();
    assert_eq!(closed["order"]["status"], "RECEIVED");
    assert_eq!(app.stock_of(order.article_id).await, 12);
}

#[tokio::test]
async fn receptions_cannot_be_confirmed_twice() {
    let app = TestApp::new().await;
    let order = open_order(&app, 3).await;
    let reception = receive(&app, &order, 3).await;
    let uri = format!("/api/v1/receptions/{}/confirm", id_of(&reception["reception"]));

    assert_eq!(app.post(&uri, json!({})).await.status, StatusCode::OK);
    assert_eq!(app.post(&uri, json!({})).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stock_of(order.article_id).await, 5);
}

#[tokio::test]
async fn over_receiving_an_order_line_is_rejected() {
    let app = TestApp::new().await;
    let order = open_order(&app, 3).await;
    let first = receive(&app, &order, 2).await;
    let second = receive(&app, &order, 2).await;

    let ok = app
        .post(
            &format!("/api/v1/receptions/{}/confirm", id_of(&first["reception"])),
            json!({}),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);

    let over = app
        .post(
            &format!("/api/v1/receptions/{}/confirm", id_of(&second["reception"])),
            json!({}),
        )
        .await;
    assert_eq!(over.status, StatusCode::BAD_REQUEST, "{}", over.text());
    assert_eq!(app.stock_of(order.article_id).await, 4);
}

#[tokio::test]
async fn cancelled_orders_accept_no_receptions() {
    let app = TestApp::new().await;
    let order = open_order(&app, 3).await;
    let pending = receive(&app, &order, 1).await;

    let cancelled = app
        .post(
            &format!("/api/v1/purchase-orders/{}/cancel", order.id),
            json!({ "reason": "Supplier out of stock" }),
        )
        .await;
    assert_eq!(cancelled.status, StatusCode::OK, "{}", cancelled.text());
    assert_eq!(cancelled.data()["status"], "CANCELLED");

    let confirm = app
        .post(
            &format!("/api/v1/receptions/{}/confirm", id_of(&pending["reception"])),
            json!({}),
        )
        .await;
    assert_eq!(confirm.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stock_of(order.article_id).await, 2);
}
