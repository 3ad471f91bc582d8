mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use common::{id_of, TestApp};
use erp_api::auth::consts as perm;

struct Fixture {
    app: TestApp,
    warehouse_id: Uuid,
    article_id: Uuid,
    approval_type: Uuid,
    direct_type: Uuid,
}

async fn fixture(initial_stock: i32) -> Fixture {
    let app = TestApp::new().await;
    let warehouse_id = app.warehouse("MAIN").await;
    let article_id = app.article("BOLT-10", warehouse_id, initial_stock).await;
    let approval_type = app
        .catalog_entry("request-types", "MAINT", json!({ "requires_approval": true }))
        .await;
    let direct_type = app
        .catalog_entry("request-types", "URGENT", json!({ "requires_approval": false }))
        .await;
    Fixture {
        app,
        warehouse_id,
        article_id,
        approval_type,
        direct_type,
    }
}

fn request_body(f: &Fixture, request_type_id: Uuid, quantity: i32) -> Value {
    json!({
        "request_type_id": request_type_id,
        "kind": "ARTICLE",
        "reason": "Replace worn bolts on line 2",
        "warehouse_id": f.warehouse_id,
        "lines": [{ "article_id": f.article_id, "quantity": quantity }],
    })
}

fn detail_id(view: &Value) -> Uuid {
    id_of(&view["lines"][0])
}

#[tokio::test]
async fn approval_then_dispatch_moves_stock() {
    let f = fixture(50).await;

    let created = f
        .app
        .post("/api/v1/requests", request_body(&f, f.approval_type, 10))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text());
    let view = created.data();
    assert_eq!(view["request"]["status"], "PENDING");
    let request_id = id_of(&view["request"]);
    let line = detail_id(&view);

    let approved = f
        .app
        .post(
            &format!("/api/v1/requests/{}/approve", request_id),
            json!({ "lines": [{ "detail_id": line, "quantity": 6 }] }),
        )
        .await;
    assert_eq!(approved.status, StatusCode::OK, "{}", approved.text());
    assert_eq!(approved.data()["request"]["status"], "APPROVED");
    assert_eq!(approved.data()["lines"][0]["approved_quantity"], 6);

    let dispatched = f
        .app
        .post(&format!("/api/v1/requests/{}/dispatch", request_id), json!({}))
        .await;
    assert_eq!(dispatched.status, StatusCode::OK, "{}", dispatched.text());
    assert_eq!(dispatched.data()["request"]["status"], "DISPATCHED");

    assert_eq!(f.app.stock_of(f.article_id).await, 44);

    let detail = f
        .app
        .get(&format!("/api/v1/requests/{}", request_id))
        .await
        .data();
    let line = &detail["lines"][0];
    let requested = line["requested_quantity"].as_i64().unwrap();
    let approved = line["approved_quantity"].as_i64().unwrap();
    let dispatched = line["dispatched_quantity"].as_i64().unwrap();
    assert!(dispatched <= approved && approved <= requested);

    let history = f
        .app
        .get(&format!("/api/v1/requests/{}/history", request_id))
        .await;
    assert_eq!(history.status, StatusCode::OK);
    let entries = history.data().as_array().map(Vec::len).unwrap_or(0);
    assert!(entries >= 3, "expected create, approve and dispatch entries");
}

#[tokio::test]
async fn request_types_without_approval_start_approved() {
    let f = fixture(5).await;

    let created = f
        .app
        .post("/api/v1/requests", request_body(&f, f.direct_type, 3))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text());
    let view = created.data();
    assert_eq!(view["request"]["status"], "APPROVED");
    assert_eq!(view["lines"][0]["approved_quantity"], 3);

    let approve_again = f
        .app
        .post(
            &format!("/api/v1/requests/{}/approve", id_of(&view["request"])),
            json!({}),
        )
        .await;
    assert_eq!(approve_again.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn double_approval_is_rejected() {
    let f = fixture(20).await;
    let view = f
        .app
        .post("/api/v1/requests", request_body(&f, f.approval_type, 4))
        .await
        .data();
    let uri = format!("/api/v1/requests/{}/approve", id_of(&view["request"]));

    assert_eq!(f.app.post(&uri, json!({})).await.status, StatusCode::OK);
    let second = f.app.post(&uri, json!({})).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST, "{}", second.text());
}

#[tokio::test]
async fn approving_more_than_requested_fails() {
    let f = fixture(20).await;
    let view = f
        .app
        .post("/api/v1/requests", request_body(&f, f.approval_type, 4))
        .await
        .data();

    let response = f
        .app
        .post(
            &format!("/api/v1/requests/{}/approve", id_of(&view["request"])),
            json!({ "lines": [{ "detail_id": detail_id(&view), "quantity": 5 }] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_requests_cannot_be_dispatched() {
    let f = fixture(20).await;
    let view = f
        .app
        .post("/api/v1/requests", request_body(&f, f.approval_type, 2))
        .await
        .data();

    let response = f
        .app
        .post(
            &format!("/api/v1/requests/{}/dispatch", id_of(&view["request"])),
            json!({}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", response.text());
    assert_eq!(f.app.stock_of(f.article_id).await, 20);
}

#[tokio::test]
async fn dispatch_without_stock_leaves_everything_untouched() {
    let f = fixture(1).await;
    let view = f
        .app
        .post("/api/v1/requests", request_body(&f, f.direct_type, 3))
        .await
        .data();
    let request_id = id_of(&view["request"]);

    let response = f
        .app
        .post(&format!("/api/v1/requests/{}/dispatch", request_id), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(f.app.stock_of(f.article_id).await, 1);
    let detail = f
        .app
        .get(&format!("/api/v1/requests/{}", request_id))
        .await
        .data();
    assert_eq!(detail["request"]["status"], "APPROVED");
    assert_eq!(detail["lines"][0]["dispatched_quantity"], 0);
}

#[tokio::test]
async fn rejection_requires_a_reason_and_closes_the_request() {
    let f = fixture(10).await;
    let view = f
        .app
        .post("/api/v1/requests", request_body(&f, f.approval_type, 2))
        .await
        .data();
    let uri = format!("/api/v1/requests/{}/reject", id_of(&view["request"]));

    let missing = f.app.post(&uri, json!({ "reason": "" })).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let rejected = f.app.post(&uri, json!({ "reason": "Budget exhausted" })).await;
    assert_eq!(rejected.status, StatusCode::OK, "{}", rejected.text());
    assert_eq!(rejected.data()["request"]["status"], "REJECTED");

    let again = f.app.post(&uri, json!({ "reason": "Still no" })).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_pending_requests_can_be_deleted_and_then_disappear() {
    let f = fixture(10).await;
    let pending = f
        .app
        .post("/api/v1/requests", request_body(&f, f.approval_type, 1))
        .await
        .data();
    let approved = f
        .app
        .post("/api/v1/requests", request_body(&f, f.direct_type, 1))
        .await
        .data();

    let blocked = f
        .app
        .delete(&format!("/api/v1/requests/{}", id_of(&approved["request"])))
        .await;
    assert_eq!(blocked.status, StatusCode::BAD_REQUEST);

    let pending_id = id_of(&pending["request"]);
    let deleted = f
        .app
        .delete(&format!("/api/v1/requests/{}", pending_id))
        .await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.text());

    let gone = f.app.get(&format!("/api/v1/requests/{}", pending_id)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let listed = f.app.get("/api/v1/requests").await.data();
    let ids: Vec<&str> = listed["items"]
        .as_array()
        .map(|items| items.iter().filter_map(|r| r["id"].as_str()).collect())
        .unwrap_or_default();
    assert!(!ids.contains(&pending_id.to_string().as_str()));
}

#[tokio::test]
async fn requesters_only_see_their_own_requests() {
    let f = fixture(10).await;
    let (_, alice) = f.app.user_with("alice", &[perm::REQUESTS_CREATE]).await;
    let (_, bob) = f.app.user_with("bob", &[perm::REQUESTS_CREATE]).await;

    let created = f
        .app
        .request(
            Method::POST,
            "/api/v1/requests",
            Some(&alice),
            Some(request_body(&f, f.approval_type, 1)),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text());
    let request_id = id_of(&created.data()["request"]);

    let foreign = f
        .app
        .request(
            Method::GET,
            &format!("/api/v1/requests/{}", request_id),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let bob_edit = f
        .app
        .request(
            Method::PUT,
            &format!("/api/v1/requests/{}", request_id),
            Some(&bob),
            Some(request_body(&f, f.approval_type, 2)),
        )
        .await;
    assert!(bob_edit.status.is_client_error());

    let mine = f
        .app
        .request(Method::GET, "/api/v1/requests/mine", Some(&bob), None)
        .await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.data()["total"], 0);

    let approve = f
        .app
        .request(
            Method::POST,
            &format!("/api/v1/requests/{}/approve", request_id),
            Some(&alice),
            Some(json!({})),
        )
        .await;
    assert_eq!(approve.status, StatusCode::FORBIDDEN);

    let all = f
        .app
        .request(Method::GET, "/api/v1/requests", Some(&alice), None)
        .await;
    assert_eq!(all.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn dispatch_screen_shows_pending_quantities() {
    let f = fixture(30).await;
    let view = f
        .app
        .post("/api/v1/requests", request_body(&f, f.direct_type, 8))
        .await
        .data();
    let request_id = id_of(&view["request"]);

    f.app
        .post(
            &format!("/api/v1/requests/{}/dispatch", request_id),
            json!({ "lines": [{ "detail_id": detail_id(&view), "quantity": 3 }] }),
        )
        .await;

    let screen = f
        .app
        .get(&format!("/api/v1/requests/{}/lines", request_id))
        .await;
    assert_eq!(screen.status, StatusCode::OK, "{}", screen.text());
    let line = &screen.data()["lines"][0];
    assert_eq!(line["approved"], 8);
    assert_eq!(line["dispatched"], 3);
    assert_eq!(line["pending"], 5);
    assert_eq!(line["stock"], 27);
}

#[tokio::test]
async fn only_pending_or_rejected_requests_can_be_edited() {
    let f = fixture(40).await;

    let view = f
        .app
        .post("/api/v1/requests", request_body(&f, f.approval_type, 4))
        .await
        .data();
    let request_id = id_of(&view["request"]);
    let uri = format!("/api/v1/requests/{}", request_id);

    f.app
        .post(&format!("{}/approve", uri), json!({}))
        .await;
    let approved_edit = f.app.put(&uri, request_body(&f, f.approval_type, 2)).await;
    assert_eq!(approved_edit.status, StatusCode::BAD_REQUEST, "{}", approved_edit.text());

    let dispatched = f.app.post(&format!("{}/dispatch", uri), json!({})).await;
    assert_eq!(dispatched.status, StatusCode::OK, "{}", dispatched.text());
    let dispatched_edit = f.app.put(&uri, request_body(&f, f.approval_type, 2)).await;
    assert_eq!(dispatched_edit.status, StatusCode::BAD_REQUEST);
    assert_eq!(f.app.stock_of(f.article_id).await, 36);
}

#[tokio::test]
async fn editing_a_rejected_request_reopens_it() {
    let f = fixture(10).await;
    let view = f
        .app
        .post("/api/v1/requests", request_body(&f, f.approval_type, 4))
        .await
        .data();
    let uri = format!("/api/v1/requests/{}", id_of(&view["request"]));

    let rejected = f
        .app
        .post(&format!("{}/reject", uri), json!({ "reason": "Wrong quantity" }))
        .await;
    assert_eq!(rejected.data()["request"]["status"], "REJECTED");

    let edited = f.app.put(&uri, request_body(&f, f.approval_type, 3)).await;
    assert_eq!(edited.status, StatusCode::OK, "{}", edited.text());
    let edited = edited.data();
    assert_eq!(edited["request"]["status"], "PENDING");
    assert_eq!(edited["lines"].as_array().map(Vec::len), Some(1));
    assert_eq!(edited["lines"][0]["requested_quantity"], 3);

    let approved = f.app.post(&format!("{}/approve", uri), json!({})).await;
    assert_eq!(approved.status, StatusCode::OK, "{}", approved.text());
}

#[tokio::test]
async fn asset_requests_dispatch_without_touching_stock() {
    let f = fixture(15).await;
    let asset = f
        .app
        .post(
            "/api/v1/assets",
            json!({ "code": "DRL-01", "name": "Cordless drill", "serial_number": "SN-4411" }),
        )
        .await;
    assert_eq!(asset.status, StatusCode::CREATED, "{}", asset.text());
    let asset_id = id_of(&asset.data());

    let created = f
        .app
        .post(
            "/api/v1/requests",
            json!({
                "request_type_id": f.approval_type,
                "kind": "ASSET",
                "reason": "Drill for the assembly cell",
                "lines": [{ "asset_id": asset_id, "quantity": 1 }],
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text());
    let view = created.data();
    assert_eq!(view["request"]["kind"], "ASSET");
    let uri = format!("/api/v1/requests/{}", id_of(&view["request"]));

    let approved = f.app.post(&format!("{}/approve", uri), json!({})).await;
    assert_eq!(approved.status, StatusCode::OK, "{}", approved.text());

    let dispatched = f.app.post(&format!("{}/dispatch", uri), json!({})).await;
    assert_eq!(dispatched.status, StatusCode::OK, "{}", dispatched.text());
    let result = dispatched.data();
    assert_eq!(result["request"]["status"], "DISPATCHED");
    assert_eq!(result["delivery"]["kind"], "ASSET");

    let delivery = f
        .app
        .get(&format!("/api/v1/deliveries/{}", id_of(&result["delivery"])))
        .await
        .data();
    assert_eq!(delivery["lines"][0]["asset_id"], json!(asset_id));
    assert_eq!(delivery["lines"][0]["quantity"], 1);
    assert_eq!(f.app.stock_of(f.article_id).await, 15);

    let movements = f
        .app
        .get(&format!("/api/v1/movements?article_id={}", f.article_id))
        .await
        .data();
    assert_eq!(movements["total"], 1, "only the opening entry");
}
