mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_chair(app: &TestApp, name: &str, quantity: i64) -> String {
    let (status, body) = app
        .post(
            "/api/v1/inventory",
            json!({ "name": name, "price": "8.00", "initial_quantity": quantity }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["ok"], true);
    body["item"]["id"].as_str().unwrap().to_string()
}

fn data(body: &Value) -> &Value {
    assert_eq!(body["success"], true, "{body}");
    &body["data"]
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(Method::GET, "/api/v1/quotes", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/api/v1/quotes", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::GET, "/api/v1/health", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["checks"]["database"], "healthy");
}

#[tokio::test]
async fn mutations_require_admin_role() {
    let app = TestApp::new().await;
    let viewer = app.viewer_token.clone();

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/quotes",
            Some(&viewer),
            Some(json!({
                "name": "Sneaky",
                "start_date": "2024-06-01",
                "end_date": "2024-06-02"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/inventory",
            Some(&viewer),
            Some(json!({ "name": "Chair", "price": "1.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reads are open to any tenant member.
    let (status, body) = app
        .request(Method::GET, "/api/v1/inventory", Some(&viewer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body).as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn create_item_reports_typed_errors() {
    let app = TestApp::new().await;
    create_chair(&app, "Folding Chair", 10).await;

    let (status, body) = app
        .post(
            "/api/v1/inventory",
            json!({ "name": "Folding Chair", "price": "8.00" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "ok": false, "error": "DUPLICATE_NAME" }));

    let (status, body) = app
        .post("/api/v1/inventory", json!({ "name": "   ", "price": "8.00" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION");
}

#[tokio::test]
async fn renaming_onto_a_taken_name_hides_database_detail() {
    let app = TestApp::new().await;
    create_chair(&app, "Folding Chair", 10).await;
    let stool = create_chair(&app, "Bar Stool", 4).await;

    let (status, body) = app
        .put(
            &format!("/api/v1/inventory/{stool}"),
            json!({ "name": "Folding Chair" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict: An item with this name already exists");
    let text = body.to_string().to_lowercase();
    assert!(!text.contains("unique"));
    assert!(!text.contains("inventory_items"));
}

#[tokio::test]
async fn archived_names_can_be_reused() {
    let app = TestApp::new().await;
    let id = create_chair(&app, "Cocktail Table", 4).await;

    let (status, body) = app
        .post(&format!("/api/v1/inventory/{id}/archive"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let archived = data(&body);
    assert_eq!(archived["active"], false);
    assert!(archived["name"]
        .as_str()
        .unwrap()
        .starts_with("Cocktail Table (archived "));

    create_chair(&app, "Cocktail Table", 6).await;

    let (_, body) = app.get("/api/v1/inventory").await;
    assert_eq!(data(&body).as_array().unwrap().len(), 1);
    let (_, body) = app.get("/api/v1/inventory?include_archived=true").await;
    assert_eq!(data(&body).as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn quote_flow_over_http() {
    let app = TestApp::new().await;
    let item_id = create_chair(&app, "Folding Chair", 10).await;

    let (status, body) = app
        .post(
            "/api/v1/quotes",
            json!({
                "name": "Spring Wedding",
                "customer_name": "A. Client",
                "start_date": "2024-06-01",
                "end_date": "2024-06-05"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let quote_id = data(&body)["id"].as_str().unwrap().to_string();
    assert_eq!(data(&body)["status"], "draft");

    // String quantities are accepted.
    let (status, body) = app
        .post(
            &format!("/api/v1/quotes/{quote_id}/items"),
            json!({ "item_id": item_id, "quantity": "6" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let line_id = data(&body)["id"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/api/v1/quotes/{quote_id}/risk")).await;
    assert_eq!(status, StatusCode::OK);
    // 10 available covers 6 plus a buffer of 2.
    assert_eq!(data(&body)["level"], "green");

    let (status, body) = app
        .put(
            &format!("/api/v1/quote-items/{line_id}"),
            json!({ "quantity": 11 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["details"], json!(["Folding Chair"]));

    let (status, body) = app
        .post(&format!("/api/v1/quotes/{quote_id}/confirm"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(data(&body)["quote"]["status"], "accepted");
    let event_id = data(&body)["event_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .get(&format!("/api/v1/inventory/{item_id}/availability"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["total"], 4);

    let (status, body) = app.get(&format!("/api/v1/events/{event_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["inventory"].as_array().unwrap().len(), 1);

    let (status, body) = app.get("/api/v1/quotes?status=accepted").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["total"], 1);

    let (status, _) = app.delete(&format!("/api/v1/quotes/{quote_id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .get(&format!("/api/v1/inventory/{item_id}/availability"))
        .await;
    assert_eq!(data(&body)["total"], 10);
}

#[tokio::test]
async fn availability_window_needs_both_ends() {
    let app = TestApp::new().await;
    let item_id = create_chair(&app, "Bar Stool", 5).await;

    let (status, _) = app
        .get(&format!(
            "/api/v1/inventory/{item_id}/availability?start=2024-06-01"
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .get(&format!(
            "/api/v1/inventory/{item_id}/availability?start=2024-06-01&end=2024-06-03"
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["effective_available"], 5);
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let app = TestApp::new().await;
    let item_id = create_chair(&app, "Folding Chair", 10).await;

    let other = app.token_for_tenant(Uuid::new_v4());
    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/inventory/{item_id}"),
            Some(&other),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The same name is free in another tenant.
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/inventory",
            Some(&other),
            Some(json!({ "name": "Folding Chair", "price": "8.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::new().await;
    let (status, body) = app.get(&format!("/api/v1/quotes/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["request_id"].as_str().is_some());
}
