use axum::{
    http::{self, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use mock_server::{app, AuthResponse, BuildingType, Material, Project, ProjectStatus};
use tower::ServiceExt;
use uuid::Uuid;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

/// Routers share their store across clones, so one router serves a whole scenario.
async fn send(app: &Router, request: Request<String>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

// --- list ---

#[tokio::test]
async fn lists_start_empty() {
    let app = app();
    for path in ["/api/building-types", "/api/materials", "/api/projects"] {
        let resp = send(&app, empty_request("GET", path)).await;
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
        let items: Vec<serde_json::Value> = body_json(resp).await;
        assert!(items.is_empty(), "{path}");
    }
}

#[tokio::test]
async fn routes_live_under_api_prefix() {
    let resp = send(&app(), empty_request("GET", "/materials")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- create ---

#[tokio::test]
async fn create_material_returns_201() {
    let resp = send(
        &app(),
        json_request(
            "POST",
            "/api/materials",
            r#"{"name":"Cement","unit":"bag","pricePerUnit":12.5,"description":"Portland"}"#,
        ),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let material: Material = body_json(resp).await;
    assert_eq!(material.name, "Cement");
    assert_eq!(material.price_per_unit, 12.5);
}

#[tokio::test]
async fn create_material_malformed_json_returns_422() {
    let resp = send(
        &app(),
        json_request("POST", "/api/materials", r#"{"name":"Cement"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_material_negative_price_returns_422() {
    let resp = send(
        &app(),
        json_request(
            "POST",
            "/api/materials",
            r#"{"name":"Cement","unit":"bag","pricePerUnit":-1,"description":""}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_project_without_building_type_returns_422() {
    let resp = send(
        &app(),
        json_request(
            "POST",
            "/api/projects",
            r#"{"name":"Warehouse A","description":"","buildingTypeId":"","area":500}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- missing ids ---

#[tokio::test]
async fn unknown_ids_return_404() {
    let app = app();
    let id = Uuid::new_v4();
    let requests = [
        empty_request("GET", &format!("/api/materials/{id}")),
        empty_request("DELETE", &format!("/api/building-types/{id}")),
        empty_request("POST", &format!("/api/projects/{id}/estimate")),
        json_request(
            "PUT",
            &format!("/api/materials/{id}"),
            r#"{"name":"x","unit":"kg","pricePerUnit":1,"description":""}"#,
        ),
    ];
    for request in requests {
        let uri = request.uri().clone();
        let resp = send(&app, request).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn get_bad_uuid_returns_400() {
    let resp = send(&app(), empty_request("GET", "/api/materials/not-a-uuid")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn material_crud_lifecycle() {
    let app = app();

    let resp = send(
        &app,
        json_request(
            "POST",
            "/api/materials",
            r#"{"name":"Sand","unit":"ton","pricePerUnit":30,"description":""}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Material = body_json(resp).await;
    let id = created.id;

    let resp = send(&app, empty_request("GET", "/api/materials")).await;
    let materials: Vec<Material> = body_json(resp).await;
    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].id, id);

    let resp = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/materials/{id}"),
            r#"{"name":"Sand","unit":"ton","pricePerUnit":35,"description":"washed"}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Material = body_json(resp).await;
    assert_eq!(updated.price_per_unit, 35.0);
    assert_eq!(updated.description, "washed");

    let resp = send(&app, empty_request("DELETE", &format!("/api/materials/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = send(&app, empty_request("GET", &format!("/api/materials/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- estimate ---

async fn create_building_type(app: &Router, formula: &str) -> BuildingType {
    let body = serde_json::json!({
        "name": "Warehouse",
        "description": "Single-storey steel frame",
        "estimationFormula": formula,
    });
    let resp = send(
        app,
        json_request("POST", "/api/building-types", &body.to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

async fn create_project(app: &Router, building_type_id: Uuid, area: f64) -> Project {
    let body = serde_json::json!({
        "name": "Warehouse A",
        "description": "",
        "buildingTypeId": building_type_id,
        "area": area,
    });
    let resp = send(app, json_request("POST", "/api/projects", &body.to_string())).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

#[tokio::test]
async fn estimate_uses_formula_rate_and_advances_status() {
    let app = app();
    let building_type = create_building_type(&app, "area * 1200").await;
    let project = create_project(&app, building_type.id, 500.0).await;
    assert_eq!(project.status, ProjectStatus::Pending);
    assert!(project.estimated_cost.is_none());

    let uri = format!("/api/projects/{}/estimate", project.id);
    let resp = send(&app, empty_request("POST", &uri)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let estimated: Project = body_json(resp).await;
    assert_eq!(estimated.estimated_cost, Some(600_000.0));
    assert_eq!(estimated.status, ProjectStatus::InProgress);

    let resp = send(&app, empty_request("GET", &format!("/api/projects/{}", project.id))).await;
    let stored: Project = body_json(resp).await;
    assert_eq!(stored.estimated_cost, Some(600_000.0));
}

#[tokio::test]
async fn estimate_falls_back_to_default_rate() {
    let app = app();
    let project = create_project(&app, Uuid::new_v4(), 2.0).await;

    let uri = format!("/api/projects/{}/estimate", project.id);
    let resp = send(&app, empty_request("POST", &uri)).await;
    let estimated: Project = body_json(resp).await;
    assert_eq!(estimated.estimated_cost, Some(2.0 * mock_server::DEFAULT_RATE));
}

// --- auth ---

#[tokio::test]
async fn register_then_login() {
    let app = app();
    let registration = r#"{"email":"ana@example.com","password":"secret","name":"Ana"}"#;

    let resp = send(&app, json_request("POST", "/api/auth/register", registration)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let registered: AuthResponse = body_json(resp).await;
    assert!(!registered.token.is_empty());
    assert_eq!(registered.user.name, "Ana");

    let resp = send(&app, json_request("POST", "/api/auth/register", registration)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            r#"{"email":"ana@example.com","password":"secret"}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let logged_in: AuthResponse = body_json(resp).await;
    assert_eq!(logged_in.user.id, registered.user.id);
}

#[tokio::test]
async fn login_with_wrong_password_returns_401() {
    let app = app();
    send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            r#"{"email":"ana@example.com","password":"secret","name":"Ana"}"#,
        ),
    )
    .await;

    let resp = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            r#"{"email":"ana@example.com","password":"guess"}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
