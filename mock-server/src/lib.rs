use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

/// Used when a building type's formula contains no number.
pub const DEFAULT_RATE: f64 = 1000.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingType {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub estimation_formula: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingTypeInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimation_formula: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub price_per_unit: f64,
    pub description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialInput {
    pub name: String,
    pub unit: String,
    pub price_per_unit: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub building_type_id: Uuid,
    pub area: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    pub status: ProjectStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub building_type_id: Uuid,
    pub area: f64,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
pub struct Store {
    building_types: HashMap<Uuid, BuildingType>,
    materials: HashMap<Uuid, Material>,
    projects: HashMap<Uuid, Project>,
    accounts: HashMap<String, Account>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let api = Router::new()
        .route("/building-types", get(list_building_types).post(create_building_type))
        .route(
            "/building-types/{id}",
            get(get_building_type).put(update_building_type).delete(delete_building_type),
        )
        .route("/materials", get(list_materials).post(create_material))
        .route(
            "/materials/{id}",
            get(get_material).put(update_material).delete(delete_material),
        )
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{id}/estimate", post(estimate_project))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register));
    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn(log_request))
        .with_state(db)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;
    info!(%method, %uri, status = response.status().as_u16(), "request");
    response
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!("mock estimator backend listening on http://{addr}/api");
    }
    axum::serve(listener, app()).await
}

/// Stand-in for the real estimator: the last number in the formula is the
/// cost per square metre.
pub fn rate_from_formula(formula: &str) -> f64 {
    formula
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter_map(|token| token.parse::<f64>().ok())
        .last()
        .unwrap_or(DEFAULT_RATE)
}

// --- building types ---

async fn list_building_types(State(db): State<Db>) -> Json<Vec<BuildingType>> {
    Json(db.read().await.building_types.values().cloned().collect())
}

async fn create_building_type(
    State(db): State<Db>,
    Json(input): Json<BuildingTypeInput>,
) -> (StatusCode, Json<BuildingType>) {
    let building_type = BuildingType {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        estimation_formula: input.estimation_formula,
    };
    db.write()
        .await
        .building_types
        .insert(building_type.id, building_type.clone());
    info!(id = %building_type.id, "created building type");
    (StatusCode::CREATED, Json(building_type))
}

async fn get_building_type(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<BuildingType>, StatusCode> {
    let store = db.read().await;
    store.building_types.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_building_type(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<BuildingTypeInput>,
) -> Result<Json<BuildingType>, StatusCode> {
    let mut store = db.write().await;
    let building_type = store.building_types.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    building_type.name = input.name;
    building_type.description = input.description;
    building_type.estimation_formula = input.estimation_formula;
    Ok(Json(building_type.clone()))
}

async fn delete_building_type(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store
        .building_types
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

// --- materials ---

async fn list_materials(State(db): State<Db>) -> Json<Vec<Material>> {
    Json(db.read().await.materials.values().cloned().collect())
}

async fn create_material(
    State(db): State<Db>,
    Json(input): Json<MaterialInput>,
) -> Result<(StatusCode, Json<Material>), StatusCode> {
    if input.price_per_unit < 0.0 {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let material = Material {
        id: Uuid::new_v4(),
        name: input.name,
        unit: input.unit,
        price_per_unit: input.price_per_unit,
        description: input.description,
    };
    db.write().await.materials.insert(material.id, material.clone());
    info!(id = %material.id, "created material");
    Ok((StatusCode::CREATED, Json(material)))
}

async fn get_material(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Material>, StatusCode> {
    let store = db.read().await;
    store.materials.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_material(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<MaterialInput>,
) -> Result<Json<Material>, StatusCode> {
    if input.price_per_unit < 0.0 {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut store = db.write().await;
    let material = store.materials.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    material.name = input.name;
    material.unit = input.unit;
    material.price_per_unit = input.price_per_unit;
    material.description = input.description;
    Ok(Json(material.clone()))
}

async fn delete_material(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store
        .materials
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

// --- projects ---

async fn list_projects(State(db): State<Db>) -> Json<Vec<Project>> {
    Json(db.read().await.projects.values().cloned().collect())
}

async fn create_project(
    State(db): State<Db>,
    Json(input): Json<ProjectInput>,
) -> (StatusCode, Json<Project>) {
    let project = Project {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        building_type_id: input.building_type_id,
        area: input.area,
        estimated_cost: None,
        status: ProjectStatus::Pending,
    };
    db.write().await.projects.insert(project.id, project.clone());
    info!(id = %project.id, "created project");
    (StatusCode::CREATED, Json(project))
}

async fn get_project(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, StatusCode> {
    let store = db.read().await;
    store.projects.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Full replace of the editable fields; status and estimate are kept.
async fn update_project(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProjectInput>,
) -> Result<Json<Project>, StatusCode> {
    let mut store = db.write().await;
    let project = store.projects.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    project.name = input.name;
    project.description = input.description;
    project.building_type_id = input.building_type_id;
    project.area = input.area;
    Ok(Json(project.clone()))
}

async fn delete_project(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store
        .projects
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn estimate_project(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, StatusCode> {
    let mut store = db.write().await;
    let rate = {
        let project = store.projects.get(&id).ok_or(StatusCode::NOT_FOUND)?;
        store
            .building_types
            .get(&project.building_type_id)
            .map_or(DEFAULT_RATE, |bt| rate_from_formula(&bt.estimation_formula))
    };
    let project = store.projects.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    project.estimated_cost = Some(project.area * rate);
    if project.status == ProjectStatus::Pending {
        project.status = ProjectStatus::InProgress;
    }
    info!(%id, cost = project.area * rate, "estimated project");
    Ok(Json(project.clone()))
}

// --- auth ---

async fn register(
    State(db): State<Db>,
    Json(input): Json<Registration>,
) -> Result<(StatusCode, Json<AuthResponse>), StatusCode> {
    let mut store = db.write().await;
    if store.accounts.contains_key(&input.email) {
        return Err(StatusCode::CONFLICT);
    }
    let user = User {
        id: Uuid::new_v4(),
        email: input.email.clone(),
        name: input.name,
    };
    store.accounts.insert(
        input.email,
        Account {
            user: user.clone(),
            password: input.password,
        },
    );
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: Uuid::new_v4().to_string(),
            user,
        }),
    ))
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<Json<AuthResponse>, StatusCode> {
    let store = db.read().await;
    let account = store
        .accounts
        .get(&input.email)
        .filter(|a| a.password == input.password)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Json(AuthResponse {
        token: Uuid::new_v4().to_string(),
        user: account.user.clone(),
    }))
}
