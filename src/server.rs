//!
//! tasknest HTTP server
//! --------------------
//! Axum routes and handlers for the multi-tenant to-do API.
//!
//! Responsibilities:
//! - Registration and login endpoints backed by `security::CredentialStore`.
//! - The authorization gate in front of every tenant-scoped route, keyed on
//!   the `{identity}` path segment.
//! - Task CRUD and field queries delegating to `storage::TenantTasks`.
//!
//! The session token travels as the raw signed artifact in the
//! `Authorization` header, with no scheme prefix.

use std::net::SocketAddr;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::identity::{AuthorizationGate, Sessions};
use crate::security::CredentialStore;
use crate::storage::{SharedStore, TaskField, TaskRecord, TenantTasks};

/// Shared server state injected into all handlers. Built once at startup;
/// every field is cheap to clone and immutable after construction.
#[derive(Clone)]
pub struct AppState {
    pub creds: CredentialStore,
    pub tasks: TenantTasks,
    pub sessions: Sessions,
    pub gate: AuthorizationGate,
}

impl AppState {
    pub fn new(store: SharedStore, sessions: Sessions) -> Self {
        AppState {
            creds: CredentialStore::new(store.clone()),
            tasks: TenantTasks::new(store),
            gate: AuthorizationGate::new(sessions.clone()),
            sessions,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}

/// Start the tasknest HTTP server with the given configuration. Failure to
/// reach the storage engine is fatal.
pub async fn run_with_config(cfg: Config) -> anyhow::Result<()> {
    let store = SharedStore::open(&cfg.db_path)?;
    let sessions = Sessions::new(cfg.signing_key.clone(), cfg.session_ttl);
    let state = AppState::new(store, sessions);

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Mount all routes onto a fresh `Router`. Split out from `run_with_config`
/// so tests can drive the app without binding a socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "tasknest ok" }))
        .route("/register", post(register))
        .route("/login", get(login))
        .route("/{identity}/tasks", get(list_tasks).post(create_task))
        .route(
            "/{identity}/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/{identity}/projects", get(list_projects))
        .route("/{identity}/contexts", get(list_contexts))
        .route("/{identity}/dates", get(list_dates))
        .route("/{identity}/projects/{value}", get(tasks_by_project))
        .route("/{identity}/contexts/{value}", get(tasks_by_context))
        .route("/{identity}/dates/{value}", get(tasks_by_date))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CredentialsPayload {
    identity: String,
    secret: String,
}

/// Raw token from the Authorization header, unprefixed.
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization").and_then(|v| v.to_str().ok())
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<impl IntoResponse, AppError> {
    let principal_id = state.creds.register(&payload.identity, &payload.secret)?;
    Ok((StatusCode::OK, Json(json!({"status": "ok", "principal_id": principal_id}))))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.creds.verify(&payload.identity, &payload.secret)?;
    let token = state.sessions.issue_now(&principal.identity);
    Ok((StatusCode::OK, Json(json!({"status": "ok", "token": token}))))
}

async fn list_tasks(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<TaskRecord>>, AppError> {
    let claims = state.gate.admit(token_from_headers(&headers), &identity)?;
    Ok(Json(state.tasks.list(&claims.identity)?))
}

async fn create_task(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<TaskRecord>,
) -> Result<impl IntoResponse, AppError> {
    let claims = state.gate.admit(token_from_headers(&headers), &identity)?;
    let created = state.tasks.insert(&claims.identity, &payload)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_task(
    State(state): State<AppState>,
    Path((identity, id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<Json<TaskRecord>, AppError> {
    let claims = state.gate.admit(token_from_headers(&headers), &identity)?;
    Ok(Json(state.tasks.get(&claims.identity, id)?))
}

async fn update_task(
    State(state): State<AppState>,
    Path((identity, id)): Path<(String, i64)>,
    headers: HeaderMap,
    Json(payload): Json<TaskRecord>,
) -> Result<impl IntoResponse, AppError> {
    let claims = state.gate.admit(token_from_headers(&headers), &identity)?;
    state.tasks.update(&claims.identity, id, &payload)?;
    let updated = state.tasks.get(&claims.identity, id)?;
    Ok((StatusCode::OK, Json(updated)))
}

async fn delete_task(
    State(state): State<AppState>,
    Path((identity, id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let claims = state.gate.admit(token_from_headers(&headers), &identity)?;
    state.tasks.remove(&claims.identity, id)?;
    Ok((StatusCode::OK, Json(json!({"status": "ok"}))))
}

async fn distinct_field(
    state: &AppState,
    headers: &HeaderMap,
    identity: &str,
    field: TaskField,
) -> Result<Json<Vec<String>>, AppError> {
    let claims = state.gate.admit(token_from_headers(headers), identity)?;
    Ok(Json(state.tasks.distinct_values(&claims.identity, field)?))
}

async fn list_projects(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, AppError> {
    distinct_field(&state, &headers, &identity, TaskField::Project).await
}

async fn list_contexts(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, AppError> {
    distinct_field(&state, &headers, &identity, TaskField::Context).await
}

async fn list_dates(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, AppError> {
    distinct_field(&state, &headers, &identity, TaskField::Date).await
}

async fn field_filter(
    state: &AppState,
    headers: &HeaderMap,
    identity: &str,
    field: TaskField,
    value: &str,
) -> Result<Json<Vec<TaskRecord>>, AppError> {
    let claims = state.gate.admit(token_from_headers(headers), identity)?;
    Ok(Json(state.tasks.find_by_field(&claims.identity, field, value)?))
}

async fn tasks_by_project(
    State(state): State<AppState>,
    Path((identity, value)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Vec<TaskRecord>>, AppError> {
    field_filter(&state, &headers, &identity, TaskField::Project, &value).await
}

async fn tasks_by_context(
    State(state): State<AppState>,
    Path((identity, value)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Vec<TaskRecord>>, AppError> {
    field_filter(&state, &headers, &identity, TaskField::Context, &value).await
}

async fn tasks_by_date(
    State(state): State<AppState>,
    Path((identity, value)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Vec<TaskRecord>>, AppError> {
    field_filter(&state, &headers, &identity, TaskField::Date, &value).await
}
