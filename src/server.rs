//! Catalog HTTP server.
//!
//! Serves the public listing page and a JSON API over the catalog.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/` | HTML listing page |
//! | `GET`    | `/api/apps?category=` | List apps, optionally by category |
//! | `GET`    | `/api/apps/search?q=` | Search apps |
//! | `GET`    | `/api/apps/{id}` | One app |
//! | `POST`   | `/api/apps/{id}/download` | Count a download, return the link |
//! | `GET`    | `/api/stats` | Catalog counters |
//! | `POST`   | `/api/apps` | Add an app (admin) |
//! | `PATCH`  | `/api/apps/{id}` | Update an app (admin) |
//! | `DELETE` | `/api/apps/{id}` | Delete an app (admin) |
//!
//! Admin routes require the `x-admin-password` header.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "validation", "message": "missing required fields: name" } }
//! ```
//!
//! Error codes: `bad_request` (400), `validation` (400), `unauthorized` (401),
//! `not_found` (404), `internal` (500). Admin bodies that are not valid JSON
//! or do not fit the record shape are `bad_request`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use macfreeapps_core::catalog::Catalog;
use macfreeapps_core::error::CatalogError;
use macfreeapps_core::models::{CatalogDraft, CatalogRecord, CatalogStats, Category, RecordPatch};

use crate::config::Config;
use crate::render;
use crate::store_json::JsonFileStore;

pub const ADMIN_HEADER: &str = "x-admin-password";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    catalog: Arc<Catalog<JsonFileStore>>,
    admin_password: Arc<str>,
}

/// Build the router over an existing catalog.
pub fn router(catalog: Arc<Catalog<JsonFileStore>>, admin_password: &str) -> Router {
    let state = AppState {
        catalog,
        admin_password: Arc::from(admin_password),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/apps", get(handle_list).post(handle_add))
        .route("/api/apps/search", get(handle_search))
        .route(
            "/api/apps/{id}",
            get(handle_get).patch(handle_update).delete(handle_delete),
        )
        .route("/api/apps/{id}/download", post(handle_download))
        .route("/api/stats", get(handle_stats))
        .layer(cors)
        .with_state(state)
}

/// Start the server on `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let catalog = Arc::new(Catalog::new(JsonFileStore::new(&config.store.path)));
    let app = router(catalog, &config.admin.password);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("catalog server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let (status, code) = match &err {
            CatalogError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
            CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CatalogError::Storage(e) => {
                tracing::error!("catalog storage failure: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(id: &str) -> AppError {
    CatalogError::NotFound(id.to_string()).into()
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let supplied = headers.get(ADMIN_HEADER).and_then(|v| v.to_str().ok());
    if supplied == Some(&*state.admin_password) {
        return Ok(());
    }
    Err(AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: format!("missing or wrong {} header", ADMIN_HEADER),
    })
}

// ============ Public routes ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_index(State(state): State<AppState>) -> Html<String> {
    Html(render::listing_page(&state.catalog.list(None)))
}

#[derive(Deserialize)]
struct ListQuery {
    category: Option<String>,
}

async fn handle_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CatalogRecord>>, AppError> {
    let filter = match query.category.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(
            Category::parse(raw).ok_or_else(|| bad_request(format!("unknown category: {}", raw)))?,
        ),
    };
    Ok(Json(state.catalog.list(filter)))
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<CatalogRecord>> {
    Json(state.catalog.search(&query.q))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CatalogRecord>, AppError> {
    state.catalog.get(&id).map(Json).ok_or_else(|| not_found(&id))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadResponse {
    id: String,
    download_url: Option<String>,
    views: u64,
}

async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DownloadResponse>, AppError> {
    if state.catalog.get(&id).is_none() {
        return Err(not_found(&id));
    }
    state.catalog.increment_views(&id);
    let app = state.catalog.get(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(DownloadResponse {
        id: app.id,
        download_url: app.download_url,
        views: app.views,
    }))
}

async fn handle_stats(State(state): State<AppState>) -> Json<CatalogStats> {
    Json(state.catalog.stats())
}

// ============ Admin routes ============

/// Decode an admin request body. Call after `require_admin`.
fn parse_body<T: DeserializeOwned>(
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = payload.map_err(|e| bad_request(e.body_text()))?;
    serde_json::from_value(value).map_err(|e| bad_request(format!("invalid body: {}", e)))
}

async fn handle_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CatalogRecord>), AppError> {
    require_admin(&state, &headers)?;
    let draft: CatalogDraft = parse_body(payload)?;
    let record = state.catalog.add(draft)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<CatalogRecord>, AppError> {
    require_admin(&state, &headers)?;
    let patch: RecordPatch = parse_body(payload)?;
    Ok(Json(state.catalog.update(&id, patch)?))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CatalogRecord>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.catalog.delete(&id)?))
}
