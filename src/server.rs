//! HTTP adapter over the catalog.
//!
//! Decodes requests, calls the [`Catalog`] facade, and encodes results as
//! JSON. No catalog logic lives here.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/items` | All items in insertion order |
//! | `POST`   | `/items` | Multipart upload: `name`, `category`, `image` |
//! | `GET`    | `/items/{id}` | One item |
//! | `DELETE` | `/items/{id}` | Delete an item (204) |
//! | `GET`    | `/search?keyword=` | Case-insensitive name search |
//! | `GET`    | `/categories` | All categories |
//! | `GET`    | `/images/{name}` | Raw image bytes by blob key |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid name: must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `payload_too_large` (413), `internal` (500). Storage failures are
//! logged server-side and reported with an opaque message.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use catalog_store_core::{CatalogError, Category, Item};

use crate::catalog::{open_catalog, Catalog};
use crate::config::Config;

/// Build the router. Split from [`run_server`] so tests can serve it on
/// their own listener.
pub fn router(catalog: Catalog, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/items", get(handle_list_items).post(handle_add_item))
        .route(
            "/items/{id}",
            get(handle_get_item).delete(handle_delete_item),
        )
        .route("/search", get(handle_search))
        .route("/categories", get(handle_list_categories))
        .route("/images/{name}", get(handle_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(catalog)
}

/// Open the configured catalog and serve it on `[server].bind` until
/// Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let catalog = open_catalog(config).await?;
    let app = router(catalog.clone(), config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        backend = catalog.backend(),
        "catalog server listening"
    );
    println!("Catalog server listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: "internal error".to_string(),
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation { .. } => bad_request(err.to_string()),
            CatalogError::NotFound(_) => not_found(err.to_string()),
            CatalogError::Conflict(_) | CatalogError::Cancelled | CatalogError::Storage(_) => {
                error!(error = %err, "request failed");
                internal()
            }
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            AppError {
                status,
                code: "payload_too_large",
                message: err.body_text(),
            }
        } else {
            bad_request(err.body_text())
        }
    }
}

// ============ GET /health ============

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

// ============ Items ============

#[derive(Serialize)]
struct ItemsResponse {
    items: Vec<Item>,
}

async fn handle_list_items(State(catalog): State<Catalog>) -> Result<Json<ItemsResponse>, AppError> {
    let items = catalog.list_items().await?;
    Ok(Json(ItemsResponse { items }))
}

/// Handler for `POST /items`.
///
/// Reads the `name`, `category`, and `image` multipart fields; other fields
/// are ignored. A missing field reaches the facade as empty and is rejected
/// there, naming the field.
async fn handle_add_item(
    State(catalog): State<Catalog>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let mut name = String::new();
    let mut category = String::new();
    let mut image = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = field.text().await?,
            "category" => category = field.text().await?,
            "image" => image = field.bytes().await?.to_vec(),
            _ => {}
        }
    }

    let item = catalog.add_item(&name, &category, &image).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn handle_get_item(
    State(catalog): State<Catalog>,
    Path(id): Path<i64>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(catalog.get_item(id).await?))
}

async fn handle_delete_item(
    State(catalog): State<Catalog>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    catalog.delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    keyword: String,
}

async fn handle_search(
    State(catalog): State<Catalog>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ItemsResponse>, AppError> {
    let items = catalog.search_items(&params.keyword).await?;
    Ok(Json(ItemsResponse { items }))
}

// ============ GET /categories ============

#[derive(Serialize)]
struct CategoriesResponse {
    categories: Vec<Category>,
}

async fn handle_list_categories(
    State(catalog): State<Catalog>,
) -> Result<Json<CategoriesResponse>, AppError> {
    let categories = catalog.list_categories().await?;
    Ok(Json(CategoriesResponse { categories }))
}

// ============ GET /images/{name} ============

async fn handle_image(
    State(catalog): State<Catalog>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let bytes = catalog
        .image(&name)
        .await?
        .ok_or_else(|| not_found(format!("image not found: {}", name)))?;
    let content_type = content_type_for(&name);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_for("abc.jpg"), "image/jpeg");
        assert_eq!(content_type_for("abc.PNG"), "image/png");
        assert_eq!(content_type_for("abc.bin"), "application/octet-stream");
    }

    #[test]
    fn test_storage_errors_are_opaque() {
        let err: AppError = CatalogError::storage(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal error");

        let err: AppError = CatalogError::NotFound(7).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "not_found");
    }
}
