//! HTTP surface, mounted under `/api/v1/product`.

mod categories;
mod products;
mod reviews;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::catalog::ProductPipeline;
use crate::domain::events::CatalogEvent;
use crate::store::{CatalogStore, StoreError};
use crate::CatalogError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
    pub pipeline: Arc<ProductPipeline>,
    pub events: Option<async_nats::Client>,
    pub products_per_page: i64,
}

impl AppState {
    /// Fire-and-forget: a failed publish is logged and otherwise ignored.
    pub async fn publish(&self, event: CatalogEvent) {
        let Some(client) = &self.events else { return };
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode catalog event");
                return;
            }
        };
        if let Err(e) = client.publish(CatalogEvent::SUBJECT.to_string(), payload.into()).await {
            tracing::warn!(error = %e, product_id = ?event.product_id(), "failed to publish catalog event");
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "error": { "code": self.code, "message": self.message } });
        (self.status, Json(body)).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::Validation(_) | CatalogError::InvalidImage { .. } | CatalogError::InvalidVariation { .. } => {
                StatusCode::BAD_REQUEST
            }
            CatalogError::Upload(_) => StatusCode::BAD_GATEWAY,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Storage(e) => {
                tracing::error!(error = %e, "catalog store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &err {
            CatalogError::Storage(_) => "Failed to save the catalog".to_string(),
            other => other.to_string(),
        };
        Self::new(status, err.code(), message)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self { CatalogError::Storage(err).into() }
}

pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|e| ApiError::bad_request(e.body_text()))
}

/// Unparseable ids cannot name a document, so they read as missing.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::not_found(what))
}

async fn health(State(state): State<AppState>) -> Response {
    match state.store.health_check().await {
        Ok(()) => Json(json!({ "status": "healthy", "service": "opensase-catalog" })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            let body = Json(json!({ "status": "unhealthy", "service": "opensase-catalog" }));
            (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let product = Router::new()
        .route("/new", post(products::create_product))
        .route("/new/category", post(categories::create_category))
        .route("/allcategories", get(categories::product_categories))
        .route("/categories", get(categories::list_categories))
        .route("/delete/category/:id", delete(categories::delete_category))
        .route("/latest", get(products::latest_products))
        .route("/old", get(products::old_products))
        .route("/all", get(products::list_products))
        .route("/review", put(reviews::upsert_review).delete(reviews::delete_review))
        .route("/reviews/all", get(reviews::list_reviews))
        .route("/admin/products", get(products::admin_products))
        .route("/:id", get(products::product_details).put(products::update_product).delete(products::delete_product));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/product", product)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
