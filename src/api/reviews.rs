use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{json_body, parse_id, ApiError, AppState};
use crate::catalog::ReviewInput;
use crate::domain::aggregates::{Product, ReviewOutcome};
use crate::domain::events::CatalogEvent;
use crate::domain::value_objects::AuthorId;

/// `id` is the product being reviewed.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBody {
    pub id: String,
    #[validate(length(min = 1, message = "Please provide the reviewing user"))]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQuery {
    pub product_id: String,
    /// Review id; only used by delete.
    pub id: Option<String>,
}

pub async fn upsert_review(
    State(state): State<AppState>,
    body: Result<Json<ReviewBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = json_body(body)?;
    body.validate().map_err(|e| ApiError::bad_request(e.to_string()))?;
    let product_id = parse_id(&body.id, "Product")?;

    let review = ReviewInput {
        author: AuthorId::new(body.user_id),
        author_name: body.user_name,
        rating: body.rating,
        comment: body.comment,
    };
    let (product, outcome) = state.pipeline.add_or_update_review(product_id, review).await?;
    state.publish(reviews_changed(product_id, &product)).await;
    let message = match outcome {
        ReviewOutcome::Added => "Review Added Successfully",
        ReviewOutcome::Updated => "Review Updated Successfully",
    };
    Ok(Json(json!({ "success": true, "message": message })))
}

fn reviews_changed(product_id: Uuid, product: &Product) -> CatalogEvent {
    CatalogEvent::ReviewsChanged { product_id, rating: product.rating(), num_of_reviews: product.num_of_reviews() }
}

pub async fn list_reviews(
    State(state): State<AppState>,
    query: Result<Query<ReviewQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let product_id = parse_id(&query.product_id, "Product")?;
    let product = state.store.find_product(product_id).await?.ok_or_else(|| ApiError::not_found("Product"))?;
    Ok(Json(json!({ "success": true, "reviews": product.reviews() })))
}

pub async fn delete_review(
    State(state): State<AppState>,
    query: Result<Query<ReviewQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let product_id = parse_id(&query.product_id, "Product")?;
    let review_id = parse_id(query.id.as_deref().unwrap_or_default(), "Review")?;

    let product = state.pipeline.delete_review(product_id, review_id).await?;
    state.publish(reviews_changed(product_id, &product)).await;
    Ok(Json(json!({ "success": true, "message": "Review Deleted Successfully" })))
}
