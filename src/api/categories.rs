use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{json_body, parse_id, ApiError, AppState};
use crate::domain::aggregates::Category;
use crate::domain::events::CatalogEvent;

const DISTINCT_LIMIT: i64 = 10;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    #[validate(length(min = 1, message = "Please enter product category"))]
    #[serde(alias = "name")]
    pub category: String,
    #[validate(length(min = 1, message = "Please enter product sub-category"))]
    #[serde(default)]
    pub sub_category: Vec<String>,
}

pub async fn create_category(
    State(state): State<AppState>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = json_body(body)?;
    input.validate().map_err(|e| ApiError::bad_request(e.to_string()))?;
    let category =
        Category::create(input.category, input.sub_category).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let saved = state.store.create_category(&category).await?;
    tracing::info!(category_id = %saved.id, name = %saved.name, "category created");
    state.publish(CatalogEvent::CategoryCreated { category_id: saved.id, name: saved.name.clone() }).await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Category Added Successfully", "category": saved })),
    ))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state.store.list_categories().await?;
    Ok(Json(json!({ "success": true, "categories": categories })))
}

/// Category names in use by products, not the category documents.
pub async fn product_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let all_categories = state.store.distinct_categories(DISTINCT_LIMIT).await?;
    Ok(Json(json!({ "success": true, "allCategories": all_categories })))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Category")?;
    if !state.store.delete_category(id).await? {
        return Err(ApiError::not_found("Category"));
    }
    tracing::info!(category_id = %id, "category deleted");
    state.publish(CatalogEvent::CategoryDeleted { category_id: id }).await;
    Ok(Json(json!({ "success": true, "message": "Category Deleted Successfully" })))
}
