use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::{json_body, parse_id, ApiError, AppState};
use crate::catalog::ProductFields;
use crate::domain::events::CatalogEvent;
use crate::store::{FindOptions, ProductFilter, ProductSort};

const RECENT_LIMIT: i64 = 8;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    /// `asc` or `desc` by price; anything else keeps insertion order.
    pub sort: Option<String>,
    pub page: Option<i64>,
}

impl ListParams {
    fn filter(&self) -> ProductFilter {
        ProductFilter { search: self.search.clone(), max_price: self.price, category: self.category.clone() }
    }

    fn sort(&self) -> ProductSort {
        match self.sort.as_deref() {
            Some("asc") => ProductSort::PriceAsc,
            Some("desc") => ProductSort::PriceDesc,
            _ => ProductSort::Unsorted,
        }
    }
}

fn total_pages(count: i64, per_page: i64) -> i64 {
    (count + per_page - 1) / per_page
}

pub async fn list_products(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let filter = params.filter();
    let per_page = state.products_per_page;
    let options = FindOptions::page(params.sort(), params.page.unwrap_or(1), per_page);

    let products = state.store.find_products(&filter, options).await?;
    let count = state.store.count_products(&filter).await?;
    Ok(Json(json!({
        "success": true,
        "message": "All Products",
        "products": products,
        "totalPages": total_pages(count, per_page),
    })))
}

pub async fn latest_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let options = FindOptions { sort: ProductSort::Newest, limit: Some(RECENT_LIMIT), skip: 0 };
    let products = state.store.find_products(&ProductFilter::default(), options).await?;
    Ok(Json(json!({ "success": true, "latestProducts": products })))
}

pub async fn old_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let options = FindOptions { sort: ProductSort::Oldest, limit: Some(RECENT_LIMIT), skip: 0 };
    let products = state.store.find_products(&ProductFilter::default(), options).await?;
    Ok(Json(json!({ "success": true, "oldProducts": products })))
}

pub async fn admin_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let filter = ProductFilter::default();
    let options = FindOptions { sort: ProductSort::Newest, ..Default::default() };
    let products = state.store.find_products(&filter, options).await?;
    let count = state.store.count_products(&filter).await?;
    Ok(Json(json!({ "success": true, "products": products, "productsCount": count })))
}

pub async fn product_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Product")?;
    let product = state.store.find_product(id).await?.ok_or_else(|| ApiError::not_found("Product"))?;
    Ok(Json(json!({ "success": true, "product": product })))
}

pub async fn create_product(
    State(state): State<AppState>,
    body: Result<Json<ProductFields>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = json_body(body)?;
    let product = state.pipeline.create(fields).await?;
    state.publish(CatalogEvent::ProductCreated { product_id: product.id, name: product.name.clone() }).await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Product Added Successfully", "product": product })),
    ))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ProductFields>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Product")?;
    let fields = json_body(body)?;
    let product = state.pipeline.update(id, fields).await?;
    state.publish(CatalogEvent::ProductUpdated { product_id: id }).await;
    Ok(Json(json!({ "success": true, "message": "Product Updated Successfully", "product": product })))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Product")?;
    let deleted = state.pipeline.delete(id).await?;
    state
        .publish(CatalogEvent::ProductDeleted { product_id: id, orphaned_images: deleted.orphaned_images.clone() })
        .await;
    Ok(Json(json!({
        "success": true,
        "message": "Product Deleted Successfully",
        "productId": id,
        "orphanedImages": deleted.orphaned_images,
    })))
}
