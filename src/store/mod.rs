//! Catalog persistence.
//!
//! Products and categories are whole documents: a write replaces one
//! document atomically, and nothing spans two documents or two calls.

mod memory;
mod postgres;

pub use memory::InMemoryCatalogStore;
pub use postgres::PgCatalogStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Category, Product};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductFilter {
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
    /// Inclusive upper bound on price.
    pub max_price: Option<Decimal>,
    pub category: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProductSort {
    /// Insertion order.
    #[default]
    Unsorted,
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: ProductSort,
    pub limit: Option<i64>,
    pub skip: i64,
}

impl FindOptions {
    /// 1-based paging. Out of range page numbers saturate instead of overflowing.
    pub fn page(sort: ProductSort, page: i64, per_page: i64) -> Self {
        let skip = page.max(1).saturating_sub(1).saturating_mul(per_page);
        Self { sort, limit: Some(per_page), skip }
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_product(&self, product: &Product) -> Result<Product, StoreError>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    /// Replaces the stored document; `None` when no document has that id.
    async fn update_product(&self, product: &Product) -> Result<Option<Product>, StoreError>;
    async fn delete_product(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn find_products(&self, filter: &ProductFilter, options: FindOptions) -> Result<Vec<Product>, StoreError>;
    async fn count_products(&self, filter: &ProductFilter) -> Result<i64, StoreError>;
    /// Distinct non-empty product categories, alphabetical.
    async fn distinct_categories(&self, limit: i64) -> Result<Vec<String>, StoreError>;

    async fn create_category(&self, category: &Category) -> Result<Category, StoreError>;
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    async fn delete_category(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_options() {
        let expected = FindOptions { sort: ProductSort::PriceAsc, limit: Some(8), skip: 16 };
        assert_eq!(FindOptions::page(ProductSort::PriceAsc, 3, 8), expected);
        assert_eq!(FindOptions::page(ProductSort::Unsorted, 0, 8).skip, 0);
    }

    #[test]
    fn test_huge_page_saturates() {
        let options = FindOptions::page(ProductSort::Unsorted, i64::MAX, 8);
        assert_eq!(options.skip, i64::MAX);
        assert_eq!(options.limit, Some(8));
        assert_eq!(FindOptions::page(ProductSort::Unsorted, i64::MIN, 8).skip, 0);
    }
}
