use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogStore, FindOptions, ProductFilter, ProductSort, StoreError};
use crate::domain::aggregates::{Category, Product};

/// Store kept in process memory, mirroring the Postgres store's semantics.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    products: RwLock<HashMap<Uuid, Product>>,
    categories: RwLock<Vec<Category>>,
    fail_next_write: AtomicBool,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self { Self::default() }

    /// The next product create or update fails with [`StoreError::Unavailable`].
    pub fn fail_next_write(&self) { self.fail_next_write.store(true, Ordering::SeqCst); }

    pub async fn product_count(&self) -> usize { self.products.read().await.len() }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scripted write failure".into()));
        }
        Ok(())
    }
}

fn matches(product: &Product, filter: &ProductFilter) -> bool {
    let search_ok = filter.search.as_deref().filter(|s| !s.is_empty()).map_or(true, |s| {
        product.name.to_lowercase().contains(&s.to_lowercase())
    });
    let price_ok = filter.max_price.map_or(true, |max| product.price <= max);
    let category_ok = filter.category.as_deref().filter(|s| !s.is_empty()).map_or(true, |c| product.category == c);
    search_ok && price_ok && category_ok
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn create_product(&self, product: &Product) -> Result<Product, StoreError> {
        self.check_write()?;
        self.products.write().await.insert(product.id, product.clone());
        Ok(product.clone())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn update_product(&self, product: &Product) -> Result<Option<Product>, StoreError> {
        self.check_write()?;
        let mut products = self.products.write().await;
        Ok(products.get_mut(&product.id).map(|slot| {
            *slot = product.clone();
            slot.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.products.write().await.remove(&id).is_some())
    }

    async fn find_products(&self, filter: &ProductFilter, options: FindOptions) -> Result<Vec<Product>, StoreError> {
        let mut found: Vec<Product> =
            self.products.read().await.values().filter(|p| matches(p, filter)).cloned().collect();
        found.sort_by_key(|p| (p.created_at, p.id));
        match options.sort {
            ProductSort::Unsorted | ProductSort::Oldest => {}
            ProductSort::Newest => found.reverse(),
            ProductSort::PriceAsc => found.sort_by(|a, b| a.price.cmp(&b.price)),
            ProductSort::PriceDesc => found.sort_by(|a, b| b.price.cmp(&a.price)),
        }
        let skip = usize::try_from(options.skip).unwrap_or(0);
        let limit = options.limit.and_then(|l| usize::try_from(l).ok()).unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(skip).take(limit).collect())
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<i64, StoreError> {
        Ok(self.products.read().await.values().filter(|p| matches(p, filter)).count() as i64)
    }

    async fn distinct_categories(&self, limit: i64) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.products.read().await.values()
            .filter(|p| !p.category.is_empty())
            .map(|p| p.category.clone())
            .collect();
        names.sort();
        names.dedup();
        names.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(names)
    }

    async fn create_category(&self, category: &Category) -> Result<Category, StoreError> {
        self.categories.write().await.push(category.clone());
        Ok(category.clone())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.categories.read().await.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut categories = self.categories.write().await;
        let before = categories.len();
        categories.retain(|c| c.id != id);
        Ok(categories.len() != before)
    }

    async fn health_check(&self) -> Result<(), StoreError> { Ok(()) }
}
