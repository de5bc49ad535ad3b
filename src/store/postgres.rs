use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{CatalogStore, FindOptions, ProductFilter, ProductSort, StoreError};
use crate::domain::aggregates::{Category, Product};

/// Postgres-backed document store: one JSONB `doc` column per row.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool { &self.pool }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let escaped = search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        qb.push(" AND doc->>'name' ILIKE ").push_bind(format!("%{escaped}%"));
    }
    if let Some(max_price) = filter.max_price {
        qb.push(" AND (doc->>'price')::numeric <= ").push_bind(max_price.to_string()).push("::numeric");
    }
    if let Some(category) = filter.category.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND doc->>'category' = ").push_bind(category.to_string());
    }
}

fn order_clause(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Unsorted => " ORDER BY created_at ASC, id ASC",
        ProductSort::Newest => " ORDER BY created_at DESC",
        ProductSort::Oldest => " ORDER BY created_at ASC",
        ProductSort::PriceAsc => " ORDER BY (doc->>'price')::numeric ASC, created_at ASC",
        ProductSort::PriceDesc => " ORDER BY (doc->>'price')::numeric DESC, created_at ASC",
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn create_product(&self, product: &Product) -> Result<Product, StoreError> {
        let Json(stored) = sqlx::query_scalar::<_, Json<Product>>(
            "INSERT INTO products (id, doc, created_at) VALUES ($1, $2, $3) RETURNING doc",
        )
        .bind(product.id)
        .bind(Json(product))
        .bind(product.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_scalar::<_, Json<Product>>("SELECT doc FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(p)| p))
    }

    async fn update_product(&self, product: &Product) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_scalar::<_, Json<Product>>(
            "UPDATE products SET doc = $2, updated_at = NOW() WHERE id = $1 RETURNING doc",
        )
        .bind(product.id)
        .bind(Json(product))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|Json(p)| p))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_products(&self, filter: &ProductFilter, options: FindOptions) -> Result<Vec<Product>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT doc FROM products");
        push_filters(&mut qb, filter);
        qb.push(order_clause(options.sort));
        if let Some(limit) = options.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        if options.skip > 0 {
            qb.push(" OFFSET ").push_bind(options.skip);
        }
        let rows = qb.build_query_scalar::<Json<Product>>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|Json(p)| p).collect())
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<i64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut qb, filter);
        Ok(qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?)
    }

    async fn distinct_categories(&self, limit: i64) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT doc->>'category' AS category FROM products \
             WHERE COALESCE(doc->>'category', '') <> '' ORDER BY 1 LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_category(&self, category: &Category) -> Result<Category, StoreError> {
        let Json(stored) = sqlx::query_scalar::<_, Json<Category>>(
            "INSERT INTO categories (id, doc, created_at) VALUES ($1, $2, $3) RETURNING doc",
        )
        .bind(category.id)
        .bind(Json(category))
        .bind(category.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_scalar::<_, Json<Category>>("SELECT doc FROM categories ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(c)| c).collect())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
