//! PostgreSQL-backed stores.

use async_trait::async_trait;
use catalog_core::import::ProductRow;
use catalog_core::listing::{ListingQuery, ProductFilter};
use catalog_core::operation::Operation;
use catalog_core::types::{DbId, OperationId, Timestamp};
use catalog_db::models::product::ProductWithCategory;
use catalog_db::repositories::{OperationRepo, ProductRepo};
use catalog_db::DbPool;

use crate::store::{CatalogStore, OperationStore, StoreError};

/// Implements both store traits over the repositories.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OperationStore for PgStore {
    async fn insert(&self, op: &Operation) -> Result<(), StoreError> {
        OperationRepo::insert(&self.pool, op).await?;
        Ok(())
    }

    async fn find(&self, id: OperationId) -> Result<Option<Operation>, StoreError> {
        let Some(row) = OperationRepo::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        row.into_operation()
            .map(Some)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn save(&self, op: &Operation) -> Result<bool, StoreError> {
        Ok(OperationRepo::save(&self.pool, op).await?)
    }

    async fn delete_completed_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        Ok(OperationRepo::delete_completed_before(&self.pool, cutoff).await?)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_products(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<ProductWithCategory>, StoreError> {
        Ok(ProductRepo::list_page(&self.pool, query).await?)
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<u64, StoreError> {
        let count = ProductRepo::count(&self.pool, filter).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn products_after(
        &self,
        after_id: DbId,
        limit: usize,
    ) -> Result<Vec<ProductWithCategory>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(ProductRepo::list_after_id(&self.pool, after_id, limit).await?)
    }

    async fn write_import_batch(&self, rows: &[ProductRow]) -> Result<u64, StoreError> {
        Ok(ProductRepo::write_import_batch(&self.pool, rows).await?)
    }
}
