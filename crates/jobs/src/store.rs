//! Storage seams used by the job services.

use async_trait::async_trait;
use catalog_core::import::ProductRow;
use catalog_core::listing::{ListingQuery, ProductFilter};
use catalog_core::operation::Operation;
use catalog_core::types::{DbId, OperationId, Timestamp};
use catalog_db::models::product::ProductWithCategory;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The store refused the write.
    #[error("{0}")]
    Rejected(String),
}

/// Persistence for operation records.
#[async_trait]
pub trait OperationStore: Send + Sync {
    async fn insert(&self, op: &Operation) -> Result<(), StoreError>;

    async fn find(&self, id: OperationId) -> Result<Option<Operation>, StoreError>;

    /// Overwrite a record that is not yet completed.
    ///
    /// Returns `false` when the record is missing or already terminal.
    async fn save(&self, op: &Operation) -> Result<bool, StoreError>;

    /// Delete records completed before `cutoff`, returning how many went.
    async fn delete_completed_before(&self, cutoff: Timestamp) -> Result<u64, StoreError>;
}

/// Product reads and writes needed by listings, import, and export.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Rows for one listing page, in listing order, at most `fetch_limit`.
    async fn list_products(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<ProductWithCategory>, StoreError>;

    async fn count_products(&self, filter: &ProductFilter) -> Result<u64, StoreError>;

    /// Up to `limit` products with `id > after_id`, ascending by id.
    async fn products_after(
        &self,
        after_id: DbId,
        limit: usize,
    ) -> Result<Vec<ProductWithCategory>, StoreError>;

    /// Write one import batch atomically, returning the rows written.
    async fn write_import_batch(&self, rows: &[ProductRow]) -> Result<u64, StoreError>;
}
