//! In-memory stores and sinks for service tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use catalog_core::import::ProductRow;
use catalog_core::listing::{ListingQuery, ProductFilter};
use catalog_core::operation::{Operation, OperationStatus};
use catalog_core::types::{DbId, OperationId, Timestamp};
use catalog_db::models::product::ProductWithCategory;

use crate::error::SinkError;
use crate::export::ReportSink;
use crate::store::{CatalogStore, OperationStore, StoreError};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    operations: HashMap<OperationId, Operation>,
    /// Every saved version of each operation, oldest first.
    history: HashMap<OperationId, Vec<Operation>>,
    products: Vec<ProductWithCategory>,
    categories: Vec<(DbId, String)>,
    next_product_id: DbId,
    batch_calls: usize,
    failing_batches: HashSet<usize>,
    failing_reads_after: Option<usize>,
    read_calls: usize,
    reject_saves: bool,
}

/// Mirrors the PostgreSQL stores' semantics over plain collections.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn add_product(&self, name: &str, price: f64, category: &str) -> DbId {
        let mut inner = self.inner.lock().unwrap();
        let category_id = inner.resolve_category(category);
        inner.insert_product(name, price, category_id, None)
    }

    /// Make the `n`th call to `write_import_batch` (1-based) fail.
    pub fn fail_batch(&self, n: usize) {
        self.inner.lock().unwrap().failing_batches.insert(n);
    }

    /// Make `products_after` fail once it has answered `n` calls.
    pub fn fail_reads_after(&self, n: usize) {
        self.inner.lock().unwrap().failing_reads_after = Some(n);
    }

    /// Make every operation save fail with a store error.
    pub fn reject_saves(&self) {
        self.inner.lock().unwrap().reject_saves = true;
    }

    pub fn products(&self) -> Vec<ProductWithCategory> {
        self.inner.lock().unwrap().products.clone()
    }

    pub fn category_names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.categories.iter().map(|(_, name)| name.clone()).collect()
    }

    /// Statuses the operation has been stored with, in order.
    pub fn status_history(&self, id: OperationId) -> Vec<OperationStatus> {
        let inner = self.inner.lock().unwrap();
        inner
            .history
            .get(&id)
            .map(|versions| versions.iter().map(|op| op.status).collect())
            .unwrap_or_default()
    }

    pub fn history(&self, id: OperationId) -> Vec<Operation> {
        let inner = self.inner.lock().unwrap();
        inner.history.get(&id).cloned().unwrap_or_default()
    }

    pub fn backdate_completion(&self, id: OperationId, by: chrono::Duration) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(op) = inner.operations.get_mut(&id) {
            op.completed_at = op.completed_at.map(|at| at - by);
        }
    }
}

impl Inner {
    fn resolve_category(&mut self, name: &str) -> DbId {
        let lowered = name.to_lowercase();
        if let Some((id, _)) = self.categories.iter().find(|(_, n)| n.to_lowercase() == lowered) {
            return *id;
        }
        let id = self.categories.len() as DbId + 1;
        self.categories.push((id, name.to_string()));
        id
    }

    fn category_name(&self, id: DbId) -> String {
        self.categories
            .iter()
            .find(|(cid, _)| *cid == id)
            .map(|(_, name)| name.clone())
            .unwrap_or_default()
    }

    fn insert_product(
        &mut self,
        name: &str,
        price: f64,
        category_id: DbId,
        image: Option<String>,
    ) -> DbId {
        self.next_product_id += 1;
        let id = self.next_product_id;
        let now = Utc::now();
        self.products.push(ProductWithCategory {
            id,
            name: name.to_string(),
            price,
            category_id,
            category_name: self.category_name(category_id),
            image,
            created_at: now,
            updated_at: now,
        });
        id
    }

    fn record(&mut self, op: &Operation) {
        self.operations.insert(op.id, op.clone());
        self.history.entry(op.id).or_default().push(op.clone());
    }
}

#[async_trait]
impl OperationStore for MemoryStore {
    async fn insert(&self, op: &Operation) -> Result<(), StoreError> {
        self.inner.lock().unwrap().record(op);
        Ok(())
    }

    async fn find(&self, id: OperationId) -> Result<Option<Operation>, StoreError> {
        Ok(self.inner.lock().unwrap().operations.get(&id).cloned())
    }

    async fn save(&self, op: &Operation) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.reject_saves {
            return Err(StoreError::Rejected("operation store unavailable".into()));
        }
        let open = matches!(
            inner.operations.get(&op.id),
            Some(existing) if existing.completed_at.is_none()
        );
        if open {
            inner.record(op);
        }
        Ok(open)
    }

    async fn delete_completed_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.operations.len();
        inner
            .operations
            .retain(|_, op| !matches!(op.completed_at, Some(at) if at < cutoff));
        Ok((before - inner.operations.len()) as u64)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_products(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<ProductWithCategory>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<ProductWithCategory> = inner
            .products
            .iter()
            .filter(|p| query.filter.matches(&p.name, &p.category_name, p.category_id))
            .filter(|p| query.is_after(p.price, p.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| query.sort.compare((a.price, a.id), (b.price, b.id)));
        rows.truncate(usize::try_from(query.fetch_limit).unwrap_or(0));
        Ok(rows)
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .products
            .iter()
            .filter(|p| filter.matches(&p.name, &p.category_name, p.category_id))
            .count() as u64)
    }

    async fn products_after(
        &self,
        after_id: DbId,
        limit: usize,
    ) -> Result<Vec<ProductWithCategory>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.read_calls += 1;
        if matches!(inner.failing_reads_after, Some(n) if inner.read_calls > n) {
            return Err(StoreError::Rejected("connection reset".into()));
        }
        let mut rows: Vec<ProductWithCategory> = inner
            .products
            .iter()
            .filter(|p| p.id > after_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.id);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn write_import_batch(&self, rows: &[ProductRow]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.batch_calls += 1;
        let batch = inner.batch_calls;
        if inner.failing_batches.contains(&batch) {
            return Err(StoreError::Rejected("deadlock detected".into()));
        }

        for row in rows {
            let category_id = inner.resolve_category(&row.category);
            let category_name = inner.category_name(category_id);
            let existing = row
                .id
                .and_then(|id| inner.products.iter().position(|p| p.id == id));
            match existing {
                Some(idx) => {
                    let product = &mut inner.products[idx];
                    product.name = row.name.clone();
                    product.price = row.price;
                    product.category_id = category_id;
                    product.category_name = category_name;
                    product.image = row.image.clone();
                    product.updated_at = Utc::now();
                }
                None => {
                    inner.insert_product(&row.name, row.price, category_id, row.image.clone());
                }
            }
        }
        Ok(rows.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Collects streamed report bytes.
#[derive(Default)]
pub struct VecSink {
    pub chunks: Vec<Bytes>,
    pub closed: bool,
    pub aborted: Option<String>,
    /// Refuse sends once this many chunks have been accepted.
    pub accept_limit: Option<usize>,
}

impl VecSink {
    pub fn body(&self) -> Vec<u8> {
        self.chunks.iter().flat_map(|c| c.iter().copied()).collect()
    }
}

#[async_trait]
impl ReportSink for VecSink {
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if matches!(self.accept_limit, Some(limit) if self.chunks.len() >= limit) {
            return Err(SinkError::Closed);
        }
        self.chunks.push(chunk);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }

    async fn abort(&mut self, reason: &str) {
        self.aborted = Some(reason.to_string());
    }
}
