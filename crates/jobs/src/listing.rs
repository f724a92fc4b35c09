//! Product listing with seek pagination.

use std::sync::Arc;

use catalog_core::listing::{ListingQuery, ProductFilter, SortDirection};
use catalog_core::pagination::{clamp_limit, decode_cursor, Page, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use catalog_db::models::product::ProductWithCategory;

use crate::store::{CatalogStore, StoreError};

/// One listing request as received from a client.
#[derive(Debug, Clone, Default)]
pub struct ListingRequest {
    pub filter: ProductFilter,
    pub sort: SortDirection,
    /// Opaque token from a previous page's `next_cursor`.
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Clone)]
pub struct ListingService {
    catalog: Arc<dyn CatalogStore>,
}

impl ListingService {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Fetch one page.
    ///
    /// An unreadable cursor starts from the beginning. One row beyond the
    /// page size is fetched to learn whether another page exists; it is never
    /// returned.
    pub async fn list(
        &self,
        request: ListingRequest,
    ) -> Result<Page<ProductWithCategory>, StoreError> {
        let limit = clamp_limit(request.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        let after = request.cursor.as_deref().and_then(decode_cursor);
        if request.cursor.is_some() && after.is_none() {
            tracing::debug!("Ignoring unreadable listing cursor");
        }

        let query = ListingQuery {
            filter: request.filter,
            sort: request.sort,
            after,
            fetch_limit: limit + 1,
        };
        let rows = self.catalog.list_products(&query).await?;
        Ok(Page::from_overfetch(
            rows,
            limit,
            ProductWithCategory::price_cursor,
        ))
    }
}
