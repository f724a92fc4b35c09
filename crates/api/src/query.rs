//! Query parameter types for API handlers.

use catalog_core::types::DbId;
use serde::Deserialize;

/// Query parameters for `GET /products`.
///
/// `limit` is clamped to `1..=100` (default 20). `cursor` is the
/// `nextCursor` of the previous page, passed back verbatim; an unreadable
/// cursor restarts from the first page.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListParams {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    /// `price` (ascending, default) or `-price`.
    pub sort: Option<String>,
    /// Case-insensitive match on product or category name.
    pub q: Option<String>,
    pub category_id: Option<DbId>,
    pub category_name: Option<String>,
}
