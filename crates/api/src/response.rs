//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use catalog_core::pagination::Page;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Cursor state returned alongside a listing page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub has_next_page: bool,
    pub next_cursor: Option<String>,
    pub limit: i64,
}

/// `{ "data": [...], "pagination": {...} }` for seek-paginated listings.
#[derive(Debug, Serialize)]
pub struct PageResponse<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: PaginationInfo,
}

impl<T: Serialize> PageResponse<T> {
    /// Convert each row of `page` and attach its cursor state.
    pub fn from_page<R>(page: Page<R>, convert: impl FnMut(R) -> T) -> Self {
        Self {
            data: page.items.into_iter().map(convert).collect(),
            pagination: PaginationInfo {
                has_next_page: page.has_next_page,
                next_cursor: page.next_cursor,
                limit: page.limit,
            },
        }
    }
}
