//! Route definitions for the `/products` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::product;
use crate::state::AppState;

/// Routes mounted at `/products`.
///
/// ```text
/// GET    /      -> list (cursor paginated)
/// POST   /      -> create
/// GET    /{id}  -> get_by_id
/// PUT    /{id}  -> update
/// DELETE /{id}  -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(product::list).post(product::create))
        .route(
            "/{id}",
            get(product::get_by_id)
                .put(product::update)
                .delete(product::delete),
        )
}

/// `POST /products/bulk-upload`, with its own body limit.
///
/// Kept apart from [`router`] so the request timeout does not cut off large
/// uploads.
pub fn upload_router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new().route(
        "/products/bulk-upload",
        post(product::bulk_upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
    )
}
