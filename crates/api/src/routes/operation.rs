use axum::routing::get;
use axum::Router;

use crate::handlers::operation;
use crate::state::AppState;

/// Routes mounted at `/operations`.
///
/// ```text
/// GET /{id}  -> get_by_id
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(operation::get_by_id))
}
