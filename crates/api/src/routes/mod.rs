pub mod auth;
pub mod category;
pub mod health;
pub mod operation;
pub mod product;
pub mod report;
pub mod user;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the API route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                  register (public)
/// /auth/login                     login (public)
///
/// /users                          list, create
/// /users/{id}                     get, update, delete
///
/// /categories                     list, create
/// /categories/{id}                get, update, delete
///
/// /products                       list (cursor paginated), create
/// /products/{id}                  get, update, delete
/// /products/bulk-upload           queue an import (POST, no timeout)
///
/// /operations/{id}                poll an operation
///
/// /reports/products.csv           streamed CSV export (no timeout)
/// /reports/products.xlsx          streamed spreadsheet export (no timeout)
/// ```
///
/// Everything except `/auth/*` requires a Bearer token.
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    let timed = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", user::router())
        .nest("/categories", category::router())
        .nest("/products", product::router())
        .nest("/operations", operation::router())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ));

    let streamed = Router::new()
        .merge(product::upload_router(config.max_upload_bytes))
        .nest("/reports", report::router());

    timed.merge(streamed)
}
