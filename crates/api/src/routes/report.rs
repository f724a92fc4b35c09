use axum::routing::get;
use axum::Router;

use crate::handlers::report;
use crate::state::AppState;

/// Routes mounted at `/reports`. Bodies are streamed, so these sit outside
/// the request timeout.
///
/// ```text
/// GET /products.csv   -> products_csv
/// GET /products.xlsx  -> products_xlsx
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products.csv", get(report::products_csv))
        .route("/products.xlsx", get(report::products_xlsx))
}
