//! Handler for polling `/operations/{id}`.

use axum::extract::{Path, State};
use axum::Json;
use catalog_core::error::CoreError;
use catalog_core::operation::Operation;
use catalog_core::types::OperationId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /operations/{id}
///
/// A `succeeded` import may still carry batch errors in `meta.errors`.
/// Records are swept some days after they complete and then read as 404.
pub async fn get_by_id(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<OperationId>,
) -> AppResult<Json<DataResponse<Operation>>> {
    let operation = state
        .ledger
        .get(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Operation", id))?;
    Ok(Json(DataResponse { data: operation }))
}
