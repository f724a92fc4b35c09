//! Handlers for the `/categories` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use catalog_core::error::CoreError;
use catalog_core::types::DbId;
use catalog_core::validation::validate_name;
use catalog_db::models::category::{Category, CategoryWithCount, CreateCategory, UpdateCategory};
use catalog_db::repositories::CategoryRepo;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /categories
///
/// Name ascending, each with its product count.
pub async fn list(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<CategoryWithCount>>>> {
    let categories = CategoryRepo::list_with_counts(&state.pool).await?;
    Ok(Json(DataResponse { data: categories }))
}

/// GET /categories/{id}
pub async fn get_by_id(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<CategoryWithCount>>> {
    let category = CategoryRepo::find_with_count(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Category", id))?;
    Ok(Json(DataResponse { data: category }))
}

/// POST /categories
///
/// Names are unique regardless of case; a clash is a 409.
pub async fn create(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateCategory>,
) -> AppResult<(StatusCode, Json<DataResponse<Category>>)> {
    input.validate().map_err(CoreError::from)?;
    validate_name("name", &input.name)?;

    let category = CategoryRepo::create(&state.pool, input.name.trim()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: category })))
}

/// PUT /categories/{id}
pub async fn update(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateCategory>,
) -> AppResult<Json<DataResponse<Category>>> {
    input.validate().map_err(CoreError::from)?;
    if let Some(name) = &input.name {
        validate_name("name", name)?;
    }

    let category = CategoryRepo::update(&state.pool, id, input.name.as_deref().map(str::trim))
        .await?
        .ok_or_else(|| CoreError::not_found("Category", id))?;
    Ok(Json(DataResponse { data: category }))
}

/// DELETE /categories/{id}
///
/// A category still referenced by products cannot be deleted (409).
pub async fn delete(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if CategoryRepo::delete(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CoreError::not_found("Category", id).into())
    }
}
