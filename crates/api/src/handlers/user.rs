//! Handlers for the `/users` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use catalog_core::error::CoreError;
use catalog_core::types::DbId;
use catalog_db::models::user::{UpdateUser, UserResponse};
use catalog_db::repositories::UserRepo;
use serde::Deserialize;
use validator::Validate;

use crate::auth::password::{hash_password, validate_password_strength};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::{create_user, Credentials};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /users/{id}`. Omitted fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    pub password: Option<String>,
}

/// GET /users
pub async fn list(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let users = UserRepo::list(&state.pool).await?;
    Ok(Json(DataResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
    }))
}

/// GET /users/{id}
pub async fn get_by_id(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found("User", id))?;
    Ok(Json(DataResponse { data: user.into() }))
}

/// POST /users
pub async fn create(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<Credentials>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    let user = create_user(&state, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: user.into() })))
}

/// PUT /users/{id}
pub async fn update(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateUserRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    input.validate().map_err(CoreError::from)?;

    let password_hash = match input.password.as_deref() {
        Some(password) => {
            validate_password_strength(password).map_err(CoreError::Validation)?;
            let hash = hash_password(password)
                .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
            Some(hash)
        }
        None => None,
    };

    let changes = UpdateUser {
        email: input.email.map(|email| email.trim().to_string()),
        password_hash,
    };
    let user = UserRepo::update(&state.pool, id, &changes)
        .await?
        .ok_or_else(|| CoreError::not_found("User", id))?;
    Ok(Json(DataResponse { data: user.into() }))
}

/// DELETE /users/{id}
pub async fn delete(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if UserRepo::delete(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CoreError::not_found("User", id).into())
    }
}
