//! Handlers for the `/auth` resource (register, login).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use catalog_core::error::CoreError;
use catalog_db::models::user::{CreateUser, User, UserResponse};
use catalog_db::repositories::UserRepo;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /auth/register` and `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<Credentials>,
) -> AppResult<(StatusCode, Json<DataResponse<AuthResponse>>)> {
    let user = create_user(&state, input).await?;
    tracing::info!(user_id = user.id, "User registered");
    let response = issue_token(&state, user)?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

/// POST /auth/login
///
/// An unknown email and a wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<Credentials>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    let invalid = || AppError::Core(CoreError::Unauthorized("Invalid email or password".into()));

    let user = UserRepo::find_by_email(&state.pool, input.email.trim())
        .await?
        .ok_or_else(invalid)?;

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::debug!(user_id = user.id, "Rejected login with wrong password");
        return Err(invalid());
    }

    let response = issue_token(&state, user)?;
    Ok(Json(DataResponse { data: response }))
}

/// Validate credentials, hash the password, and insert the user.
///
/// Shared with `POST /users`. A duplicate email surfaces as a 409 from the
/// `uq_users_email` index.
pub(crate) async fn create_user(state: &AppState, input: Credentials) -> AppResult<User> {
    input.validate().map_err(CoreError::from)?;
    validate_password_strength(&input.password).map_err(CoreError::Validation)?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            email: input.email.trim().to_string(),
            password_hash,
        },
    )
    .await?;
    Ok(user)
}

fn issue_token(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let token = generate_access_token(user.id, &user.email, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    Ok(AuthResponse {
        user: user.into(),
        token,
        expires_in: state.config.jwt.expires_in(),
    })
}
