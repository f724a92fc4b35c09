//! `AppError` to HTTP response mapping, checked through `IntoResponse`
//! directly without a server.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;

use catalog_api::error::AppError;
use catalog_core::error::CoreError;
use catalog_jobs::{LedgerError, StoreError};

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn not_found_returns_404() {
    let (status, json) = error_to_response(CoreError::not_found("Product", 42).into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Product with id 42 not found");
}

#[tokio::test]
async fn validation_returns_400() {
    let err = CoreError::Validation("Category 9 does not exist".into());
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "Category 9 does not exist");
}

#[tokio::test]
async fn bad_request_returns_400() {
    let (status, json) = error_to_response(AppError::BadRequest("No file uploaded".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn conflict_returns_409() {
    let (status, json) =
        error_to_response(CoreError::Conflict("duplicate name".into()).into()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn internal_errors_are_sanitized() {
    let (status, json) =
        error_to_response(AppError::InternalError("secret stack detail".into())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn row_not_found_returns_404() {
    let (status, json) = error_to_response(sqlx::Error::RowNotFound.into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Resource not found");
}

#[tokio::test]
async fn missing_operation_returns_404() {
    let id = uuid::Uuid::now_v7();
    let (status, json) = error_to_response(LedgerError::NotFound(id).into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], format!("Operation with id {id} not found"));
}

#[tokio::test]
async fn store_failures_are_sanitized() {
    let err = StoreError::Corrupt("meta column held an array".into());
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn ledger_database_errors_use_sqlx_classification() {
    let err = LedgerError::Store(StoreError::Database(sqlx::Error::RowNotFound));
    let (status, _) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
