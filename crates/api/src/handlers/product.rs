//! Handlers for the `/products` resource, including bulk upload.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use catalog_core::error::CoreError;
use catalog_core::listing::{ProductFilter, SortDirection};
use catalog_core::operation::{ImportProgress, OperationMeta, OperationStatus};
use catalog_core::types::{DbId, OperationId};
use catalog_core::validation::{normalize_image, validate_name};
use catalog_db::models::product::{CreateProduct, ProductResponse, UpdateProduct};
use catalog_db::repositories::{CategoryRepo, ProductRepo};
use catalog_jobs::{ImportRequest, ListingRequest};
use serde::Serialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::ProductListParams;
use crate::response::{DataResponse, PageResponse};
use crate::state::AppState;

/// Multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "file";

/// Body of the 202 returned by `POST /products/bulk-upload`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAccepted {
    pub operation_id: OperationId,
    pub status: OperationStatus,
}

/// GET /products
///
/// One page of products ordered by price with id as tie-break. Pass the
/// returned `nextCursor` back verbatim to get the following page.
pub async fn list(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> AppResult<Json<PageResponse<ProductResponse>>> {
    let request = ListingRequest {
        filter: ProductFilter::new(params.q, params.category_name, params.category_id),
        sort: SortDirection::parse(params.sort.as_deref())?,
        cursor: params.cursor,
        limit: params.limit,
    };

    let page = state.listing.list(request).await?;
    Ok(Json(PageResponse::from_page(page, ProductResponse::from)))
}

/// GET /products/{id}
pub async fn get_by_id(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ProductResponse>>> {
    let product = ProductRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Product", id))?;
    Ok(Json(DataResponse {
        data: product.into(),
    }))
}

/// POST /products
pub async fn create(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateProduct>,
) -> AppResult<(StatusCode, Json<DataResponse<ProductResponse>>)> {
    input.validate().map_err(CoreError::from)?;
    validate_name("name", &input.name)?;
    ensure_category_exists(&state, input.category_id).await?;

    let input = CreateProduct {
        name: input.name.trim().to_string(),
        image: normalize_image(input.image)?,
        ..input
    };
    let product = ProductRepo::create(&state.pool, &input).await?;
    tracing::debug!(product_id = product.id, "Product created");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: product.into(),
        }),
    ))
}

/// PUT /products/{id}
///
/// Only the supplied fields change. An empty `image` leaves the image as is.
pub async fn update(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateProduct>,
) -> AppResult<Json<DataResponse<ProductResponse>>> {
    input.validate().map_err(CoreError::from)?;
    if let Some(name) = &input.name {
        validate_name("name", name)?;
    }
    if let Some(category_id) = input.category_id {
        ensure_category_exists(&state, category_id).await?;
    }

    let input = UpdateProduct {
        name: input.name.map(|name| name.trim().to_string()),
        image: normalize_image(input.image)?,
        ..input
    };
    let product = ProductRepo::update(&state.pool, id, &input)
        .await?
        .ok_or_else(|| CoreError::not_found("Product", id))?;
    Ok(Json(DataResponse {
        data: product.into(),
    }))
}

/// DELETE /products/{id}
pub async fn delete(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if ProductRepo::delete(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CoreError::not_found("Product", id).into())
    }
}

/// POST /products/bulk-upload
///
/// Accepts a CSV or spreadsheet in the `file` field, queues an import
/// operation, and returns immediately. Progress is read from
/// `GET /operations/{id}`.
pub async fn bulk_upload(
    _user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, [(axum::http::HeaderName, String); 1], Json<DataResponse<UploadAccepted>>)>
{
    let (filename, bytes) = read_upload(&mut multipart).await?;

    let operation = state
        .ledger
        .create(OperationMeta::Import(ImportProgress::new(filename.clone())))
        .await?;
    let operation_id = operation.id;
    tracing::info!(
        operation_id = %operation_id,
        filename = %filename,
        size_bytes = bytes.len(),
        "Bulk upload accepted"
    );

    let job = state.import_job.clone();
    state.supervisor.spawn(operation_id, async move {
        job.run(ImportRequest {
            operation_id,
            filename,
            bytes,
        })
        .await
    });

    Ok((
        StatusCode::ACCEPTED,
        [(LOCATION, format!("/operations/{operation_id}"))],
        Json(DataResponse {
            data: UploadAccepted {
                operation_id,
                status: operation.status,
            },
        }),
    ))
}

/// Pull the upload field out of the multipart body, ignoring other fields.
async fn read_upload(multipart: &mut Multipart) -> AppResult<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok((filename, bytes));
    }
    Err(AppError::BadRequest(format!(
        "No file uploaded; expected a multipart field named '{UPLOAD_FIELD}'"
    )))
}

async fn ensure_category_exists(state: &AppState, category_id: DbId) -> AppResult<()> {
    if CategoryRepo::find_by_id(&state.pool, category_id)
        .await?
        .is_none()
    {
        return Err(CoreError::Validation(format!("Category {category_id} does not exist")).into());
    }
    Ok(())
}
