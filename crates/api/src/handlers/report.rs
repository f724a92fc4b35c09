//! Streamed product reports under `/reports`.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderName;
use axum::response::{IntoResponse, Response};
use catalog_core::operation::{ExportProgress, OperationMeta};
use catalog_core::report::ReportFormat;
use catalog_jobs::report_channel;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Chunks buffered between the export job and the response body.
const STREAM_BUFFER_CHUNKS: usize = 8;

pub const OPERATION_ID_HEADER: HeaderName = HeaderName::from_static("x-operation-id");

/// GET /reports/products.csv
pub async fn products_csv(user: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    stream_report(user, state, ReportFormat::Csv).await
}

/// GET /reports/products.xlsx
pub async fn products_xlsx(user: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    stream_report(user, state, ReportFormat::Xlsx).await
}

/// Record an export operation and stream its output as the response body.
///
/// The export runs as a supervised job writing into a bounded channel, so a
/// slow client slows the export rather than growing a buffer. A failure after
/// the headers are sent ends the body with an error.
async fn stream_report(user: AuthUser, state: AppState, format: ReportFormat) -> AppResult<Response> {
    let operation = state
        .ledger
        .create(OperationMeta::Export(ExportProgress::new(format)))
        .await?;
    let operation_id = operation.id;
    tracing::info!(
        operation_id = %operation_id,
        user_id = user.user_id,
        format = format.as_str(),
        "Report requested"
    );

    let (sink, body) = report_channel(STREAM_BUFFER_CHUNKS);
    let job = state.export_job.clone();
    state
        .supervisor
        .spawn(operation_id, async move { job.run(operation_id, format, sink).await });

    Ok((
        [
            (CONTENT_TYPE, format.content_type().to_string()),
            (CONTENT_DISPOSITION, format.attachment_header()),
            (OPERATION_ID_HEADER, operation_id.to_string()),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
