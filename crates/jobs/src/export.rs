//! Report export job.
//!
//! Walks the catalog by id in fixed-size batches and streams each encoded
//! batch to a [`ReportSink`] as soon as it is ready, so memory use does not
//! grow with the catalog. The operation ledger tracks progress; a read or
//! sink failure aborts the stream and fails the operation.

use std::io::{self, Read};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use catalog_core::listing::ProductFilter;
use catalog_core::operation::{ExportPatch, MetaPatch, OperationStatus};
use catalog_core::report::{
    ReportEncoder, ReportError, ReportFormat, ReportRecord, EXPORT_BATCH_SIZE,
};
use catalog_db::models::product::ProductWithCategory;
use catalog_core::types::{DbId, OperationId};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{JobError, SinkError};
use crate::ledger::OperationLedger;
use crate::store::CatalogStore;

/// Size of the chunks read back from a spooled report.
const TAIL_CHUNK_BYTES: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Ordered destination for report bytes.
#[async_trait]
pub trait ReportSink: Send {
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Finish the stream normally.
    async fn close(&mut self);

    /// End the stream with an error so the reader sees a broken transfer.
    async fn abort(&mut self, reason: &str);
}

#[async_trait]
impl<'a, T: ReportSink + ?Sized> ReportSink for &'a mut T {
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        (**self).send(chunk).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }

    async fn abort(&mut self, reason: &str) {
        (**self).abort(reason).await
    }
}

/// Sink feeding a bounded channel whose receiver becomes a response body.
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Result<Bytes, io::Error>>>,
}

/// Create a sink and the byte stream that reads from it.
///
/// `capacity` bounds how many chunks may be in flight, which applies
/// backpressure from a slow client to the export loop.
pub fn report_channel(capacity: usize) -> (ChannelSink, ReceiverStream<Result<Bytes, io::Error>>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink { tx: Some(tx) }, ReceiverStream::new(rx))
}

#[async_trait]
impl ReportSink for ChannelSink {
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        let tx = self.tx.as_ref().ok_or(SinkError::Closed)?;
        tx.send(Ok(chunk)).await.map_err(|_| SinkError::Closed)
    }

    async fn close(&mut self) {
        self.tx.take();
    }

    async fn abort(&mut self, reason: &str) {
        if let Some(tx) = self.tx.take() {
            // The receiver may already be gone; nothing left to tell it.
            let _ = tx.send(Err(io::Error::other(reason.to_string()))).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ReportExportJob {
    ledger: OperationLedger,
    catalog: Arc<dyn CatalogStore>,
    batch_size: usize,
}

impl ReportExportJob {
    pub fn new(ledger: OperationLedger, catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            ledger,
            catalog,
            batch_size: EXPORT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Stream the full report into `sink` and record the outcome.
    ///
    /// Returns an error only when the terminal state could not be written.
    pub async fn run<S: ReportSink>(
        &self,
        operation_id: OperationId,
        format: ReportFormat,
        mut sink: S,
    ) -> Result<(), JobError> {
        tracing::info!(operation_id = %operation_id, format = format.as_str(), "Report export started");

        match self.execute(operation_id, format, &mut sink).await {
            Ok(processed) => {
                self.ledger
                    .update_status(
                        operation_id,
                        OperationStatus::Succeeded,
                        Some(MetaPatch::Export(ExportPatch {
                            total_rows: Some(processed),
                            processed_rows: Some(processed),
                            error: None,
                        })),
                    )
                    .await?;
                sink.close().await;
                tracing::info!(operation_id = %operation_id, processed_rows = processed, "Report export succeeded");
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(operation_id = %operation_id, error = %reason, "Report export failed");
                sink.abort(&reason).await;
                self.ledger.fail(operation_id, &reason).await?;
            }
        }
        Ok(())
    }

    async fn execute<S: ReportSink>(
        &self,
        id: OperationId,
        format: ReportFormat,
        sink: &mut S,
    ) -> Result<u64, JobError> {
        let total = self.catalog.count_products(&ProductFilter::default()).await?;
        self.progress(
            id,
            ExportPatch {
                total_rows: Some(total),
                ..ExportPatch::default()
            },
        )
        .await;

        let (mut encoder, preamble) = tokio::task::spawn_blocking(move || {
            let mut encoder = format.encoder()?;
            let preamble = encoder.begin()?;
            Ok::<_, ReportError>((encoder, preamble))
        })
        .await??;
        send_nonempty(sink, preamble).await?;

        let mut processed = 0u64;
        let mut after_id: DbId = 0;
        loop {
            let batch = self.catalog.products_after(after_id, self.batch_size).await?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;
            let batch_len = batch.len();

            let (returned, bytes) =
                tokio::task::spawn_blocking(move || encode_batch(encoder, &batch)).await??;
            encoder = returned;
            send_nonempty(sink, bytes).await?;

            processed += batch_len as u64;
            self.progress(
                id,
                ExportPatch {
                    processed_rows: Some(processed),
                    ..ExportPatch::default()
                },
            )
            .await;

            if batch_len < self.batch_size {
                break;
            }
        }

        let tail = tokio::task::spawn_blocking(move || encoder.finish()).await??;
        stream_tail(tail, sink).await?;
        Ok(processed)
    }

    /// Best-effort `running` update; a failed write is logged and ignored.
    async fn progress(&self, id: OperationId, patch: ExportPatch) {
        if let Err(e) = self
            .ledger
            .update_status(id, OperationStatus::Running, Some(MetaPatch::Export(patch)))
            .await
        {
            tracing::error!(operation_id = %id, error = %e, "Failed to record export progress");
        }
    }
}

/// Encode one page of products. Runs on the blocking pool since the XLSX
/// encoder deflates into a temp file.
fn encode_batch(
    mut encoder: Box<dyn ReportEncoder>,
    batch: &[ProductWithCategory],
) -> Result<(Box<dyn ReportEncoder>, Vec<u8>), ReportError> {
    let records: Vec<ReportRecord<'_>> = batch
        .iter()
        .map(|p| ReportRecord {
            id: p.id,
            name: &p.name,
            price: p.price,
            category: &p.category_name,
            image: p.image.as_deref(),
            created_at: p.created_at,
        })
        .collect();
    let bytes = encoder.write_batch(&records)?;
    Ok((encoder, bytes))
}

async fn send_nonempty<S: ReportSink>(sink: &mut S, bytes: Vec<u8>) -> Result<(), SinkError> {
    if bytes.is_empty() {
        return Ok(());
    }
    sink.send(Bytes::from(bytes)).await
}

/// Copy a finished report reader into the sink in fixed-size chunks.
async fn stream_tail<S: ReportSink>(
    mut reader: Box<dyn Read + Send>,
    sink: &mut S,
) -> Result<(), JobError> {
    loop {
        let (returned, chunk) = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; TAIL_CHUNK_BYTES];
            let n = reader.read(&mut buf)?;
            buf.truncate(n);
            Ok::<_, io::Error>((reader, buf))
        })
        .await?
        .map_err(ReportError::from)?;

        if chunk.is_empty() {
            return Ok(());
        }
        sink.send(Bytes::from(chunk)).await?;
        reader = returned;
    }
}
