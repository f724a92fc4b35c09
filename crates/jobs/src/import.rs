//! Bulk import job.
//!
//! Parses an uploaded file into product rows, writes them in fixed-size
//! batches, and reports progress to the operation ledger after every batch.
//! A failed batch is recorded and skipped; only a file that cannot be read at
//! all fails the operation.

use std::sync::Arc;

use bytes::Bytes;
use catalog_core::import::{parse_rows, ImportFormat, ParsedRows, IMPORT_BATCH_SIZE};
use catalog_core::operation::{ImportPatch, MetaPatch, OperationStatus};
use catalog_core::types::OperationId;

use crate::error::JobError;
use crate::ledger::OperationLedger;
use crate::store::CatalogStore;

/// An accepted upload waiting to be imported.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub operation_id: OperationId,
    pub filename: String,
    pub bytes: Bytes,
}

/// Final counts of a completed import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub total_rows: u64,
    pub processed_rows: u64,
    pub skipped_rows: u64,
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn patch(&self) -> MetaPatch {
        MetaPatch::Import(ImportPatch {
            total_rows: Some(self.total_rows),
            processed_rows: Some(self.processed_rows),
            skipped_rows: Some(self.skipped_rows),
            errors: Some(self.errors.clone()),
            error: None,
        })
    }
}

#[derive(Clone)]
pub struct BulkImportJob {
    ledger: OperationLedger,
    catalog: Arc<dyn CatalogStore>,
    batch_size: usize,
}

impl BulkImportJob {
    pub fn new(ledger: OperationLedger, catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            ledger,
            catalog,
            batch_size: IMPORT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run the import to a terminal state.
    ///
    /// Returns an error only when the terminal state could not be written,
    /// so the caller can still record the failure.
    pub async fn run(&self, request: ImportRequest) -> Result<(), JobError> {
        let id = request.operation_id;
        tracing::info!(operation_id = %id, filename = %request.filename, "Bulk import started");

        match self.execute(request).await {
            Ok(summary) => {
                self.ledger
                    .update_status(id, OperationStatus::Succeeded, Some(summary.patch()))
                    .await?;
                tracing::info!(
                    operation_id = %id,
                    total_rows = summary.total_rows,
                    processed_rows = summary.processed_rows,
                    skipped_rows = summary.skipped_rows,
                    failed_batches = summary.errors.len(),
                    "Bulk import succeeded"
                );
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(operation_id = %id, error = %reason, "Bulk import failed");
                self.ledger.fail(id, &reason).await?;
            }
        }
        Ok(())
    }

    async fn execute(&self, request: ImportRequest) -> Result<ImportSummary, JobError> {
        let id = request.operation_id;
        self.progress(id, None).await;

        let format = ImportFormat::from_filename(&request.filename)?;
        let bytes = request.bytes;
        let ParsedRows { rows, skipped } =
            tokio::task::spawn_blocking(move || parse_rows(format, &bytes)).await??;

        let mut summary = ImportSummary {
            total_rows: rows.len() as u64,
            skipped_rows: skipped as u64,
            ..ImportSummary::default()
        };
        self.progress(
            id,
            Some(ImportPatch {
                total_rows: Some(summary.total_rows),
                skipped_rows: Some(summary.skipped_rows),
                ..ImportPatch::default()
            }),
        )
        .await;

        for (index, batch) in rows.chunks(self.batch_size).enumerate() {
            let batch_number = index + 1;
            match self.catalog.write_import_batch(batch).await {
                Ok(written) => summary.processed_rows += written,
                Err(e) => {
                    tracing::warn!(
                        operation_id = %id,
                        batch = batch_number,
                        rows = batch.len(),
                        error = %e,
                        "Import batch failed"
                    );
                    summary.errors.push(format!("Batch {batch_number}: {e}"));
                }
            }

            self.progress(
                id,
                Some(ImportPatch {
                    processed_rows: Some(summary.processed_rows),
                    errors: Some(summary.errors.clone()),
                    ..ImportPatch::default()
                }),
            )
            .await;
        }

        Ok(summary)
    }

    /// Best-effort `running` update; a failed write is logged and ignored.
    async fn progress(&self, id: OperationId, patch: Option<ImportPatch>) {
        let patch = patch.map(MetaPatch::Import);
        if let Err(e) = self
            .ledger
            .update_status(id, OperationStatus::Running, patch)
            .await
        {
            tracing::error!(operation_id = %id, error = %e, "Failed to record import progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use catalog_core::operation::{ImportProgress, OperationMeta};

    use super::*;
    use crate::testing::MemoryStore;

    fn csv(rows: usize) -> Bytes {
        let mut body = String::from("name,price,category,image\n");
        for i in 0..rows {
            body.push_str(&format!("Item {i},{}.5,Category {},\n", i + 1, i % 3));
        }
        Bytes::from(body)
    }

    async fn setup() -> (Arc<MemoryStore>, OperationLedger, OperationId) {
        let store = Arc::new(MemoryStore::default());
        let ledger = OperationLedger::new(store.clone());
        let op = ledger
            .create(OperationMeta::Import(ImportProgress::new("products.csv")))
            .await
            .unwrap();
        (store, ledger, op.id)
    }

    fn progress(meta: &OperationMeta) -> &ImportProgress {
        match meta {
            OperationMeta::Import(progress) => progress,
            other => panic!("expected import meta, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn imports_all_rows_and_succeeds() {
        let (store, ledger, id) = setup().await;
        let job = BulkImportJob::new(ledger.clone(), store.clone()).with_batch_size(4);

        job.run(ImportRequest {
            operation_id: id,
            filename: "products.csv".into(),
            bytes: csv(10),
        })
        .await
        .unwrap();

        let op = ledger.get(id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Succeeded);
        assert!(op.completed_at.is_some());
        let meta = progress(&op.meta);
        assert_eq!(meta.total_rows, 10);
        assert_eq!(meta.processed_rows, 10);
        assert!(meta.errors.is_empty());
        assert_eq!(store.products().len(), 10);
        assert_eq!(store.category_names().len(), 3);
    }

    #[tokio::test]
    async fn statuses_are_monotonic_and_progress_never_regresses() {
        let (store, ledger, id) = setup().await;
        let job = BulkImportJob::new(ledger, store.clone()).with_batch_size(3);

        job.run(ImportRequest {
            operation_id: id,
            filename: "products.csv".into(),
            bytes: csv(9),
        })
        .await
        .unwrap();

        let statuses = store.status_history(id);
        assert_eq!(statuses.first(), Some(&OperationStatus::Queued));
        assert_eq!(statuses.last(), Some(&OperationStatus::Succeeded));
        assert!(statuses[1..statuses.len() - 1]
            .iter()
            .all(|s| *s == OperationStatus::Running));

        let history = store.history(id);
        let processed: Vec<u64> = history.iter().map(|op| progress(&op.meta).processed_rows).collect();
        assert!(processed.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(
            history.iter().filter(|op| op.completed_at.is_some()).count(),
            1
        );
    }

    #[tokio::test]
    async fn failed_batch_is_recorded_and_skipped() {
        let (store, ledger, id) = setup().await;
        store.fail_batch(2);
        let job = BulkImportJob::new(ledger.clone(), store.clone()).with_batch_size(4);

        // Batches of 4, 4, 2.
        job.run(ImportRequest {
            operation_id: id,
            filename: "products.csv".into(),
            bytes: csv(10),
        })
        .await
        .unwrap();

        let op = ledger.get(id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Succeeded);
        let meta = progress(&op.meta);
        assert_eq!(meta.total_rows, 10);
        assert_eq!(meta.processed_rows, 6);
        assert_eq!(meta.errors.len(), 1);
        assert!(meta.errors[0].starts_with("Batch 2: "));
        assert_eq!(store.products().len(), 6);
    }

    #[tokio::test]
    async fn skipped_rows_do_not_fail_the_job() {
        let (store, ledger, id) = setup().await;
        let job = BulkImportJob::new(ledger.clone(), store);

        job.run(ImportRequest {
            operation_id: id,
            filename: "products.csv".into(),
            bytes: Bytes::from_static(b"name,price,category\nLamp,5,Lighting\n,3,Lighting\nBulb,-1,Lighting\n"),
        })
        .await
        .unwrap();

        let op = ledger.get(id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Succeeded);
        let meta = progress(&op.meta);
        assert_eq!(meta.processed_rows, 1);
        assert_eq!(meta.skipped_rows, 2);
    }

    #[tokio::test]
    async fn unsupported_format_fails_the_operation() {
        let (store, ledger, id) = setup().await;
        let job = BulkImportJob::new(ledger.clone(), store.clone());

        job.run(ImportRequest {
            operation_id: id,
            filename: "products.pdf".into(),
            bytes: Bytes::from_static(b"%PDF-1.7"),
        })
        .await
        .unwrap();

        let op = ledger.get(id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert!(op.completed_at.is_some());
        assert_matches!(
            &progress(&op.meta).error,
            Some(reason) if reason.contains("Unsupported file format")
        );
        assert_eq!(
            store.status_history(id),
            vec![
                OperationStatus::Queued,
                OperationStatus::Running,
                OperationStatus::Failed
            ]
        );
    }

    #[tokio::test]
    async fn corrupt_file_fails_the_operation() {
        let (store, ledger, id) = setup().await;
        let job = BulkImportJob::new(ledger.clone(), store);

        job.run(ImportRequest {
            operation_id: id,
            filename: "products.xlsx".into(),
            bytes: Bytes::from_static(b"not a zip archive"),
        })
        .await
        .unwrap();

        let op = ledger.get(id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert!(progress(&op.meta).error.is_some());
    }

    #[tokio::test]
    async fn rows_with_ids_update_existing_products() {
        let (store, ledger, id) = setup().await;
        let existing = store.add_product("Old name", 1.0, "Misc");
        let job = BulkImportJob::new(ledger, store.clone());

        let body = format!("id,name,price,category\n{existing},New name,2.5,misc\n,Fresh,3,Other\n");
        job.run(ImportRequest {
            operation_id: id,
            filename: "products.csv".into(),
            bytes: Bytes::from(body),
        })
        .await
        .unwrap();

        let products = store.products();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, existing);
        assert_eq!(products[0].name, "New name");
        assert_eq!(products[0].category_name, "Misc");
        assert_eq!(store.category_names(), vec!["Misc", "Other"]);
    }

    #[tokio::test]
    async fn unrecordable_terminal_state_is_returned_to_the_caller() {
        let (store, ledger, id) = setup().await;
        store.reject_saves();
        let job = BulkImportJob::new(ledger, store);

        let result = job
            .run(ImportRequest {
                operation_id: id,
                filename: "products.csv".into(),
                bytes: csv(2),
            })
            .await;
        assert_matches!(result, Err(JobError::Ledger(_)));
    }
}
