use std::sync::Arc;

use catalog_jobs::{
    BulkImportJob, JobSupervisor, ListingService, OperationLedger, PgStore, ReportExportJob,
};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every field is an `Arc` or a handle around one.
#[derive(Clone)]
pub struct AppState {
    pub pool: catalog_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub ledger: OperationLedger,
    pub listing: ListingService,
    pub import_job: BulkImportJob,
    pub export_job: ReportExportJob,
    /// Runs detached import and export jobs and records their faults.
    pub supervisor: Arc<JobSupervisor>,
}

impl AppState {
    /// Wire the job services over a PostgreSQL store.
    ///
    /// Starts the supervisor's fault recorder, so this must run inside a
    /// Tokio runtime.
    pub fn new(pool: catalog_db::DbPool, config: ServerConfig) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        let ledger = OperationLedger::new(store.clone());

        let import_job = BulkImportJob::new(ledger.clone(), store.clone())
            .with_batch_size(config.import_batch_size);
        let export_job = ReportExportJob::new(ledger.clone(), store.clone())
            .with_batch_size(config.export_batch_size);

        Self {
            pool,
            config: Arc::new(config),
            listing: ListingService::new(store),
            supervisor: Arc::new(JobSupervisor::start(ledger.clone())),
            ledger,
            import_job,
            export_job,
        }
    }
}
