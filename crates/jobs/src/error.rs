use catalog_core::import::ImportError;
use catalog_core::report::ReportError;

use crate::ledger::LedgerError;
use crate::store::StoreError;

/// The receiving end of a report stream went away.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("Client disconnected before the report finished")]
    Closed,
}

/// Anything that can end a job early.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Could not record operation state: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for JobError {
    fn from(err: tokio::task::JoinError) -> Self {
        JobError::Worker(err.to_string())
    }
}
