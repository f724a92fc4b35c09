//! Operation ledger: create, update, read, and sweep operation records.
//!
//! Each operation has exactly one writer (the job that owns it), so updates
//! are read-modify-write without row locks. The store refuses to overwrite a
//! completed record, which keeps terminal states final even if a late
//! update slips through.

use std::sync::Arc;

use chrono::Utc;
use catalog_core::operation::{
    MetaPatch, Operation, OperationError, OperationMeta, OperationStatus, OperationType,
};
use catalog_core::types::OperationId;

use crate::store::{OperationStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Operation {0} not found")]
    NotFound(OperationId),

    #[error("Cannot transition operation from '{from}' to '{to}'")]
    InvalidTransition {
        from: OperationStatus,
        to: OperationStatus,
    },

    #[error("Patch does not match {} operation metadata", .0.as_str())]
    MetaMismatch(OperationType),

    /// The record was completed by someone else between read and write.
    #[error("Operation {0} is already completed")]
    AlreadyCompleted(OperationId),
}

impl From<OperationError> for LedgerError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::InvalidTransition { from, to } => {
                LedgerError::InvalidTransition { from, to }
            }
            OperationError::MetaMismatch(kind) => LedgerError::MetaMismatch(kind),
        }
    }
}

/// Shared handle to the operation store.
#[derive(Clone)]
pub struct OperationLedger {
    store: Arc<dyn OperationStore>,
}

impl OperationLedger {
    pub fn new(store: Arc<dyn OperationStore>) -> Self {
        Self { store }
    }

    /// Record a new queued operation. Its type follows from `meta`.
    pub async fn create(&self, meta: OperationMeta) -> Result<Operation, LedgerError> {
        let op = Operation::new(meta, Utc::now());
        self.store.insert(&op).await?;
        tracing::debug!(operation_id = %op.id, kind = op.kind.as_str(), "Operation queued");
        Ok(op)
    }

    pub async fn get(&self, id: OperationId) -> Result<Option<Operation>, LedgerError> {
        Ok(self.store.find(id).await?)
    }

    /// Move an operation to `status`, shallow-merging `patch` into its meta.
    ///
    /// Entering a terminal status sets `completed_at`. Leaving one is an
    /// [`LedgerError::InvalidTransition`].
    pub async fn update_status(
        &self,
        id: OperationId,
        status: OperationStatus,
        patch: Option<MetaPatch>,
    ) -> Result<Operation, LedgerError> {
        let mut op = self
            .store
            .find(id)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

        op.transition(status, patch, Utc::now())?;

        if !self.store.save(&op).await? {
            return Err(LedgerError::AlreadyCompleted(id));
        }
        Ok(op)
    }

    /// Mark an operation failed with `reason`, unless it already finished.
    ///
    /// Returns `true` when this call wrote the failure.
    pub async fn fail(&self, id: OperationId, reason: &str) -> Result<bool, LedgerError> {
        let Some(mut op) = self.store.find(id).await? else {
            return Err(LedgerError::NotFound(id));
        };
        if op.is_terminal() {
            return Ok(false);
        }

        op.transition(
            OperationStatus::Failed,
            Some(MetaPatch::failure(op.kind, reason)),
            Utc::now(),
        )?;
        Ok(self.store.save(&op).await?)
    }

    /// Delete operations that completed more than `retention` ago.
    pub async fn cleanup(&self, retention: chrono::Duration) -> Result<u64, LedgerError> {
        let cutoff = Utc::now() - retention;
        Ok(self.store.delete_completed_before(cutoff).await?)
    }
}
