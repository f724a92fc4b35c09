//! Operation ledger row.
//!
//! `type` and `status` are stored as their wire names and `meta` as JSONB;
//! [`OperationRow::into_operation`] turns a row back into the typed record.

use sqlx::FromRow;
use catalog_core::error::CoreError;
use catalog_core::operation::{Operation, OperationMeta, OperationStatus, OperationType};
use catalog_core::types::{OperationId, Timestamp};

/// A row from the `operations` table.
#[derive(Debug, Clone, FromRow)]
pub struct OperationRow {
    pub id: OperationId,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub status: String,
    pub meta: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl OperationRow {
    pub fn into_operation(self) -> Result<Operation, CoreError> {
        let kind = OperationType::parse(&self.kind).ok_or_else(|| {
            CoreError::Internal(format!("operation {} has unknown type '{}'", self.id, self.kind))
        })?;
        let status = OperationStatus::parse(&self.status).ok_or_else(|| {
            CoreError::Internal(format!(
                "operation {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;
        let meta = OperationMeta::from_json(kind, self.meta).map_err(|e| {
            CoreError::Internal(format!("operation {} has unreadable meta: {e}", self.id))
        })?;

        Ok(Operation {
            id: self.id,
            kind,
            status,
            meta,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}
