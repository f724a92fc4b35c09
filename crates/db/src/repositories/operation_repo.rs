//! Repository for the `operations` ledger table.

use sqlx::PgPool;
use catalog_core::operation::Operation;
use catalog_core::types::{OperationId, Timestamp};

use crate::models::operation::OperationRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, type, status, meta, created_at, updated_at, completed_at";

/// Provides persistence for operation records.
pub struct OperationRepo;

impl OperationRepo {
    /// Insert a new operation record.
    pub async fn insert(pool: &PgPool, op: &Operation) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO operations (id, type, status, meta, created_at, updated_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(op.id)
        .bind(op.kind.as_str())
        .bind(op.status.as_str())
        .bind(op.meta.to_json())
        .bind(op.created_at)
        .bind(op.updated_at)
        .bind(op.completed_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find an operation by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: OperationId,
    ) -> Result<Option<OperationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM operations WHERE id = $1");
        sqlx::query_as::<_, OperationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite status, meta, and timestamps of a non-terminal operation.
    ///
    /// Returns `false` when the row is missing or already completed, so a
    /// terminal record is never rewritten.
    pub async fn save(pool: &PgPool, op: &Operation) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE operations
             SET status = $2, meta = $3, updated_at = $4, completed_at = $5
             WHERE id = $1 AND completed_at IS NULL",
        )
        .bind(op.id)
        .bind(op.status.as_str())
        .bind(op.meta.to_json())
        .bind(op.updated_at)
        .bind(op.completed_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete operations completed before `cutoff`. Returns the number removed.
    pub async fn delete_completed_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM operations WHERE completed_at IS NOT NULL AND completed_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
