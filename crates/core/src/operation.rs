//! Operation state machine and typed progress metadata.
//!
//! An operation moves `queued -> running -> (succeeded | failed)`. A queued
//! operation may also fail directly when its job dies before starting.
//! Progress updates re-enter `running` any number of times; nothing leaves a
//! terminal state.
//!
//! `meta` is a per-type progress struct. Updates carry a patch whose `Some`
//! fields replace the stored ones (one level deep, never recursive).

use serde::{Deserialize, Serialize};

use crate::report::ReportFormat;
use crate::types::{OperationId, Timestamp};

// ---------------------------------------------------------------------------
// Type and status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    BulkImport,
    ReportExport,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BulkImport => "bulk_import",
            Self::ReportExport => "report_export",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bulk_import" => Some(Self::BulkImport),
            "report_export" => Some(Self::ReportExport),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl OperationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Valid transitions:
    /// - queued -> running | failed
    /// - running -> running | succeeded | failed
    pub fn can_transition_to(self, next: Self) -> bool {
        use OperationStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Queued, Failed) | (Running, Running | Succeeded | Failed)
        )
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Progress metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub filename: String,
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub processed_rows: u64,
    #[serde(default)]
    pub skipped_rows: u64,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportProgress {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    pub report_format: ReportFormat,
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub processed_rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportProgress {
    pub fn new(report_format: ReportFormat) -> Self {
        Self {
            report_format,
            total_rows: 0,
            processed_rows: 0,
            error: None,
        }
    }
}

/// Fields to overwrite on an [`ImportProgress`]. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPatch {
    pub total_rows: Option<u64>,
    pub processed_rows: Option<u64>,
    pub skipped_rows: Option<u64>,
    pub errors: Option<Vec<String>>,
    pub error: Option<String>,
}

/// Fields to overwrite on an [`ExportProgress`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportPatch {
    pub total_rows: Option<u64>,
    pub processed_rows: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaPatch {
    Import(ImportPatch),
    Export(ExportPatch),
}

impl MetaPatch {
    /// Patch that records a failure reason on either kind of operation.
    pub fn failure(kind: OperationType, reason: impl Into<String>) -> Self {
        let reason = Some(reason.into());
        match kind {
            OperationType::BulkImport => Self::Import(ImportPatch {
                error: reason,
                ..ImportPatch::default()
            }),
            OperationType::ReportExport => Self::Export(ExportPatch {
                error: reason,
                ..ExportPatch::default()
            }),
        }
    }
}

/// Progress metadata, one variant per [`OperationType`].
///
/// Serialized without a tag: the owning operation's `type` says which
/// variant the JSON holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationMeta {
    Import(ImportProgress),
    Export(ExportProgress),
}

impl OperationMeta {
    pub fn kind(&self) -> OperationType {
        match self {
            Self::Import(_) => OperationType::BulkImport,
            Self::Export(_) => OperationType::ReportExport,
        }
    }

    /// Decode stored JSON for an operation of the given type.
    pub fn from_json(kind: OperationType, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            OperationType::BulkImport => Self::Import(serde_json::from_value(value)?),
            OperationType::ReportExport => Self::Export(serde_json::from_value(value)?),
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Plain structs of strings and integers; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Shallow-merge a patch of the matching kind.
    ///
    /// `processed_rows` never moves backwards, so a late or duplicate update
    /// cannot make observed progress regress.
    pub fn apply(&mut self, patch: MetaPatch) -> Result<(), OperationError> {
        match (self, patch) {
            (Self::Import(meta), MetaPatch::Import(patch)) => {
                if let Some(total) = patch.total_rows {
                    meta.total_rows = total;
                }
                if let Some(processed) = patch.processed_rows {
                    meta.processed_rows = meta.processed_rows.max(processed);
                }
                if let Some(skipped) = patch.skipped_rows {
                    meta.skipped_rows = skipped;
                }
                if let Some(errors) = patch.errors {
                    meta.errors = errors;
                }
                if patch.error.is_some() {
                    meta.error = patch.error;
                }
                Ok(())
            }
            (Self::Export(meta), MetaPatch::Export(patch)) => {
                if let Some(total) = patch.total_rows {
                    meta.total_rows = total;
                }
                if let Some(processed) = patch.processed_rows {
                    meta.processed_rows = meta.processed_rows.max(processed);
                }
                if patch.error.is_some() {
                    meta.error = patch.error;
                }
                Ok(())
            }
            (meta, _) => Err(OperationError::MetaMismatch(meta.kind())),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperationError {
    #[error("Cannot transition operation from '{from}' to '{to}'")]
    InvalidTransition {
        from: OperationStatus,
        to: OperationStatus,
    },

    #[error("Patch does not match {} operation metadata", .0.as_str())]
    MetaMismatch(OperationType),
}

/// One tracked asynchronous job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    #[serde(rename = "type")]
    pub kind: OperationType,
    pub status: OperationStatus,
    pub meta: OperationMeta,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Operation {
    /// A new queued operation. The type follows from the meta variant.
    pub fn new(meta: OperationMeta, now: Timestamp) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            kind: meta.kind(),
            status: OperationStatus::Queued,
            meta,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, merging `patch` into the meta.
    ///
    /// Entering a terminal status stamps `completed_at`. The record is left
    /// untouched when the transition or patch is rejected.
    pub fn transition(
        &mut self,
        next: OperationStatus,
        patch: Option<MetaPatch>,
        now: Timestamp,
    ) -> Result<(), OperationError> {
        if !self.status.can_transition_to(next) {
            return Err(OperationError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        if let Some(patch) = patch {
            let mut meta = self.meta.clone();
            meta.apply(patch)?;
            self.meta = meta;
        }

        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    use super::*;

    fn import_op() -> Operation {
        Operation::new(
            OperationMeta::Import(ImportProgress::new("products.csv")),
            Utc::now(),
        )
    }

    #[test]
    fn new_operation_is_queued() {
        let op = import_op();
        assert_eq!(op.status, OperationStatus::Queued);
        assert_eq!(op.kind, OperationType::BulkImport);
        assert_eq!(op.created_at, op.updated_at);
        assert_eq!(op.completed_at, None);
    }

    #[test]
    fn valid_transitions() {
        use OperationStatus::*;
        assert!(Queued.can_transition_to(Running));
        assert!(Queued.can_transition_to(Failed));
        assert!(Running.can_transition_to(Running));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));
    }

    #[test]
    fn invalid_transitions() {
        use OperationStatus::*;
        assert!(!Queued.can_transition_to(Queued));
        assert!(!Queued.can_transition_to(Succeeded));
        assert!(!Running.can_transition_to(Queued));
        for terminal in [Succeeded, Failed] {
            for next in [Queued, Running, Succeeded, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn terminal_transition_stamps_completed_at_once() {
        let mut op = import_op();
        let t1 = op.created_at + Duration::seconds(1);
        let t2 = t1 + Duration::seconds(1);

        op.transition(OperationStatus::Running, None, t1).unwrap();
        assert_eq!(op.completed_at, None);

        op.transition(OperationStatus::Succeeded, None, t2).unwrap();
        assert_eq!(op.completed_at, Some(t2));
        assert_eq!(op.updated_at, t2);

        let err = op
            .transition(OperationStatus::Failed, None, t2 + Duration::seconds(1))
            .unwrap_err();
        assert_eq!(
            err,
            OperationError::InvalidTransition {
                from: OperationStatus::Succeeded,
                to: OperationStatus::Failed,
            }
        );
        assert_eq!(op.completed_at, Some(t2));
        assert_eq!(op.status, OperationStatus::Succeeded);
    }

    #[test]
    fn patch_is_a_shallow_merge() {
        let mut meta = OperationMeta::Import(ImportProgress::new("a.csv"));
        meta.apply(MetaPatch::Import(ImportPatch {
            total_rows: Some(10),
            errors: Some(vec!["Batch 1: boom".into()]),
            ..ImportPatch::default()
        }))
        .unwrap();
        meta.apply(MetaPatch::Import(ImportPatch {
            processed_rows: Some(4),
            ..ImportPatch::default()
        }))
        .unwrap();

        let OperationMeta::Import(progress) = meta else {
            panic!("expected import meta");
        };
        assert_eq!(progress.filename, "a.csv");
        assert_eq!(progress.total_rows, 10);
        assert_eq!(progress.processed_rows, 4);
        assert_eq!(progress.errors, vec!["Batch 1: boom".to_string()]);
    }

    #[test]
    fn processed_rows_never_decrease() {
        let mut meta = OperationMeta::Export(ExportProgress::new(ReportFormat::Csv));
        for processed in [5, 3, 8] {
            meta.apply(MetaPatch::Export(ExportPatch {
                processed_rows: Some(processed),
                ..ExportPatch::default()
            }))
            .unwrap();
        }
        assert_matches!(meta, OperationMeta::Export(ExportProgress { processed_rows: 8, .. }));
    }

    #[test]
    fn mismatched_patch_is_rejected_without_changes() {
        let mut op = import_op();
        let before = op.clone();
        let err = op
            .transition(
                OperationStatus::Running,
                Some(MetaPatch::Export(ExportPatch::default())),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, OperationError::MetaMismatch(OperationType::BulkImport));
        assert_eq!(op, before);
    }

    #[test]
    fn failure_patch_targets_the_right_kind() {
        let mut meta = OperationMeta::Export(ExportProgress::new(ReportFormat::Xlsx));
        meta.apply(MetaPatch::failure(OperationType::ReportExport, "disk full"))
            .unwrap();
        assert_matches!(meta, OperationMeta::Export(ExportProgress { error: Some(e), .. }) if e == "disk full");
    }

    #[test]
    fn meta_json_round_trips_by_type() {
        let meta = OperationMeta::Import(ImportProgress {
            filename: "p.xlsx".into(),
            total_rows: 3,
            processed_rows: 2,
            skipped_rows: 1,
            errors: vec![],
            error: None,
        });
        let json = meta.to_json();
        assert_eq!(json["processedRows"], 2);
        assert_eq!(json["skippedRows"], 1);
        assert!(json.get("error").is_none());

        let back = OperationMeta::from_json(OperationType::BulkImport, json).unwrap();
        assert_eq!(back, meta);

        let export = OperationMeta::Export(ExportProgress::new(ReportFormat::Csv));
        let json = export.to_json();
        assert_eq!(json["reportFormat"], "csv");
        assert_eq!(
            OperationMeta::from_json(OperationType::ReportExport, json).unwrap(),
            export
        );
    }

    #[test]
    fn operation_serializes_type_and_status() {
        let op = import_op();
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "bulk_import");
        assert_eq!(json["status"], "queued");
        assert_eq!(json["meta"]["filename"], "products.csv");
        assert!(json["completedAt"].is_null());
    }

    #[test]
    fn type_and_status_parse_their_wire_names() {
        assert_eq!(
            OperationType::parse("report_export"),
            Some(OperationType::ReportExport)
        );
        assert_eq!(OperationType::parse("export"), None);
        assert_eq!(
            OperationStatus::parse("succeeded"),
            Some(OperationStatus::Succeeded)
        );
        assert_eq!(OperationStatus::parse("done"), None);
    }
}
