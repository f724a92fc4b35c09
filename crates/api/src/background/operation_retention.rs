//! Periodic sweep of completed operation records.

use std::time::Duration;

use catalog_jobs::OperationLedger;
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Delete operations that completed more than `retention_days` ago, once per
/// `interval`, until `cancel` fires. Running operations are never touched.
pub async fn run(
    ledger: OperationLedger,
    retention_days: i64,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_days,
        interval_secs = interval.as_secs(),
        "Operation retention job started"
    );

    let retention = chrono::Duration::days(retention_days);
    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Operation retention job stopping");
                break;
            }
            _ = interval.tick() => {
                match ledger.cleanup(retention).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Operation retention: purged completed operations");
                    }
                    Ok(_) => {
                        tracing::debug!("Operation retention: nothing to purge");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Operation retention: cleanup failed");
                    }
                }
            }
        }
    }
}
