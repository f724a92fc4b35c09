//! Detached job execution.
//!
//! Jobs run on a [`TaskTracker`] so shutdown can wait for them. Each job runs
//! in its own task; if it panics, or returns an error because it could not
//! record its own terminal state, a fault is sent to a recorder task that
//! writes `failed` into the ledger. A poller therefore always sees the
//! operation finish.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use catalog_core::types::OperationId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::JobError;
use crate::ledger::OperationLedger;

/// A job ended without recording a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFault {
    pub operation_id: OperationId,
    pub reason: String,
}

pub struct JobSupervisor {
    tracker: TaskTracker,
    faults: mpsc::UnboundedSender<JobFault>,
    stop_recorder: CancellationToken,
    recorder: Mutex<Option<JoinHandle<()>>>,
}

impl JobSupervisor {
    /// Start the fault recorder. Must be called inside a Tokio runtime.
    pub fn start(ledger: OperationLedger) -> Self {
        let (faults, rx) = mpsc::unbounded_channel();
        let stop_recorder = CancellationToken::new();
        let recorder = tokio::spawn(record_faults(ledger, rx, stop_recorder.clone()));

        Self {
            tracker: TaskTracker::new(),
            faults,
            stop_recorder,
            recorder: Mutex::new(Some(recorder)),
        }
    }

    /// Run `job` in the background on behalf of `operation_id`.
    pub fn spawn<F>(&self, operation_id: OperationId, job: F)
    where
        F: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let faults = self.faults.clone();
        self.tracker.spawn(async move {
            let reason = match tokio::spawn(job).await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(join) if join.is_panic() => {
                    format!("Job panicked: {}", panic_message(join.into_panic()))
                }
                Err(_) => "Job was cancelled".to_string(),
            };

            tracing::error!(operation_id = %operation_id, error = %reason, "Job ended without a recorded outcome");
            if faults
                .send(JobFault {
                    operation_id,
                    reason,
                })
                .is_err()
            {
                tracing::error!(operation_id = %operation_id, "Fault recorder is gone; operation left unfinished");
            }
        });
    }

    /// Number of jobs still running.
    pub fn active_jobs(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting jobs and wait up to `timeout` for running ones, then
    /// flush outstanding faults. Returns `false` if jobs were still running.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                active_jobs = self.tracker.len(),
                "Shutdown timed out waiting for jobs"
            );
        }

        self.stop_recorder.cancel();
        let recorder = self
            .recorder
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(handle) = recorder {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Fault recorder task failed");
            }
        }
        drained
    }
}

async fn record_faults(
    ledger: OperationLedger,
    mut rx: mpsc::UnboundedReceiver<JobFault>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            Some(fault) = rx.recv() => record_fault(&ledger, fault).await,
            _ = stop.cancelled() => break,
        }
    }
    while let Ok(fault) = rx.try_recv() {
        record_fault(&ledger, fault).await;
    }
}

async fn record_fault(ledger: &OperationLedger, fault: JobFault) {
    match ledger.fail(fault.operation_id, &fault.reason).await {
        Ok(true) => {
            tracing::info!(operation_id = %fault.operation_id, "Recorded failure for faulted job");
        }
        Ok(false) => {
            tracing::debug!(operation_id = %fault.operation_id, "Faulted job had already finished");
        }
        Err(e) => {
            tracing::error!(operation_id = %fault.operation_id, error = %e, "Failed to record job fault");
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
