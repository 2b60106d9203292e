use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::models::job::{DeliveryJob, UploadOutcome};
use crate::services::artifact::ArtifactStore;
use crate::services::uploader::UploadExecutor;

/// How often the worker re-checks connectivity while the admission
/// constraint is unsatisfied.
const PROBE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Backoff ceiling: a retry never waits longer than this.
const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60 * 60);

/// Admission constraint: a job attempt may only run while this holds.
pub trait ConnectivityProbe: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Probe for hosts with an always-on network path.
pub struct AlwaysConnected;

impl ConnectivityProbe for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Accepts delivery jobs from the fast event path. Implementations own retry
/// timing, backoff, and the connectivity gate.
pub trait DeliveryScheduler: Send + Sync {
    fn submit(&self, job: DeliveryJob) -> Result<(), SchedulerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("delivery queue is closed")]
    QueueClosed,
}

/// Exponential backoff from a floor, doubling per failed attempt, capped.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff_floor: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_floor: Duration::from_secs(10),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let millis = (self.backoff_floor.as_millis() as u64).saturating_mul(1u64 << exp);
        Duration::from_millis(millis).min(MAX_BACKOFF)
    }
}

/// In-process scheduler: an unbounded queue whose worker spawns one task per
/// job. Jobs retry on independent timelines; attempts within a job stay
/// serial, so only one attempt ever reads a given artifact at a time.
#[derive(Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl TokioScheduler {
    /// Spawn the worker task and return the submit handle alongside its
    /// join handle.
    pub fn spawn(
        executor: UploadExecutor,
        store: ArtifactStore,
        probe: Arc<dyn ConnectivityProbe>,
        policy: RetryPolicy,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(rx, executor, store, probe, policy));
        (Self { tx }, handle)
    }
}

impl DeliveryScheduler for TokioScheduler {
    fn submit(&self, job: DeliveryJob) -> Result<(), SchedulerError> {
        metrics::counter!("relay_jobs_submitted").increment(1);
        self.tx.send(job).map_err(|_| SchedulerError::QueueClosed)
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<DeliveryJob>,
    executor: UploadExecutor,
    store: ArtifactStore,
    probe: Arc<dyn ConnectivityProbe>,
    policy: RetryPolicy,
) {
    tracing::info!("delivery worker started");

    // One task per job: a job backing off must never delay later events
    let executor = Arc::new(executor);
    let mut deliveries = tokio::task::JoinSet::new();

    while let Some(job) = rx.recv().await {
        let executor = executor.clone();
        let store = store.clone();
        let probe = probe.clone();
        let policy = policy.clone();
        deliveries.spawn(async move {
            deliver(&executor, &store, probe.as_ref(), &policy, job).await;
        });

        // Reap finished deliveries so the set stays bounded
        while deliveries.try_join_next().is_some() {}
    }

    tracing::info!("delivery queue closed, draining in-flight deliveries");
    while deliveries.join_next().await.is_some() {}

    tracing::info!("delivery worker exiting");
}

/// Drive one job to a terminal outcome. The executor owns artifact cleanup on
/// success and permanent failure; exhaustion cleanup happens here.
async fn deliver(
    executor: &UploadExecutor,
    store: &ArtifactStore,
    probe: &dyn ConnectivityProbe,
    policy: &RetryPolicy,
    job: DeliveryJob,
) {
    let mut attempt = 1u32;

    loop {
        while !probe.is_connected() {
            tracing::debug!(job_id = %job.id, "network unavailable, holding job");
            sleep(PROBE_POLL_INTERVAL).await;
        }

        match executor.execute(&job).await {
            UploadOutcome::Success => {
                metrics::counter!("relay_uploads_succeeded").increment(1);
                tracing::info!(job_id = %job.id, attempt, camera_id = %job.camera_id, "event delivered");
                return;
            }
            UploadOutcome::PermanentFailure => {
                metrics::counter!("relay_uploads_failed").increment(1);
                tracing::warn!(job_id = %job.id, attempt, "event dropped permanently");
                return;
            }
            UploadOutcome::Retry => {
                metrics::counter!("relay_upload_retries").increment(1);

                if attempt >= policy.max_attempts {
                    metrics::counter!("relay_jobs_exhausted").increment(1);
                    tracing::warn!(
                        job_id = %job.id,
                        attempts = attempt,
                        "retry ceiling reached, dropping job"
                    );
                    if let Some(path) = &job.image_path {
                        store.delete(path);
                    }
                    return;
                }

                let delay = policy.delay_for(attempt);
                tracing::debug!(job_id = %job.id, attempt, delay_ms = delay.as_millis() as u64, "backing off");
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_the_floor() {
        let policy = RetryPolicy {
            backoff_floor: Duration::from_secs(10),
            max_attempts: 10,
        };

        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(40));
        assert_eq!(policy.delay_for(5), Duration::from_secs(160));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(30), MAX_BACKOFF);
        assert_eq!(policy.delay_for(u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn default_probe_reports_connected() {
        assert!(AlwaysConnected.is_connected());
    }
}
