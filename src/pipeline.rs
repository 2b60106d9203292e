use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::host::HostSurface;
use crate::models::event::{RawEvent, RejectReason};
use crate::models::job::DeliveryJob;
use crate::services::artifact::ArtifactStore;
use crate::services::parser::EventFilterParser;
use crate::services::scheduler::DeliveryScheduler;

/// Fast event path: filter, parse, persist the image, assemble the job, hand
/// it to the scheduler. No network I/O runs here; every delivery happens later
/// on the scheduler's worker.
pub struct EventPipeline {
    parser: EventFilterParser,
    store: ArtifactStore,
    scheduler: Arc<dyn DeliveryScheduler>,
}

impl EventPipeline {
    pub fn new(
        parser: EventFilterParser,
        store: ArtifactStore,
        scheduler: Arc<dyn DeliveryScheduler>,
    ) -> Self {
        Self {
            parser,
            store,
            scheduler,
        }
    }

    /// Process one raw event. Returns the queued job id, or `None` when the
    /// event was rejected or could not be queued.
    pub fn handle(&self, event: &RawEvent) -> Option<Uuid> {
        let parsed = match self.parser.parse(event) {
            Ok(parsed) => parsed,
            Err(reason) => {
                metrics::counter!("relay_events_rejected").increment(1);
                match &reason {
                    RejectReason::NotTargetProducer(_) => {
                        tracing::trace!(key = %event.key, %reason, "event filtered")
                    }
                    RejectReason::UnrecognizedDescription(_) => {
                        tracing::debug!(key = %event.key, %reason, "event filtered")
                    }
                    _ => tracing::warn!(key = %event.key, %reason, "event rejected"),
                }
                return None;
            }
        };

        let image_path = event.image_bytes().and_then(|bytes| self.store.persist(bytes));

        let job = DeliveryJob::from_parsed(&parsed, image_path);
        let job_id = job.id;
        let image_path = job.image_path.clone();

        tracing::info!(
            job_id = %job_id,
            camera_id = %parsed.camera_id,
            kind = ?parsed.kind,
            with_image = image_path.is_some(),
            "event accepted, queueing delivery"
        );

        match self.scheduler.submit(job) {
            Ok(()) => {
                metrics::counter!("relay_events_accepted").increment(1);
                Some(job_id)
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "failed to queue delivery");
                if let Some(path) = &image_path {
                    self.store.delete(path);
                }
                None
            }
        }
    }

    /// Consume raw events until the inbound channel closes, acknowledging
    /// every event back to the host whether it was accepted or rejected.
    pub async fn run(self, mut rx: mpsc::Receiver<RawEvent>, host: Arc<dyn HostSurface>) {
        while let Some(event) = rx.recv().await {
            self.handle(&event);
            host.acknowledge(&event.key);
        }
        tracing::info!("event channel closed, pipeline exiting");
    }
}
