use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::event::ParsedEvent;

/// Immutable snapshot of one upload, as handed to the delivery scheduler.
///
/// The attempt count is owned by the scheduler, not the job. `id` is a local
/// correlation id for logs and never goes on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub camera_id: String,
    /// Pre-formatted ISO-8601 UTC timestamp with millisecond precision
    pub timestamp: String,
    /// Kept equal to `description`; the receiving service keys on it
    pub event_identifier: String,
    pub source: String,
    pub image_path: Option<PathBuf>,
}

impl DeliveryJob {
    pub fn from_parsed(event: &ParsedEvent, image_path: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: event.title.clone(),
            description: event.description.clone(),
            camera_id: event.camera_id.clone(),
            timestamp: event.timestamp_iso8601(),
            event_identifier: event.description.clone(),
            source: event.source.clone(),
            image_path,
        }
    }

    /// Required textual fields, in wire order. A job with any of these empty
    /// is corrupted and must never reach the network.
    pub fn required_fields(&self) -> [(&'static str, &str); 6] {
        [
            ("title", &self.title),
            ("description", &self.description),
            ("timestamp", &self.timestamp),
            ("cameraId", &self.camera_id),
            ("eventIdentifier", &self.event_identifier),
            ("source", &self.source),
        ]
    }
}

/// Classification of one upload attempt. Retry timing belongs to the
/// scheduler; the executor only classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    Success,
    Retry,
    PermanentFailure,
}
