use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Detection phrases accepted from the producer. Matching is exact and
/// case-insensitive; anything else is rejected.
pub const DESC_HUMAN_DETECTION: &str = "Human body detection";
pub const DESC_MOTION_DETECTION: &str = "Motion detection";

/// One notification-style event as received from the host surface.
///
/// Image payloads arrive base64-encoded inside the JSON envelope: `picture`
/// carries the full attachment, `large_icon` the smaller fallback image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Package identifier of the producing application
    pub producer: String,
    /// Host handle used to retract the event after processing
    pub key: String,
    pub title: Option<String>,
    /// Primary body text
    pub text: Option<String>,
    /// Expanded body text, consulted when `text` is absent
    pub big_text: Option<String>,
    #[serde(default, with = "base64_bytes")]
    pub picture: Option<Vec<u8>>,
    #[serde(default, with = "base64_bytes")]
    pub large_icon: Option<Vec<u8>>,
}

impl RawEvent {
    /// Body text with the expanded-text fallback applied.
    pub fn description(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.big_text.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Attached image bytes, preferring the full picture over the icon.
    pub fn image_bytes(&self) -> Option<&[u8]> {
        self.picture
            .as_deref()
            .or(self.large_icon.as_deref())
            .filter(|b| !b.is_empty())
    }
}

/// Kind of detection event, derived from the description allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    HumanDetection,
    MotionDetection,
}

impl EventKind {
    /// Classify a description by case-insensitive exact match. Substrings,
    /// superstrings, and extra punctuation all fail.
    pub fn from_description(description: &str) -> Option<Self> {
        if description.eq_ignore_ascii_case(DESC_HUMAN_DETECTION) {
            Some(EventKind::HumanDetection)
        } else if description.eq_ignore_ascii_case(DESC_MOTION_DETECTION) {
            Some(EventKind::MotionDetection)
        } else {
            None
        }
    }
}

/// Structured record derived from an accepted raw event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub camera_id: String,
    pub kind: EventKind,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl ParsedEvent {
    /// Wire timestamp: ISO-8601 UTC with millisecond precision and a literal
    /// trailing `Z`.
    pub fn timestamp_iso8601(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Why a raw event was discarded instead of queued for delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("event not from target producer: {0}")]
    NotTargetProducer(String),

    #[error("event missing title or body text")]
    MissingFields,

    #[error("description not in the detection allow-list: {0:?}")]
    UnrecognizedDescription(String),

    #[error("camera id pattern not found in title: {0:?}")]
    CameraIdNotFound(String),
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer
                .serialize_some(&base64::engine::general_purpose::STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => base64::engine::general_purpose::STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
