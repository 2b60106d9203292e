use chrono::Utc;

use crate::models::event::{EventKind, ParsedEvent, RawEvent, RejectReason};

/// Pure filter/parse stage: raw event in, structured event or rejection out.
/// No I/O happens here; image extraction and persistence run after a parse
/// succeeds.
pub struct EventFilterParser {
    target_producer: String,
    source_id: String,
}

impl EventFilterParser {
    pub fn new(target_producer: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            target_producer: target_producer.into(),
            source_id: source_id.into(),
        }
    }

    pub fn parse(&self, event: &RawEvent) -> Result<ParsedEvent, RejectReason> {
        if event.producer != self.target_producer {
            return Err(RejectReason::NotTargetProducer(event.producer.clone()));
        }

        let title = event
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(RejectReason::MissingFields)?;
        let description = event.description().ok_or(RejectReason::MissingFields)?;

        let kind = EventKind::from_description(description)
            .ok_or_else(|| RejectReason::UnrecognizedDescription(description.to_string()))?;

        let camera_id = extract_camera_id(title)
            .ok_or_else(|| RejectReason::CameraIdNotFound(title.to_string()))?;

        Ok(ParsedEvent {
            camera_id,
            kind,
            title: title.to_string(),
            description: description.to_string(),
            timestamp: Utc::now(),
            source: self.source_id.clone(),
        })
    }
}

/// Extract the camera id from a title of shape `<prefix> <digits> channel<rest>`
/// (case-insensitive). The prefix is everything before the whitespace run that
/// precedes the digits token ahead of the literal word `channel`; the leftmost
/// such occurrence wins and the prefix is trimmed. Returns `None` when the
/// shape is absent or the trimmed prefix is empty.
pub fn extract_camera_id(title: &str) -> Option<String> {
    let lower = title.to_ascii_lowercase();
    let bytes = lower.as_bytes();

    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find("channel") {
        let at = search_from + rel;
        if let Some(prefix_end) = prefix_end_before_marker(bytes, at) {
            let prefix = title[..prefix_end].trim();
            if prefix.is_empty() {
                return None;
            }
            return Some(prefix.to_string());
        }
        search_from = at + 1;
    }
    None
}

/// Walk backwards from the marker over `\s+\d+\s+` and return where the
/// camera-id prefix ends, or `None` when the run is malformed.
fn prefix_end_before_marker(bytes: &[u8], marker: usize) -> Option<usize> {
    let mut i = marker;

    let ws_end = i;
    while i > 0 && bytes[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    if i == ws_end {
        return None;
    }

    let digits_end = i;
    while i > 0 && bytes[i - 1].is_ascii_digit() {
        i -= 1;
    }
    if i == digits_end {
        return None;
    }

    let lead_ws_end = i;
    while i > 0 && bytes[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    if i == lead_ws_end {
        return None;
    }

    Some(i)
}
