//! Host-surface collaborators: the boundary to whatever delivers raw events
//! into this process and displays them to the user.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::models::event::RawEvent;

/// The host's event surface. The pipeline acknowledges every event it
/// consumes so nothing stays independently visible or actionable on the host;
/// `listener_enabled` is the read-only capability query the setup UI polls.
pub trait HostSurface: Send + Sync {
    fn acknowledge(&self, key: &str);
    fn listener_enabled(&self) -> bool;

    /// One-shot: take the user to wherever the listening capability is
    /// granted. No-op on hosts without such a surface.
    fn open_listener_settings(&self) {}

    /// One-shot: ask the host to exempt this process from background
    /// execution throttling. No-op on hosts without such a surface.
    fn request_background_exemption(&self) {}
}

/// Host binding for transports with no retraction API: acknowledgments are
/// recorded in the log only.
pub struct LoggingHost;

impl HostSurface for LoggingHost {
    fn acknowledge(&self, key: &str) {
        tracing::debug!(key, "event acknowledged");
    }

    fn listener_enabled(&self) -> bool {
        true
    }
}

/// Feed newline-delimited JSON raw events from `reader` into the pipeline
/// channel. Malformed lines are logged and skipped; returns when the reader
/// hits EOF or the pipeline goes away.
pub async fn pump_events<R>(reader: R, tx: mpsc::Sender<RawEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<RawEvent>(&line) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            tracing::warn!("pipeline gone, stopping event source");
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping malformed event line");
                    }
                }
            }
            Ok(None) => {
                tracing::info!("event source reached EOF");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "event source read failed");
                return;
            }
        }
    }
}
