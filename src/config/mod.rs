use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Package identifier of the producer whose events are relayed
    #[serde(default = "default_target_producer")]
    pub target_producer: String,

    /// Ingestion endpoint receiving the multipart uploads
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// Identity string reported in the `source` field of every upload
    #[serde(default = "default_source_id")]
    pub source_id: String,

    /// Directory holding transient event images
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Per-attempt HTTP timeout in seconds (connect and total request)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Floor of the exponential retry backoff in seconds
    #[serde(default = "default_backoff_floor_secs")]
    pub backoff_floor_secs: u64,

    /// Attempts per job before it is dropped
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Prometheus exporter bind address. Metrics are disabled when unset.
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

fn default_target_producer() -> String {
    "com.generalcomp.truecloud".to_string()
}

fn default_endpoint_url() -> String {
    "https://monitoring.agrisuraksha.com/api/notifications".to_string()
}

fn default_source_id() -> String {
    "event-relay".to_string()
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("event-relay")
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_backoff_floor_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
