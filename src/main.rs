use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use event_relay::config::AppConfig;
use event_relay::host::{self, HostSurface, LoggingHost};
use event_relay::pipeline::EventPipeline;
use event_relay::services::artifact::ArtifactStore;
use event_relay::services::parser::EventFilterParser;
use event_relay::services::scheduler::{AlwaysConnected, RetryPolicy, TokioScheduler};
use event_relay::services::uploader::UploadExecutor;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(
        target_producer = %config.target_producer,
        endpoint = %config.endpoint_url,
        "Starting event-relay"
    );

    // Prometheus exporter, opt-in via METRICS_ADDR
    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus metrics exporter");
        tracing::info!(%addr, "Metrics exporter listening");
    }

    metrics::describe_counter!("relay_events_accepted", "Raw events accepted and queued");
    metrics::describe_counter!("relay_events_rejected", "Raw events filtered out");
    metrics::describe_counter!("relay_jobs_submitted", "Delivery jobs handed to the scheduler");
    metrics::describe_counter!("relay_uploads_succeeded", "Uploads acknowledged with 2xx");
    metrics::describe_counter!("relay_upload_retries", "Upload attempts classified as retryable");
    metrics::describe_counter!("relay_uploads_failed", "Uploads dropped on permanent failure");
    metrics::describe_counter!("relay_jobs_exhausted", "Jobs dropped at the retry ceiling");

    // Delivery side: artifact store, upload executor, scheduler worker
    let store = ArtifactStore::new(&config.cache_dir);

    let executor = UploadExecutor::new(
        config.endpoint_url.clone(),
        Duration::from_secs(config.http_timeout_secs),
        store.clone(),
    )
    .expect("Failed to build HTTP client");

    let policy = RetryPolicy {
        backoff_floor: Duration::from_secs(config.backoff_floor_secs),
        max_attempts: config.max_attempts,
    };

    let (scheduler, worker) = TokioScheduler::spawn(
        executor,
        store.clone(),
        Arc::new(AlwaysConnected),
        policy,
    );

    // Event side: parser, pipeline, host surface, stdin source
    let parser = EventFilterParser::new(config.target_producer.clone(), config.source_id.clone());
    let pipeline = EventPipeline::new(parser, store, Arc::new(scheduler));

    let host_surface: Arc<dyn HostSurface> = Arc::new(LoggingHost);
    if !host_surface.listener_enabled() {
        tracing::warn!("event listener capability is disabled, no events will arrive");
    }

    let (tx, rx) = mpsc::channel(64);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let source = tokio::spawn(host::pump_events(stdin, tx));

    // Runs until the event source closes; dropping the pipeline afterwards
    // closes the delivery queue so the worker drains and exits.
    pipeline.run(rx, host_surface).await;

    source.await.ok();
    worker.await.ok();

    tracing::info!("event-relay stopped");
}
