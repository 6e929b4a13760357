//! Telemetry Agent - Durable sensor-to-collector delivery service
//!
//! This service reads a temperature and humidity sensor on a configurable
//! cadence, buffers samples across collector outages, and batch-delivers
//! them to the collector's ingest endpoint.
//!
//! ## Features
//!
//! - Async capture and delivery loops on the tokio runtime
//! - Durable buffer file so no sample is lost to an outage or restart
//! - Collector-controlled runtime settings with local fallback
//! - Graceful shutdown on SIGINT with a final flush to disk
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `TELEMETRY_AGENT_COLLECTOR_URL`: Collector base URL (default: http://localhost:1337)
//! - `TELEMETRY_AGENT_BUFFER_PATH`: Buffer file path (default: pending-samples.json)
//! - `TELEMETRY_AGENT_REQUEST_TIMEOUT_SECS`: HTTP request timeout (default: 10)
//! - `TELEMETRY_AGENT_SAMPLING_INTERVAL_SECS`: Initial capture cadence (default: 2)
//! - `TELEMETRY_AGENT_SEND_INTERVAL_SECS`: Initial delivery cadence (default: 60)
//! - `RUST_LOG`: Logging level filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use telemetry_agent::buffer::SampleBuffer;
use telemetry_agent::client::HttpCollector;
use telemetry_agent::config::Config;
use telemetry_agent::delivery::DeliveryEngine;
use telemetry_agent::sensor::{self, SimulatedDht11};
use telemetry_agent::store::BufferStore;

/// Time allowed for one in-flight request plus the final buffer save
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with environment filter
    init_tracing();

    info!("Starting telemetry agent...");

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                collector_url = %config.collector_url,
                buffer_path = %config.buffer_path.display(),
                sampling_interval_secs = config.sampling_interval_secs,
                send_interval_secs = config.send_interval_secs,
                request_timeout_secs = config.request_timeout.as_secs(),
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    // Create HTTP client with connection pooling
    let collector = match HttpCollector::new(&config) {
        Ok(collector) => {
            info!(
                settings_url = %collector.settings_url(),
                ingest_url = %collector.ingest_url(),
                "HTTP client initialized"
            );
            collector
        }
        Err(e) => {
            error!(error = %e, "Failed to create HTTP client");
            std::process::exit(1);
        }
    };

    // Shared state: sample buffer, settings channel, shutdown flag
    let store = BufferStore::new(config.buffer_path.clone());
    let buffer = Arc::new(SampleBuffer::new());
    let (settings_tx, settings_rx) = watch::channel(config.initial_settings());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn capture task - reads the sensor and fills the buffer
    let capture_handle = tokio::spawn(sensor::run_capture(
        SimulatedDht11::with_defaults(),
        buffer.clone(),
        settings_rx,
        shutdown_rx.clone(),
    ));

    // Spawn delivery task - drains the buffer toward the collector
    let engine = DeliveryEngine::new(collector, store, buffer, settings_tx);
    let delivery_handle = tokio::spawn(engine.run(shutdown_rx));

    // Wait for shutdown signal
    info!("Telemetry agent running. Press Ctrl+C to stop.");
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping...");
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    }

    // Graceful shutdown
    info!("Initiating graceful shutdown...");
    let _ = shutdown_tx.send(true);

    // The delivery task finishes its in-flight attempt and flushes to disk
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, delivery_handle).await {
        Ok(Ok(stats)) => {
            info!(
                ticks = stats.ticks,
                batches_delivered = stats.batches_delivered,
                samples_delivered = stats.samples_delivered,
                failed_attempts = stats.failed_attempts,
                store_failures = stats.store_failures,
                "Delivery task shut down gracefully"
            );
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Delivery task panicked during shutdown");
        }
        Err(_) => {
            warn!("Delivery task shutdown timed out after {:?}", SHUTDOWN_TIMEOUT);
        }
    }

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, capture_handle).await {
        Ok(Ok(())) => {
            info!("Capture task shut down gracefully");
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Capture task panicked during shutdown");
        }
        Err(_) => {
            warn!("Capture task shutdown timed out after {:?}", SHUTDOWN_TIMEOUT);
        }
    }

    info!("Telemetry agent stopped");
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}
