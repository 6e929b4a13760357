//! Telemetry Agent Library
//!
//! This library provides components for a durable sensor-to-collector
//! telemetry pipeline:
//!
//! - **config**: Environment-based configuration for the agent
//! - **sample**: Sample and batch types shared by wire and storage
//! - **sensor**: Sensor trait, simulated DHT11, and the capture loop
//! - **buffer**: In-memory sample buffer shared between tasks
//! - **store**: Durable buffer file with atomic writes
//! - **settings**: Collector-controlled runtime settings
//! - **client**: HTTP client for the collector's settings and ingest endpoints
//! - **delivery**: Periodic delivery engine that owns the buffer file
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use telemetry_agent::buffer::SampleBuffer;
//! use telemetry_agent::client::HttpCollector;
//! use telemetry_agent::config::Config;
//! use telemetry_agent::delivery::DeliveryEngine;
//! use telemetry_agent::sensor::{self, SimulatedDht11};
//! use telemetry_agent::store::BufferStore;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Load configuration from environment
//!     let config = Config::from_env().expect("Failed to load config");
//!
//!     // Shared state: buffer, settings channel, shutdown flag
//!     let buffer = Arc::new(SampleBuffer::new());
//!     let (settings_tx, settings_rx) = watch::channel(config.initial_settings());
//!     let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     // Capture task feeds the buffer
//!     let capture = tokio::spawn(sensor::run_capture(
//!         SimulatedDht11::with_defaults(),
//!         buffer.clone(),
//!         settings_rx,
//!         shutdown_rx.clone(),
//!     ));
//!
//!     // Delivery engine drains it toward the collector
//!     let collector = HttpCollector::new(&config).expect("Failed to create client");
//!     let store = BufferStore::new(config.buffer_path.clone());
//!     let engine = DeliveryEngine::new(collector, store, buffer, settings_tx);
//!     let delivery = tokio::spawn(engine.run(shutdown_rx));
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     let _ = shutdown_tx.send(true);
//!     let _ = delivery.await;
//!     let _ = capture.await;
//! }
//! ```

// Module declarations
pub mod buffer;
pub mod client;
pub mod config;
pub mod delivery;
pub mod sample;
pub mod sensor;
pub mod settings;
pub mod store;

// Re-export commonly used types at crate root for convenience
pub use buffer::{BufferStats, SampleBuffer};
pub use client::{Collector, CollectorError, DeliveryOutcome, HttpCollector, IngestAck};
pub use config::{Config, ConfigError};
pub use delivery::{DeliveryEngine, DeliveryStats};
pub use sample::{Batch, Sample};
pub use sensor::{ReadError, Reading, SensorSource, SimulatedDht11};
pub use settings::{Settings, SettingsPayload};
pub use store::{BufferStore, StoreError};
