//! HTTP boundary to the collector service.
//!
//! The delivery engine talks to the collector through the [`Collector`]
//! trait so it can be exercised against a scripted implementation in tests.
//! [`HttpCollector`] is the real thing: a pooled reqwest client with a
//! mandatory request timeout. Every call makes exactly one HTTP request;
//! retry scheduling belongs to the delivery engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::sample::Batch;
use crate::settings::SettingsPayload;

/// Errors that can occur during collector requests.
#[derive(Debug)]
pub enum CollectorError {
    /// Request failed before an HTTP status was received
    Transport(String),

    /// Collector answered with an error status code
    Status { code: StatusCode, message: String },

    /// Failed to parse a response body
    Parse(String),

    /// Request timed out
    Timeout,

    /// Client configuration error
    Config(String),
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::Transport(e) => write!(f, "HTTP request failed: {}", e),
            CollectorError::Status { code, message } => {
                write!(f, "Collector error ({}): {}", code, message)
            }
            CollectorError::Parse(e) => write!(f, "Failed to parse response: {}", e),
            CollectorError::Timeout => write!(f, "Request timed out"),
            CollectorError::Config(e) => write!(f, "Client configuration error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CollectorError::Timeout
        } else {
            CollectorError::Transport(err.to_string())
        }
    }
}

/// Result of one delivery attempt.
///
/// The engine decides what to do with the batch from this alone: clear the
/// durable store on `Delivered`, keep the samples otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Collector acknowledged the batch
    Delivered,

    /// Collector answered with an error status and did not accept the batch
    RemoteRejected(StatusCode),

    /// Collector could not be reached, timed out, or answered nonsense
    Unreachable(String),
}

/// Acknowledgement body for a batch submission.
///
/// The collector is only required to answer with well-formed JSON; every
/// field is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestAck {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub accepted: Option<u64>,
}

/// The remote side of the delivery pipeline.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Fetch the collector's current settings document.
    async fn fetch_settings(&self) -> Result<SettingsPayload, CollectorError>;

    /// Attempt to deliver one batch with a single HTTP request.
    ///
    /// All failure modes fold into the returned outcome; this never takes
    /// longer than the configured request timeout plus response handling.
    async fn post_batch(&self, batch: &Batch) -> DeliveryOutcome;
}

/// HTTP implementation of [`Collector`].
///
/// The underlying reqwest client pools connections across requests, which
/// matters on the long-lived agent where every tick hits the same host.
///
/// # Example
///
/// ```no_run
/// use telemetry_agent::client::{Collector, HttpCollector};
/// use telemetry_agent::config::Config;
/// use telemetry_agent::sample::{Batch, Sample};
///
/// #[tokio::main]
/// async fn main() {
///     let config = Config::default();
///     let collector = HttpCollector::new(&config).expect("Failed to create client");
///
///     let batch = Batch::new(vec![Sample::new(100, Some(21.0), Some(45.0))]);
///     let outcome = collector.post_batch(&batch).await;
///     println!("outcome: {:?}", outcome);
/// }
/// ```
pub struct HttpCollector {
    /// The underlying HTTP client (reused for connection pooling)
    client: Client,

    /// URL of the settings document
    settings_url: String,

    /// URL of the sample ingestion endpoint
    ingest_url: String,

    /// Request timeout duration
    timeout: Duration,
}

impl HttpCollector {
    /// Create a collector client from the agent configuration.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, CollectorError> {
        Self::with_endpoints(
            config.settings_url.clone(),
            config.ingest_url.clone(),
            config.request_timeout,
        )
    }

    /// Create a collector client with explicit endpoints.
    ///
    /// This is useful for testing or when you need more control.
    pub fn with_endpoints(
        settings_url: impl Into<String>,
        ingest_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| CollectorError::Config(e.to_string()))?;

        Ok(Self {
            client,
            settings_url: settings_url.into(),
            ingest_url: ingest_url.into(),
            timeout,
        })
    }

    /// Get the configured settings URL.
    pub fn settings_url(&self) -> &str {
        &self.settings_url
    }

    /// Get the configured ingest URL.
    pub fn ingest_url(&self) -> &str {
        &self.ingest_url
    }

    /// Get the request timeout duration.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn fetch_settings(&self) -> Result<SettingsPayload, CollectorError> {
        debug!(url = %self.settings_url, "fetching collector settings");

        let response = self
            .client
            .get(&self.settings_url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CollectorError::Status {
                code: status,
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| CollectorError::Parse(e.to_string()))
    }

    async fn post_batch(&self, batch: &Batch) -> DeliveryOutcome {
        debug!(
            samples = batch.len(),
            url = %self.ingest_url,
            "posting sample batch"
        );

        let response = match self
            .client
            .post(&self.ingest_url)
            .timeout(self.timeout)
            .json(batch)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return DeliveryOutcome::Unreachable(CollectorError::from(e).to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(code = %status, message = %message, "collector rejected batch");
            return DeliveryOutcome::RemoteRejected(status);
        }

        // A 2xx only counts as delivered once the acknowledgement parses.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return DeliveryOutcome::Unreachable(CollectorError::from(e).to_string());
            }
        };
        match serde_json::from_str::<IngestAck>(&body) {
            Ok(ack) => {
                debug!(status = ?ack.status, accepted = ?ack.accepted, "collector acknowledged batch");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                DeliveryOutcome::Unreachable(format!("unparsable acknowledgement: {}", e))
            }
        }
    }
}
