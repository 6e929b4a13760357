//! Operating settings and their reconciliation with the collector.
//!
//! The agent starts from local defaults and periodically folds in whatever
//! the collector publishes. Remote values are applied field by field; a
//! missing or invalid field leaves the current value in place, and any
//! failure to fetch or parse the document leaves every value in place.

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::client::Collector;

/// Sensor cadence floor; the DHT11 needs two seconds between reads.
const DEFAULT_SAMPLING_INTERVAL_SECS: u64 = 2;

/// Default delivery cadence.
const DEFAULT_SEND_INTERVAL_SECS: u64 = 60;

/// Operating parameters in effect on this agent.
///
/// Published through a `tokio::sync::watch` channel by the delivery engine,
/// which is the single writer; the capture loop reads snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Whether temperature is collected
    pub collect_temperature: bool,

    /// Whether humidity is collected
    pub collect_humidity: bool,

    /// Seconds between sensor reads
    pub sampling_interval_secs: u64,

    /// Seconds between delivery attempts
    pub send_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            collect_temperature: true,
            collect_humidity: true,
            sampling_interval_secs: DEFAULT_SAMPLING_INTERVAL_SECS,
            send_interval_secs: DEFAULT_SEND_INTERVAL_SECS,
        }
    }
}

impl Settings {
    /// Time between sensor reads.
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.sampling_interval_secs)
    }

    /// Time between delivery attempts.
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_secs)
    }

    /// Fold a collector settings document into these values.
    ///
    /// Only fields present in the payload change anything. Interval values
    /// must be positive; a zero is rejected and the current value kept.
    pub fn apply(&self, payload: &SettingsPayload) -> Settings {
        let mut next = self.clone();

        if let Some(enabled) = payload.collect_temperature {
            if enabled != next.collect_temperature {
                info!(collect_temperature = enabled, "settings updated from collector");
            }
            next.collect_temperature = enabled;
        }

        if let Some(enabled) = payload.collect_humidity {
            if enabled != next.collect_humidity {
                info!(collect_humidity = enabled, "settings updated from collector");
            }
            next.collect_humidity = enabled;
        }

        if let Some(secs) = payload.sampling_interval_seconds {
            if secs == 0 {
                warn!("collector sent a zero sampling interval; keeping current value");
            } else {
                if secs != next.sampling_interval_secs {
                    info!(sampling_interval_secs = secs, "settings updated from collector");
                }
                next.sampling_interval_secs = secs;
            }
        }

        if let Some(secs) = payload.send_interval_seconds {
            if secs == 0 {
                warn!("collector sent a zero send interval; keeping current value");
            } else {
                if secs != next.send_interval_secs {
                    info!(send_interval_secs = secs, "settings updated from collector");
                }
                next.send_interval_secs = secs;
            }
        }

        next
    }
}

/// Settings document as the collector serves it.
///
/// Every field is optional and unknown fields are ignored, so the agent
/// keeps working against older and newer collector versions alike.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPayload {
    pub collect_temperature: Option<bool>,
    pub collect_humidity: Option<bool>,
    pub sampling_interval_seconds: Option<u64>,
    pub send_interval_seconds: Option<u64>,
}

/// Fetch the collector's settings document and fold it into `current`.
///
/// Any failure along the way degrades to the current values unchanged; a
/// settings outage never stops capture or delivery.
pub async fn sync<C: Collector>(collector: &C, current: &Settings) -> Settings {
    match collector.fetch_settings().await {
        Ok(payload) => current.apply(&payload),
        Err(e) => {
            warn!(error = %e, "settings sync failed; keeping current values");
            current.clone()
        }
    }
}
