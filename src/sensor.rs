//! Sensor access and the capture loop.
//!
//! The capture loop drives a [`SensorSource`] on the sampling cadence and
//! feeds the shared buffer. The simulated sensor stands in for the GPIO
//! driver on development machines; deployments swap in a hardware
//! implementation of the same trait.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::buffer::SampleBuffer;
use crate::sample::Sample;
use crate::settings::Settings;

/// Fraction of simulated reads that fail, matching how often the real part
/// returns garbage.
const DEFAULT_READ_FAILURE_RATE: f64 = 0.05;

/// One raw reading before the collect flags are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Celsius
    pub temperature: f64,

    /// Relative humidity in percent
    pub humidity: f64,
}

/// Error type for a failed sensor read.
#[derive(Debug)]
pub struct ReadError {
    pub message: String,
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sensor read failed: {}", self.message)
    }
}

impl std::error::Error for ReadError {}

/// A device that produces temperature and humidity readings.
///
/// Reads run on the capture task and may block briefly; the DHT11 protocol
/// itself takes a few tens of milliseconds.
pub trait SensorSource: Send {
    fn read(&mut self) -> Result<Reading, ReadError>;
}

/// Simulated DHT11-style sensor.
///
/// Produces a slow random walk around room conditions, reported at the
/// whole-unit resolution of the real part, with occasional read failures.
pub struct SimulatedDht11 {
    temperature: f64,
    humidity: f64,
    failure_rate: f64,
}

impl SimulatedDht11 {
    /// Create a simulated sensor with the given read failure rate.
    ///
    /// The rate is clamped to [0, 1]; a NaN rate falls back to the
    /// default.
    pub fn new(failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            DEFAULT_READ_FAILURE_RATE
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            temperature: 21.0,
            humidity: 45.0,
            failure_rate,
        }
    }

    /// Create a simulated sensor with the default failure rate.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_READ_FAILURE_RATE)
    }
}

impl Default for SimulatedDht11 {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SensorSource for SimulatedDht11 {
    fn read(&mut self) -> Result<Reading, ReadError> {
        let mut rng = rand::thread_rng();

        if rng.gen_bool(self.failure_rate) {
            return Err(ReadError {
                message: "sensor did not respond".to_string(),
            });
        }

        self.temperature = (self.temperature + rng.gen_range(-0.4..0.4)).clamp(0.0, 50.0);
        self.humidity = (self.humidity + rng.gen_range(-1.5..1.5)).clamp(20.0, 90.0);

        // The DHT11 reports whole degrees and whole percent.
        Ok(Reading {
            temperature: self.temperature.round(),
            humidity: self.humidity.round(),
        })
    }
}

/// Drive a sensor on the sampling cadence, appending samples to the buffer.
///
/// Each cycle takes one settings snapshot and uses it for both the sleep
/// and the measurement mask, so interval and flag changes apply from the
/// next cycle. A failed read logs and skips the cycle; a cycle with both
/// measurements disabled appends nothing. Runs until the shutdown channel
/// flips to true or closes.
pub async fn run_capture<S: SensorSource>(
    mut sensor: S,
    buffer: Arc<SampleBuffer>,
    settings_rx: watch::Receiver<Settings>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("capture task started");
    let mut captured: u64 = 0;
    let mut failed_reads: u64 = 0;

    loop {
        let settings = settings_rx.borrow().clone();

        tokio::select! {
            _ = tokio::time::sleep(settings.sampling_interval()) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        if !settings.collect_temperature && !settings.collect_humidity {
            debug!("both measurements disabled; skipping capture");
            continue;
        }

        match sensor.read() {
            Ok(reading) => {
                let sample = Sample::new(
                    Utc::now().timestamp(),
                    settings.collect_temperature.then_some(reading.temperature),
                    settings.collect_humidity.then_some(reading.humidity),
                );
                debug!(
                    time = sample.time,
                    temperature = ?sample.temperature,
                    humidity = ?sample.humidity,
                    "captured sample"
                );
                buffer.append(sample);
                captured += 1;
            }
            Err(e) => {
                failed_reads += 1;
                warn!(error = %e, "sensor read failed; skipping cycle");
            }
        }
    }

    info!(
        captured = captured,
        failed_reads = failed_reads,
        "capture task stopped"
    );
}
