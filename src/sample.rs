//! Sample and batch types for the telemetry pipeline.
//!
//! These types define the wire and storage representation shared by the
//! collector API and the durable buffer file.

use serde::{Deserialize, Serialize};

/// A single timestamped measurement.
///
/// A `None` field means that measurement was disabled when the sample was
/// captured. Absent fields are omitted from the serialized form entirely
/// and come back as `None`, so the round trip is lossless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the Unix epoch, assigned at capture time
    pub time: i64,

    /// Degrees Celsius
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Relative humidity in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
}

impl Sample {
    /// Create a sample stamped with the given capture time.
    pub fn new(time: i64, temperature: Option<f64>, humidity: Option<f64>) -> Self {
        Self {
            time,
            temperature,
            humidity,
        }
    }
}

/// An ordered run of samples awaiting delivery.
///
/// Serializes as a bare JSON array, which is both the collector's ingest
/// body and the payload inside the buffer file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch(Vec<Sample>);

impl Batch {
    /// Create a batch from samples already in capture order.
    pub fn new(samples: Vec<Sample>) -> Self {
        Self(samples)
    }

    /// Merge a previously persisted batch ahead of this one.
    ///
    /// Recovered samples come first so delivery preserves capture order
    /// across restarts. Duplicate timestamps are kept as-is; the collector
    /// tolerates replays.
    pub fn merge(self, recovered: Batch) -> Batch {
        let mut samples = recovered.0;
        samples.extend(self.0);
        Batch(samples)
    }

    /// Get the number of samples in the batch.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the samples in order.
    pub fn samples(&self) -> &[Sample] {
        &self.0
    }

    /// Consume the batch, yielding its samples in order.
    pub fn into_samples(self) -> Vec<Sample> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_serialization() {
        let sample = Sample::new(100, Some(21.0), Some(45.0));
        let json = serde_json::to_string(&sample).unwrap();

        assert_eq!(json, r#"{"time":100,"temperature":21.0,"humidity":45.0}"#);
    }

    #[test]
    fn test_disabled_measurement_omitted() {
        let sample = Sample::new(100, Some(21.0), None);
        let json = serde_json::to_string(&sample).unwrap();

        assert!(json.contains(r#""temperature":21.0"#));
        assert!(!json.contains("humidity"));
    }

    #[test]
    fn test_sample_round_trip_is_lossless() {
        let original = Sample::new(100, None, Some(60.0));
        let json = serde_json::to_string(&original).unwrap();
        let restored: Sample = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, original);
        assert!(restored.temperature.is_none());
    }

    #[test]
    fn test_sample_deserialization_with_absent_fields() {
        let sample: Sample = serde_json::from_str(r#"{"time":42}"#).unwrap();

        assert_eq!(sample.time, 42);
        assert!(sample.temperature.is_none());
        assert!(sample.humidity.is_none());
    }

    #[test]
    fn test_batch_serializes_as_bare_array() {
        let batch = Batch::new(vec![
            Sample::new(1, Some(20.0), Some(40.0)),
            Sample::new(2, Some(21.0), Some(41.0)),
        ]);
        let json = serde_json::to_string(&batch).unwrap();

        assert!(json.starts_with('['));
        assert!(json.ends_with(']'));
        let restored: Batch = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, batch);
    }

    #[test]
    fn test_merge_puts_recovered_samples_first() {
        let recovered = Batch::new(vec![
            Sample::new(1, Some(20.0), None),
            Sample::new(2, Some(21.0), None),
        ]);
        let fresh = Batch::new(vec![
            Sample::new(3, Some(22.0), None),
            Sample::new(4, Some(23.0), None),
        ]);

        let merged = fresh.merge(recovered);
        let times: Vec<i64> = merged.samples().iter().map(|s| s.time).collect();

        assert_eq!(times, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_merge_keeps_duplicate_timestamps() {
        let recovered = Batch::new(vec![Sample::new(5, Some(20.0), None)]);
        let fresh = Batch::new(vec![Sample::new(5, Some(20.0), None)]);

        let merged = fresh.merge(recovered);

        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_with_empty_batches() {
        let fresh = Batch::new(vec![Sample::new(1, Some(20.0), None)]);

        let merged = fresh.clone().merge(Batch::default());
        assert_eq!(merged, fresh);

        let merged = Batch::default().merge(fresh.clone());
        assert_eq!(merged, fresh);
    }

    #[test]
    fn test_empty_batch() {
        let batch = Batch::default();

        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
