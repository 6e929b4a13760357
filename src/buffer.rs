//! In-memory buffer shared between the capture loop and the delivery engine.
//!
//! The buffer is the single hand-off point for samples: the capture task
//! appends, the delivery engine drains whole batches, and batches that could
//! be neither delivered nor persisted are put back at the head.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::sample::{Batch, Sample};

/// Statistics about buffer operations.
#[derive(Debug, Clone, Default)]
pub struct BufferStats {
    /// Total number of samples appended
    pub samples_appended: u64,

    /// Total number of samples handed out in drained batches
    pub samples_drained: u64,

    /// Number of drains that produced a non-empty batch
    pub batches_drained: u64,

    /// Number of batches put back after failing to reach disk
    pub batches_requeued: u64,
}

struct Inner {
    samples: Vec<Sample>,
    stats: BufferStats,
}

/// Accumulates samples between delivery attempts.
///
/// All operations share one lock, so a sample is never lost between a drain
/// and a concurrent append, and never appears in two drained batches. Shared
/// across tasks behind an `Arc`.
pub struct SampleBuffer {
    inner: Mutex<Inner>,
}

impl SampleBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                samples: Vec::new(),
                stats: BufferStats::default(),
            }),
        }
    }

    // A poisoned lock still holds valid sample data; keep serving it.
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one sample at the tail.
    pub fn append(&self, sample: Sample) {
        let mut inner = self.locked();
        inner.samples.push(sample);
        inner.stats.samples_appended += 1;
    }

    /// Take everything currently buffered as one batch, leaving the buffer
    /// empty.
    ///
    /// A sample appended while a drain is underway lands after it and
    /// belongs to the next drain.
    pub fn drain(&self) -> Batch {
        let mut inner = self.locked();
        if inner.samples.is_empty() {
            return Batch::default();
        }

        let samples = std::mem::take(&mut inner.samples);
        inner.stats.samples_drained += samples.len() as u64;
        inner.stats.batches_drained += 1;
        Batch::new(samples)
    }

    /// Put a batch back ahead of anything buffered since it was drained.
    ///
    /// Used when a failed delivery also failed to persist, so the next
    /// drain retries those samples first and capture order is kept.
    pub fn requeue(&self, batch: Batch) {
        if batch.is_empty() {
            return;
        }

        let mut inner = self.locked();
        let mut samples = batch.into_samples();
        debug!(
            requeued = samples.len(),
            buffered = inner.samples.len(),
            "re-queued batch at buffer head"
        );
        samples.append(&mut inner.samples);
        inner.samples = samples;
        inner.stats.batches_requeued += 1;
    }

    /// Get the current number of buffered samples.
    pub fn len(&self) -> usize {
        self.locked().samples.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.locked().samples.is_empty()
    }

    /// Get a snapshot of the buffer statistics.
    pub fn stats(&self) -> BufferStats {
        self.locked().stats.clone()
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}
