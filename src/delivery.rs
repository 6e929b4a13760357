//! Delivery engine for buffered samples.
//!
//! The engine is the only task that touches the buffer file. Each tick it
//! refreshes settings from the collector, merges recovered samples with
//! freshly captured ones, and posts the whole backlog in one request. The
//! file is cleared only after the collector acknowledges the batch, so a
//! crash at any point can duplicate samples but never lose them.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::buffer::SampleBuffer;
use crate::client::{Collector, DeliveryOutcome};
use crate::sample::Batch;
use crate::settings::{self, Settings};
use crate::store::BufferStore;

/// Counters accumulated over the engine's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Delivery cycles started
    pub ticks: u64,
    /// Cycles that found nothing to send
    pub empty_ticks: u64,
    /// Batches acknowledged by the collector
    pub batches_delivered: u64,
    /// Samples acknowledged by the collector
    pub samples_delivered: u64,
    /// Attempts that ended rejected or unreachable
    pub failed_attempts: u64,
    /// Buffer file writes or clears that failed
    pub store_failures: u64,
}

/// Periodic delivery loop over a collector client.
///
/// Owns the buffer file and the settings channel. The capture task only
/// ever appends to the in-memory buffer; everything durable goes through
/// this engine, one tick at a time.
pub struct DeliveryEngine<C: Collector> {
    collector: C,
    store: BufferStore,
    buffer: Arc<SampleBuffer>,
    settings_tx: watch::Sender<Settings>,
    stats: DeliveryStats,
}

impl<C: Collector> DeliveryEngine<C> {
    pub fn new(
        collector: C,
        store: BufferStore,
        buffer: Arc<SampleBuffer>,
        settings_tx: watch::Sender<Settings>,
    ) -> Self {
        Self {
            collector,
            store,
            buffer,
            settings_tx,
            stats: DeliveryStats::default(),
        }
    }

    /// Get the counters accumulated so far.
    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    /// Run one delivery cycle.
    ///
    /// Settings sync first, so flag and interval changes land even when
    /// there is nothing to send. Then recovered samples are merged ahead
    /// of the freshly drained ones and the combined batch is posted. Only
    /// a delivered batch clears the buffer file; a failed clear leaves the
    /// file for the next tick, and the collector tolerates the replay.
    pub async fn tick(&mut self) {
        self.stats.ticks += 1;

        let current = self.settings_tx.borrow().clone();
        let synced = settings::sync(&self.collector, &current).await;
        self.settings_tx.send_replace(synced);

        let recovered = self.store.load();
        let recovered_len = recovered.len();
        let fresh = self.buffer.drain();
        let merged = fresh.merge(recovered);

        if merged.is_empty() {
            self.stats.empty_ticks += 1;
            debug!("nothing to deliver");
            return;
        }

        let sample_count = merged.len() as u64;
        match self.collector.post_batch(&merged).await {
            DeliveryOutcome::Delivered => {
                self.stats.batches_delivered += 1;
                self.stats.samples_delivered += sample_count;
                info!(samples = sample_count, "batch delivered");
                if let Err(e) = self.store.clear() {
                    self.stats.store_failures += 1;
                    warn!(error = %e, "failed to clear buffer file after delivery");
                }
            }
            DeliveryOutcome::RemoteRejected(status) => {
                self.stats.failed_attempts += 1;
                warn!(
                    status = %status,
                    samples = sample_count,
                    "collector rejected batch; preserving samples"
                );
                self.preserve(merged, recovered_len);
            }
            DeliveryOutcome::Unreachable(cause) => {
                self.stats.failed_attempts += 1;
                warn!(
                    cause = %cause,
                    samples = sample_count,
                    "collector unreachable; preserving samples"
                );
                self.preserve(merged, recovered_len);
            }
        }
    }

    /// Persist an undelivered batch, falling back to the in-memory buffer.
    ///
    /// If the buffer file cannot be written the unpersisted samples go
    /// back to the buffer head, ahead of anything captured since the
    /// drain, so order survives even without a working disk. The first
    /// `recovered_len` samples of the batch came out of the file this
    /// tick; while that file is intact it remains their durable copy and
    /// they are not requeued.
    fn preserve(&mut self, batch: Batch, recovered_len: usize) {
        if let Err(e) = self.store.save(&batch) {
            self.stats.store_failures += 1;
            error!(
                error = %e,
                samples = batch.len(),
                "failed to persist undelivered samples; keeping them in memory"
            );
            // Keep only what the file does not already hold, otherwise
            // the next merge would see the recovered samples twice.
            let mut samples = batch.into_samples();
            if recovered_len > 0 && self.store.load().samples() == &samples[..recovered_len] {
                samples.drain(..recovered_len);
            }
            self.buffer.requeue(Batch::new(samples));
        }
    }

    /// Run ticks on the send interval until shutdown, then flush to disk.
    ///
    /// The interval is re-read from settings before every sleep, so a
    /// remote change takes effect on the next cycle. An in-flight tick
    /// always completes; shutdown is only observed between ticks.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> DeliveryStats {
        info!("delivery task started");

        loop {
            let interval = self.settings_tx.borrow().send_interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.tick().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        self.shutdown_flush();
        info!(
            ticks = self.stats.ticks,
            batches_delivered = self.stats.batches_delivered,
            samples_delivered = self.stats.samples_delivered,
            failed_attempts = self.stats.failed_attempts,
            store_failures = self.stats.store_failures,
            "delivery task stopped"
        );
        self.stats
    }

    /// Persist whatever is still buffered without touching the network.
    fn shutdown_flush(&mut self) {
        let fresh = self.buffer.drain();
        if fresh.is_empty() {
            return;
        }

        let merged = fresh.merge(self.store.load());
        let sample_count = merged.len();
        if let Err(e) = self.store.save(&merged) {
            self.stats.store_failures += 1;
            error!(
                error = %e,
                samples = sample_count,
                "failed to persist samples during shutdown"
            );
        } else {
            info!(samples = sample_count, "unsent samples persisted for next start");
        }
    }
}
