//! Asynchronous event logger that batches `AnalyticsEvent`s off the hot
//! path and appends them to an in-process audit log, keeping the
//! `mpsc`-channel + background batch-writer shape of a ClickHouse-backed
//! logger without requiring one: `RollupEngine` computes its counters
//! straight from the durable stores (the same pattern
//! `CampaignEngine::compute_roi` uses), so this log backs
//! `/v1/analytics` audit/debug reads and metrics, not rollup correctness.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use wireline_core::event_bus::EventSink;
use wireline_core::ids::OrgId;
use wireline_core::model::AnalyticsEvent;

/// Non-blocking event sink with a background batch writer.
pub struct EventLogger {
    sender: mpsc::Sender<AnalyticsEvent>,
    log: Arc<DashMap<OrgId, Vec<AnalyticsEvent>>>,
}

impl EventLogger {
    /// Spawns the background writer and returns a logger ready to accept
    /// events. `capacity` bounds the channel; a full channel drops events
    /// rather than applying backpressure to callers on the hot path.
    pub fn new(capacity: usize, batch_size: usize, flush_interval: std::time::Duration) -> Self {
        let (sender, receiver) = mpsc::channel::<AnalyticsEvent>(capacity);
        let log = Arc::new(DashMap::new());
        let writer = BatchWriter { log: log.clone() };
        tokio::spawn(async move {
                writer.run(receiver, batch_size, flush_interval).await;
            });
        Self { sender, log }
    }

    /// The audit log the background writer appends into, shared so a
    /// caller (e.g. an `/v1/analytics` debug endpoint) can read it back.
    pub fn log(&self) -> Arc<DashMap<OrgId, Vec<AnalyticsEvent>>> {
        self.log.clone()
    }
}

impl EventSink for EventLogger {
    fn emit(&self, event: AnalyticsEvent) {
        if let Err(e) = self.sender.try_send(event) {
            metrics::counter!("analytics.dropped").increment(1);
            warn!(error = %e, "analytics event dropped, channel full or closed");
        } else {
            metrics::counter!("analytics.queued").increment(1);
        }
    }
}

struct BatchWriter {
    log: Arc<DashMap<OrgId, Vec<AnalyticsEvent>>>,
}

impl BatchWriter {
    async fn run(self, mut receiver: mpsc::Receiver<AnalyticsEvent>, batch_size: usize, flush_interval: std::time::Duration) {
        let mut buffer: Vec<AnalyticsEvent> = Vec::with_capacity(batch_size);
        let mut interval = tokio::time::interval(flush_interval);

        loop {
            tokio::select! {
                maybe_event = receiver.recv() => {
                    match maybe_event {
                        Some(event) => {
                            buffer.push(event);
                            if buffer.len() >= batch_size {
                                self.flush(&mut buffer);
                            }
                        }
                        None => {
                            self.flush(&mut buffer);
                            break;
                        }
                    }
                }
                _ = interval.tick() => {
                    if !buffer.is_empty() {
                        self.flush(&mut buffer);
                    }
                }
            }
        }
    }

    fn flush(&self, buffer: &mut Vec<AnalyticsEvent>) {
        let count = buffer.len();
        if count == 0 {
            return;
        }
        debug!(count, "flushing analytics event batch");
        for event in buffer.drain(..) {
            self.log.entry(event.org_id).or_default().push(event);
        }
        metrics::counter!("analytics.flushed").increment(count as u64);
    }
}
