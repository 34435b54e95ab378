//! Periodic collection.
//!
//! The collector runs on its own task, distinct from producer threads and
//! from the export worker: each tick sweeps every registered storage and
//! enqueues the resulting snapshots into the export pipeline. The sweep
//! holds no instrument-wide lock beyond one handle's snapshot-and-reset.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use telemetry_aggregation::MetricData;
use telemetry_export::{BatchProcessor, ExportResult};

use crate::registry::MeterRegistry;

pub struct PeriodicCollector {
    registry: Arc<MeterRegistry>,
    processor: Arc<BatchProcessor<MetricData>>,
    interval: Duration,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicCollector {
    pub fn new(
        registry: Arc<MeterRegistry>,
        processor: Arc<BatchProcessor<MetricData>>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            processor,
            interval,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// One synchronous collection pass; also the body of every tick.
    pub fn collect_once(&self) {
        let now = Utc::now();
        let collected = self.registry.collect_all(now);
        let count = collected.len();
        for data in collected {
            self.processor.enqueue(data);
        }
        if count > 0 {
            debug!(instruments = count, "Collected metric snapshots");
        }
    }

    /// Spawn the collection loop. Must be called within a tokio runtime;
    /// calling it twice is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let registry = self.registry.clone();
        let processor = self.processor.clone();
        let interval = self.interval;
        let cancel = self.cancel.clone();

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; skip it so the first
            // sweep happens one full interval after start.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Collection loop stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let now = Utc::now();
                        for data in registry.collect_all(now) {
                            processor.enqueue(data);
                        }
                    }
                }
            }
        }));
    }

    /// Stop the loop, run one final sweep so nothing recorded since the
    /// last tick is lost, and shut the export pipeline down.
    pub async fn stop(&self, timeout: Duration) -> ExportResult {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        self.collect_once();
        self.registry.disable_all();

        let result = self.processor.shutdown(timeout).await;
        info!("Telemetry collection shut down");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use telemetry_core::{AttributeSet, InstrumentDescriptor, InstrumentKind, ValueType};
    use telemetry_export::{BatchConfig, InMemoryExporter};

    use crate::config::ReaderConfig;

    fn attributes() -> AttributeSet {
        [("host", "a")].into_iter().collect()
    }

    fn pipeline_parts() -> (
        Arc<MeterRegistry>,
        Arc<BatchProcessor<MetricData>>,
        Arc<InMemoryExporter<MetricData>>,
    ) {
        let registry = Arc::new(MeterRegistry::new(ReaderConfig::delta()));
        let exporter = Arc::new(InMemoryExporter::new());
        let processor =
            Arc::new(BatchProcessor::new(exporter.clone(), BatchConfig::default()).unwrap());
        (registry, processor, exporter)
    }

    #[tokio::test]
    async fn test_collect_once_feeds_the_pipeline() {
        let (registry, processor, exporter) = pipeline_parts();
        let collector =
            PeriodicCollector::new(registry.clone(), processor.clone(), Duration::from_secs(60));

        let storage = registry
            .register_instrument(InstrumentDescriptor::new(
                "requests",
                InstrumentKind::Counter,
                ValueType::Long,
            ))
            .unwrap();
        storage.record_long(attributes(), 3);

        collector.collect_once();
        processor.force_flush(Duration::from_secs(5)).await;

        let batches = exporter.take_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].descriptor.name, "requests");
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweep_runs_on_interval() {
        let (registry, processor, exporter) = pipeline_parts();
        let collector = PeriodicCollector::new(
            registry.clone(),
            processor.clone(),
            Duration::from_millis(100),
        );

        let storage = registry
            .register_instrument(InstrumentDescriptor::new(
                "requests",
                InstrumentKind::Counter,
                ValueType::Long,
            ))
            .unwrap();

        collector.start();
        storage.record_long(attributes(), 7);
        tokio::time::sleep(Duration::from_millis(250)).await;

        processor.force_flush(Duration::from_secs(5)).await;
        assert_eq!(exporter.item_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_runs_final_sweep_and_disables_recording() {
        let (registry, processor, exporter) = pipeline_parts();
        let collector =
            PeriodicCollector::new(registry.clone(), processor.clone(), Duration::from_secs(60));

        let storage = registry
            .register_instrument(InstrumentDescriptor::new(
                "requests",
                InstrumentKind::Counter,
                ValueType::Long,
            ))
            .unwrap();
        storage.record_long(attributes(), 9);

        assert!(collector.stop(Duration::from_secs(5)).await.is_success());
        assert_eq!(exporter.item_count(), 1);

        // Recording after shutdown goes nowhere.
        storage.record_long(attributes(), 1);
        assert!(registry.collect_all(Utc::now()).is_empty());
    }
}
