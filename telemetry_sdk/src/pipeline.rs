use std::sync::Arc;
use std::time::Duration;

use telemetry_aggregation::MetricData;
use telemetry_core::Result;
use telemetry_export::{BatchConfig, BatchProcessor, Exporter, ExportResult};

use crate::collector::PeriodicCollector;
use crate::config::ReaderConfig;
use crate::registry::MeterRegistry;

/// The assembled SDK: registry, periodic collector and export pipeline
/// wired together. Applications construct exactly one per exporter target
/// and register their instruments through `registry()`.
pub struct TelemetryPipeline {
    registry: Arc<MeterRegistry>,
    collector: PeriodicCollector,
    processor: Arc<BatchProcessor<MetricData>>,
}

impl TelemetryPipeline {
    pub fn builder() -> TelemetryPipelineBuilder {
        TelemetryPipelineBuilder::default()
    }

    pub fn registry(&self) -> &Arc<MeterRegistry> {
        &self.registry
    }

    /// Run one collection pass outside the periodic schedule.
    pub fn collect_now(&self) {
        self.collector.collect_once();
    }

    pub async fn force_flush(&self, timeout: Duration) -> ExportResult {
        self.processor.force_flush(timeout).await
    }

    /// Final sweep, pipeline flush and exporter shutdown. Idempotent.
    pub async fn shutdown(&self, timeout: Duration) -> ExportResult {
        self.collector.stop(timeout).await
    }

    pub fn dropped_count(&self) -> u64 {
        self.processor.dropped_count()
    }
}

#[derive(Default)]
pub struct TelemetryPipelineBuilder {
    reader: Option<ReaderConfig>,
    batch: Option<BatchConfig>,
    collection_interval: Option<Duration>,
}

impl TelemetryPipelineBuilder {
    pub fn reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn batch(mut self, batch: BatchConfig) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn collection_interval(mut self, interval: Duration) -> Self {
        self.collection_interval = Some(interval);
        self
    }

    /// Wire everything up and start the collection loop. Must be called
    /// within a tokio runtime.
    pub fn build<E>(self, exporter: E) -> Result<TelemetryPipeline>
    where
        E: Exporter<MetricData> + 'static,
    {
        let registry = Arc::new(MeterRegistry::new(self.reader.unwrap_or_default()));
        let processor = Arc::new(BatchProcessor::new(
            exporter,
            self.batch.unwrap_or_default(),
        )?);
        let collector = PeriodicCollector::new(
            registry.clone(),
            processor.clone(),
            self.collection_interval
                .unwrap_or(Duration::from_secs(60)),
        );
        collector.start();

        Ok(TelemetryPipeline {
            registry,
            collector,
            processor,
        })
    }
}
