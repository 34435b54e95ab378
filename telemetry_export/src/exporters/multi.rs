use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::warn;

use crate::exporter::{ExportResult, Exporter};

/// Fans one batch out to several exporters. Every sub-exporter is always
/// called, even after an earlier one fails or panics; the combined result
/// is success only if all of them succeeded.
pub struct MultiExporter<T> {
    exporters: Vec<Box<dyn Exporter<T>>>,
}

impl<T> MultiExporter<T> {
    pub fn new(exporters: Vec<Box<dyn Exporter<T>>>) -> Self {
        Self { exporters }
    }

    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Exporter<T> for MultiExporter<T> {
    async fn export(&self, batch: Vec<T>) -> ExportResult {
        let mut combined = ExportResult::Success;
        for (index, exporter) in self.exporters.iter().enumerate() {
            let outcome = AssertUnwindSafe(exporter.export(batch.clone()))
                .catch_unwind()
                .await;
            match outcome {
                Ok(result) => combined = combined.and(result),
                Err(_) => {
                    warn!(exporter = index, "Exporter panicked during export");
                    combined = ExportResult::Failure;
                }
            }
        }
        combined
    }

    async fn flush(&self) -> ExportResult {
        let mut combined = ExportResult::Success;
        for (index, exporter) in self.exporters.iter().enumerate() {
            match AssertUnwindSafe(exporter.flush()).catch_unwind().await {
                Ok(result) => combined = combined.and(result),
                Err(_) => {
                    warn!(exporter = index, "Exporter panicked during flush");
                    combined = ExportResult::Failure;
                }
            }
        }
        combined
    }

    async fn shutdown(&self) -> ExportResult {
        let mut combined = ExportResult::Success;
        for (index, exporter) in self.exporters.iter().enumerate() {
            match AssertUnwindSafe(exporter.shutdown()).catch_unwind().await {
                Ok(result) => combined = combined.and(result),
                Err(_) => {
                    warn!(exporter = index, "Exporter panicked during shutdown");
                    combined = ExportResult::Failure;
                }
            }
        }
        combined
    }
}
