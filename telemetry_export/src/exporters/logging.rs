use async_trait::async_trait;
use std::fmt::Debug;

use crate::exporter::{ExportResult, Exporter};

/// Logs every batch item via `tracing`. Useful as a smoke-test backend and
/// for local debugging.
#[derive(Debug, Default)]
pub struct LoggingExporter;

#[async_trait]
impl<T: Debug + Send + 'static> Exporter<T> for LoggingExporter {
    async fn export(&self, batch: Vec<T>) -> ExportResult {
        tracing::debug!(batch_size = batch.len(), "Exporting batch");
        for item in &batch {
            tracing::debug!(?item, "export item");
        }
        ExportResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_exporter_succeeds() {
        let exporter = LoggingExporter;
        let result = exporter.export(vec![1u32, 2, 3]).await;
        assert!(result.is_success());
    }
}
