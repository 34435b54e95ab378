use async_trait::async_trait;
use parking_lot::Mutex;

use crate::exporter::{ExportResult, Exporter};

/// Records exported batches in memory for tests and inspection. Batch
/// boundaries are preserved so callers can assert on sizing behavior.
pub struct InMemoryExporter<T> {
    batches: Mutex<Vec<Vec<T>>>,
    shutdown_calls: Mutex<usize>,
}

impl<T> InMemoryExporter<T> {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            shutdown_calls: Mutex::new(0),
        }
    }

    /// Take all recorded batches, leaving the buffer empty.
    pub fn take_batches(&self) -> Vec<Vec<T>> {
        std::mem::take(&mut *self.batches.lock())
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn item_count(&self) -> usize {
        self.batches.lock().iter().map(|batch| batch.len()).sum()
    }

    pub fn shutdown_calls(&self) -> usize {
        *self.shutdown_calls.lock()
    }
}

impl<T> Default for InMemoryExporter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> Exporter<T> for InMemoryExporter<T> {
    async fn export(&self, batch: Vec<T>) -> ExportResult {
        self.batches.lock().push(batch);
        ExportResult::Success
    }

    async fn shutdown(&self) -> ExportResult {
        *self.shutdown_calls.lock() += 1;
        ExportResult::Success
    }
}
