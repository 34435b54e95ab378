//! Batched export pipeline.
//!
//! Producer threads enqueue finished items without ever blocking; a single
//! background worker drains the bounded queue into batches and performs the
//! (slow, fallible) exporter calls. Exporter failures, panics and timeouts
//! are absorbed at the worker boundary and never reach producers or stop
//! the loop.

use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use telemetry_core::{Result, TelemetryError};

use crate::config::BatchConfig;
use crate::exporter::{ExportResult, Exporter};

const STATE_RUNNING: u8 = 0;
const STATE_FLUSHING: u8 = 1;
const STATE_SHUT_DOWN: u8 = 2;

enum ControlMessage {
    Flush(oneshot::Sender<ExportResult>),
    Shutdown(oneshot::Sender<ExportResult>),
}

pub struct BatchProcessor<T> {
    data_tx: mpsc::Sender<T>,
    control_tx: mpsc::UnboundedSender<ControlMessage>,
    state: Arc<AtomicU8>,
    dropped: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + Sync + 'static> BatchProcessor<T> {
    /// Validate the configuration and spawn the worker task. Must be called
    /// within a tokio runtime.
    pub fn new<E>(exporter: E, config: BatchConfig) -> Result<Self>
    where
        E: Exporter<T> + 'static,
    {
        config
            .validate()
            .map_err(TelemetryError::InvalidConfig)?;

        let (data_tx, data_rx) = mpsc::channel(config.max_queue_size);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            data_rx,
            control_rx,
            exporter,
            config,
            buffer: Vec::new(),
        };
        let handle = tokio::spawn(worker.run());

        Ok(Self {
            data_tx,
            control_tx,
            state: Arc::new(AtomicU8::new(STATE_RUNNING)),
            dropped: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Append one finished item. Never blocks: a full queue drops the
    /// incoming item and bumps the dropped counter, and after shutdown the
    /// call is a silent no-op.
    pub fn enqueue(&self, item: T) {
        if self.state.load(Ordering::Acquire) == STATE_SHUT_DOWN {
            return;
        }
        if self.data_tx.try_send(item).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Monotonic count of items rejected because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Ask the worker to export everything currently queued, blocking the
    /// caller until it acknowledges or `timeout` elapses. May issue several
    /// export calls when more than one batch is pending.
    pub async fn force_flush(&self, timeout: Duration) -> ExportResult {
        if self.state.load(Ordering::Acquire) == STATE_SHUT_DOWN {
            return ExportResult::Failure;
        }
        // Concurrent flush requests both get served; the state simply
        // reflects that a flush is in progress.
        let _ = self.state.compare_exchange(
            STATE_RUNNING,
            STATE_FLUSHING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        let result = self.request(ControlMessage::Flush, timeout).await;

        let _ = self.state.compare_exchange(
            STATE_FLUSHING,
            STATE_RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        result
    }

    /// Flush, stop the worker, and shut the exporter down. Terminal and
    /// idempotent: the second call is an immediate success no-op, and every
    /// later `enqueue` silently drops its item.
    pub async fn shutdown(&self, timeout: Duration) -> ExportResult {
        if self.state.swap(STATE_SHUT_DOWN, Ordering::AcqRel) == STATE_SHUT_DOWN {
            return ExportResult::Success;
        }

        let result = self.request(ControlMessage::Shutdown, timeout).await;

        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
        }
        result
    }

    async fn request(
        &self,
        message: fn(oneshot::Sender<ExportResult>) -> ControlMessage,
        timeout: Duration,
    ) -> ExportResult {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control_tx.send(message(ack_tx)).is_err() {
            return ExportResult::Failure;
        }
        match tokio::time::timeout(timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => ExportResult::Failure,
            Err(_) => {
                warn!(?timeout, "Timed out waiting for the export worker");
                ExportResult::Failure
            }
        }
    }
}

struct Worker<T, E> {
    data_rx: mpsc::Receiver<T>,
    control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    exporter: E,
    config: BatchConfig,
    buffer: Vec<T>,
}

impl<T: Send + 'static, E: Exporter<T>> Worker<T, E> {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.schedule_delay);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(message) = self.control_rx.recv() => match message {
                    ControlMessage::Flush(ack) => {
                        let result = self.drain_and_export().await;
                        let result = result.and(self.guarded(self.exporter.flush()).await);
                        let _ = ack.send(result);
                    }
                    ControlMessage::Shutdown(ack) => {
                        let result = self.drain_and_export().await;
                        let result = result.and(self.guarded(self.exporter.shutdown()).await);
                        let _ = ack.send(result);
                        debug!("Export worker shut down");
                        return;
                    }
                },
                item = self.data_rx.recv() => match item {
                    Some(item) => {
                        self.buffer.push(item);
                        if self.buffer.len() >= self.config.max_export_batch_size {
                            self.export_buffered().await;
                        }
                    }
                    // Every producer handle is gone; flush what is left
                    // and stop.
                    None => {
                        self.drain_and_export().await;
                        let _ = self.guarded(self.exporter.shutdown()).await;
                        debug!("Export worker stopped, queue closed");
                        return;
                    }
                },
                _ = ticker.tick() => {
                    if !self.buffer.is_empty() {
                        self.export_buffered().await;
                    }
                }
            }
        }
    }

    /// Pull everything already sitting in the queue into the local buffer,
    /// then export it batch by batch.
    async fn drain_and_export(&mut self) -> ExportResult {
        while let Ok(item) = self.data_rx.try_recv() {
            self.buffer.push(item);
        }
        let mut combined = ExportResult::Success;
        while !self.buffer.is_empty() {
            combined = combined.and(self.export_buffered().await);
        }
        combined
    }

    /// Export up to one batch from the front of the buffer, preserving
    /// enqueue order.
    async fn export_buffered(&mut self) -> ExportResult {
        let batch_size = self.buffer.len().min(self.config.max_export_batch_size);
        let batch: Vec<T> = self.buffer.drain(..batch_size).collect();
        let count = batch.len();

        let export = self.exporter.export(batch);
        let outcome = tokio::time::timeout(
            self.config.exporter_timeout,
            AssertUnwindSafe(export).catch_unwind(),
        )
        .await;

        match outcome {
            Err(_) => {
                // The batch is lost, the pipeline is not.
                warn!(
                    batch_size = count,
                    timeout = ?self.config.exporter_timeout,
                    "Export call timed out"
                );
                ExportResult::Failure
            }
            Ok(Err(_)) => {
                warn!(batch_size = count, "Exporter panicked");
                ExportResult::Failure
            }
            Ok(Ok(result)) => {
                if !result.is_success() {
                    warn!(batch_size = count, "Export failed");
                }
                result
            }
        }
    }

    async fn guarded(
        &self,
        call: impl std::future::Future<Output = ExportResult>,
    ) -> ExportResult {
        match tokio::time::timeout(
            self.config.exporter_timeout,
            AssertUnwindSafe(call).catch_unwind(),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                warn!("Exporter panicked");
                ExportResult::Failure
            }
            Err(_) => {
                warn!("Exporter call timed out");
                ExportResult::Failure
            }
        }
    }
}
