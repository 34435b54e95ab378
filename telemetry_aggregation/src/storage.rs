//! Per-instrument storage.
//!
//! One storage owns every live series of one instrument: an attribute-set
//! keyed map of aggregator handles, the temporality bookkeeping between
//! collections, and the collection sweep itself. Producer threads insert
//! and record concurrently; the sweep runs on a single collection thread.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use telemetry_core::{AttributeSet, InstrumentDescriptor, MetricValue, Temporality};

use crate::accumulation::Accumulation;
use crate::aggregator::Aggregation;
use crate::data::{MetricData, MetricPoint};
use crate::exemplar::Exemplar;
use crate::handle::AggregatorHandle;

/// How one storage turns handle resets into emitted points. Resolved once
/// from (instrument kind, reader temporality) at construction; in
/// particular, whether consecutive collections merge by addition or by
/// subtraction is never decided per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionMode {
    /// Synchronous, delta: emit the reset values as-is.
    Delta,
    /// Synchronous, cumulative: fold each delta into a running total.
    CumulativeFromDeltas,
    /// Asynchronous, cumulative: callbacks already report absolutes.
    Cumulative,
    /// Asynchronous, delta: subtract the previously observed absolute.
    DeltaFromCumulative,
}

pub struct MetricStorage {
    descriptor: InstrumentDescriptor,
    aggregation: Aggregation,
    temporality: Temporality,
    mode: CollectionMode,
    handles: DashMap<AttributeSet, Arc<AggregatorHandle>>,
    /// Running totals for cumulative synchronous instruments, or the
    /// previously observed absolutes for delta asynchronous ones.
    prior: Mutex<HashMap<AttributeSet, Accumulation>>,
    start_time: DateTime<Utc>,
    last_collection: Mutex<DateTime<Utc>>,
    with_exemplars: bool,
    enabled: AtomicBool,
}

impl MetricStorage {
    pub fn new(
        descriptor: InstrumentDescriptor,
        aggregation: Aggregation,
        temporality: Temporality,
    ) -> Self {
        let mode = match (descriptor.kind.is_synchronous(), temporality) {
            (true, Temporality::Delta) => CollectionMode::Delta,
            (true, Temporality::Cumulative) => CollectionMode::CumulativeFromDeltas,
            (false, Temporality::Cumulative) => CollectionMode::Cumulative,
            (false, Temporality::Delta) => CollectionMode::DeltaFromCumulative,
        };
        let start_time = Utc::now();
        Self {
            descriptor,
            aggregation,
            temporality,
            mode,
            handles: DashMap::new(),
            prior: Mutex::new(HashMap::new()),
            start_time,
            last_collection: Mutex::new(start_time),
            with_exemplars: false,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn with_exemplars(mut self, with_exemplars: bool) -> Self {
        self.with_exemplars = with_exemplars;
        self
    }

    pub fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    pub fn temporality(&self) -> Temporality {
        self.temporality
    }

    /// Number of currently mapped series.
    pub fn series_count(&self) -> usize {
        self.handles.len()
    }

    /// Permanently stop accepting recordings; subsequent record calls are
    /// silent no-ops.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn record_long(&self, attributes: AttributeSet, value: i64) {
        self.record(attributes, MetricValue::Long(value));
    }

    pub fn record_double(&self, attributes: AttributeSet, value: f64) {
        self.record(attributes, MetricValue::Double(value));
    }

    /// Find or create the series handle and record under an acquired
    /// reference, so the recording can never race with an eviction.
    pub fn record(&self, attributes: AttributeSet, value: MetricValue) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        loop {
            let handle = self
                .handles
                .entry(attributes.clone())
                .or_insert_with(|| Arc::new(self.new_handle()))
                .value()
                .clone();

            let mapped = handle.acquire();
            if mapped {
                handle.record(value);
                handle.release();
                return;
            }
            // Lost the race with an eviction between lookup and acquire;
            // the entry is gone, loop to create a fresh handle.
            handle.release();
        }
    }

    fn new_handle(&self) -> AggregatorHandle {
        let observed = !self.descriptor.kind.is_synchronous();
        AggregatorHandle::new(
            self.aggregation
                .create_cell(self.descriptor.value_type, observed),
            self.with_exemplars,
        )
    }

    /// The collection sweep. Resets every active handle, evicts series that
    /// reported nothing this interval, and resolves temporality into the
    /// emitted points. Must be called from a single collection thread.
    pub fn collect(&self, now: DateTime<Utc>) -> Option<MetricData> {
        let mut measurements: Vec<(AttributeSet, Accumulation, Vec<Exemplar>)> = Vec::new();
        let mut idle: Vec<AttributeSet> = Vec::new();

        for entry in self.handles.iter() {
            match entry.value().accumulate_then_reset() {
                Some(accumulation) => measurements.push((
                    entry.key().clone(),
                    accumulation,
                    entry.value().collect_exemplars(),
                )),
                None => idle.push(entry.key().clone()),
            }
        }

        // Idle series are eviction candidates; physical removal is
        // authorized solely by the refcount CAS, so a series a writer is
        // touching right now survives untouched.
        let mut evicted = 0usize;
        for key in idle {
            if self
                .handles
                .remove_if(&key, |_, handle| handle.try_unmap())
                .is_some()
            {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(
                instrument = %self.descriptor.name,
                evicted,
                "Evicted idle series"
            );
        }

        let window_start = {
            let mut last = self.last_collection.lock();
            std::mem::replace(&mut *last, now)
        };

        if measurements.is_empty() {
            return None;
        }

        let mut points = Vec::with_capacity(measurements.len());

        match self.mode {
            // Synchronous deltas are exactly what the reset produced.
            CollectionMode::Delta => {
                for (attributes, accumulation, exemplars) in measurements {
                    points.push(MetricPoint {
                        attributes,
                        value: accumulation,
                        start_time: window_start,
                        time: now,
                        exemplars,
                    });
                }
            }
            // Synchronous cumulative points merge each delta into the
            // running per-series total.
            CollectionMode::CumulativeFromDeltas => {
                let mut prior = self.prior.lock();
                for (attributes, accumulation, exemplars) in measurements {
                    let merged = match prior.get(&attributes) {
                        Some(previous) => {
                            self.aggregation.merge(previous.clone(), accumulation)
                        }
                        None => accumulation,
                    };
                    prior.insert(attributes.clone(), merged.clone());
                    points.push(MetricPoint {
                        attributes,
                        value: merged,
                        start_time: self.start_time,
                        time: now,
                        exemplars,
                    });
                }
            }
            // Asynchronous callbacks already report cumulative absolutes.
            CollectionMode::Cumulative => {
                for (attributes, accumulation, exemplars) in measurements {
                    points.push(MetricPoint {
                        attributes,
                        value: accumulation,
                        start_time: self.start_time,
                        time: now,
                        exemplars,
                    });
                }
            }
            // Reading a cumulative stream with delta temporality: the merge
            // between consecutive collections is subtraction, chosen here
            // once per storage and never per call.
            CollectionMode::DeltaFromCumulative => {
                let mut prior = self.prior.lock();
                for (attributes, accumulation, exemplars) in measurements {
                    let delta = match prior.get(&attributes) {
                        Some(previous) => self
                            .aggregation
                            .diff(previous.clone(), accumulation.clone()),
                        None => accumulation.clone(),
                    };
                    prior.insert(attributes.clone(), accumulation);
                    points.push(MetricPoint {
                        attributes,
                        value: delta,
                        start_time: window_start,
                        time: now,
                        exemplars,
                    });
                }
            }
        }

        Some(MetricData {
            descriptor: self.descriptor.clone(),
            temporality: self.temporality,
            points,
        })
    }
}
