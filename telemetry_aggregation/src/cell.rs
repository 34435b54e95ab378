//! Mutable accumulation cells.
//!
//! A cell is the accumulation-in-progress owned by one aggregator handle.
//! Sum, count and store cells are plain atomics; min/max/sum/count and
//! histogram cells guard their compound state with a short-held mutex.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use telemetry_core::MetricValue;

use crate::accumulation::Accumulation;

/// `f64` adder built on `AtomicU64` bit transmutation.
#[derive(Debug)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub(crate) fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    pub(crate) fn swap(&self, value: f64) -> f64 {
        f64::from_bits(self.bits.swap(value.to_bits(), Ordering::AcqRel))
    }

    pub(crate) fn fetch_add(&self, delta: f64) {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self.bits.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}

#[derive(Debug)]
pub struct MinMaxSumCountState {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl MinMaxSumCountState {
    fn empty() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
}

#[derive(Debug)]
pub struct HistogramState {
    sum: f64,
    bucket_counts: Vec<u64>,
}

/// The closed set of mutable cell shapes, one per (aggregation kind, value
/// type) combination. Observed cells hold the absolute value reported by an
/// asynchronous callback and snapshot into a sum.
#[derive(Debug)]
pub enum AggregationCell {
    LongSum(AtomicI64),
    DoubleSum(AtomicF64),
    Count(AtomicU64),
    LongLastValue(AtomicI64),
    DoubleLastValue(AtomicF64),
    LongObserved(AtomicI64),
    DoubleObserved(AtomicF64),
    MinMaxSumCount(Mutex<MinMaxSumCountState>),
    Histogram {
        boundaries: Arc<Vec<f64>>,
        state: Mutex<HistogramState>,
    },
}

impl AggregationCell {
    pub(crate) fn long_sum() -> Self {
        Self::LongSum(AtomicI64::new(0))
    }

    pub(crate) fn double_sum() -> Self {
        Self::DoubleSum(AtomicF64::new(0.0))
    }

    pub(crate) fn count() -> Self {
        Self::Count(AtomicU64::new(0))
    }

    pub(crate) fn long_last_value() -> Self {
        Self::LongLastValue(AtomicI64::new(0))
    }

    pub(crate) fn double_last_value() -> Self {
        Self::DoubleLastValue(AtomicF64::new(0.0))
    }

    pub(crate) fn long_observed() -> Self {
        Self::LongObserved(AtomicI64::new(0))
    }

    pub(crate) fn double_observed() -> Self {
        Self::DoubleObserved(AtomicF64::new(0.0))
    }

    pub(crate) fn min_max_sum_count() -> Self {
        Self::MinMaxSumCount(Mutex::new(MinMaxSumCountState::empty()))
    }

    pub(crate) fn histogram(boundaries: Arc<Vec<f64>>) -> Self {
        let bucket_count = boundaries.len() + 1;
        Self::Histogram {
            boundaries,
            state: Mutex::new(HistogramState {
                sum: 0.0,
                bucket_counts: vec![0; bucket_count],
            }),
        }
    }

    pub fn record(&self, value: MetricValue) {
        match self {
            Self::LongSum(cell) => {
                let delta = match value {
                    MetricValue::Long(v) => v,
                    MetricValue::Double(v) => v as i64,
                };
                cell.fetch_add(delta, Ordering::AcqRel);
            }
            Self::DoubleSum(cell) => cell.fetch_add(value.as_f64()),
            // Counts add one per recording regardless of the value.
            Self::Count(cell) => {
                cell.fetch_add(1, Ordering::AcqRel);
            }
            Self::LongLastValue(cell) | Self::LongObserved(cell) => {
                let stored = match value {
                    MetricValue::Long(v) => v,
                    MetricValue::Double(v) => v as i64,
                };
                cell.store(stored, Ordering::Release);
            }
            Self::DoubleLastValue(cell) | Self::DoubleObserved(cell) => {
                cell.store(value.as_f64());
            }
            Self::MinMaxSumCount(state) => {
                state.lock().record(value.as_f64());
            }
            Self::Histogram { boundaries, state } => {
                let value = value.as_f64();
                // First boundary >= value wins; anything above the last
                // boundary lands in the overflow bucket.
                let index = boundaries
                    .iter()
                    .position(|boundary| value <= *boundary)
                    .unwrap_or(boundaries.len());
                let mut guard = state.lock();
                guard.sum += value;
                guard.bucket_counts[index] += 1;
            }
        }
    }

    /// Snapshot the current state into an immutable accumulation and reset
    /// the cell for the next interval.
    pub fn take(&self) -> Accumulation {
        match self {
            Self::LongSum(cell) => {
                Accumulation::Sum(MetricValue::Long(cell.swap(0, Ordering::AcqRel)))
            }
            Self::DoubleSum(cell) => Accumulation::Sum(MetricValue::Double(cell.swap(0.0))),
            Self::Count(cell) => {
                Accumulation::Sum(MetricValue::Long(cell.swap(0, Ordering::AcqRel) as i64))
            }
            // Presence is tracked by the owning handle's recording flag, so
            // the stored bits themselves need no sentinel reset.
            Self::LongLastValue(cell) => {
                Accumulation::LastValue(MetricValue::Long(cell.load(Ordering::Acquire)))
            }
            Self::DoubleLastValue(cell) => {
                Accumulation::LastValue(MetricValue::Double(cell.load()))
            }
            Self::LongObserved(cell) => {
                Accumulation::Sum(MetricValue::Long(cell.load(Ordering::Acquire)))
            }
            Self::DoubleObserved(cell) => Accumulation::Sum(MetricValue::Double(cell.load())),
            Self::MinMaxSumCount(state) => {
                let mut guard = state.lock();
                let snapshot = std::mem::replace(&mut *guard, MinMaxSumCountState::empty());
                Accumulation::MinMaxSumCount {
                    count: snapshot.count,
                    sum: snapshot.sum,
                    min: snapshot.min,
                    max: snapshot.max,
                }
            }
            Self::Histogram { state, .. } => {
                let mut guard = state.lock();
                let sum = guard.sum;
                let bucket_counts = guard.bucket_counts.clone();
                guard.sum = 0.0;
                guard.bucket_counts.iter_mut().for_each(|count| *count = 0);
                Accumulation::Histogram { sum, bucket_counts }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_sum_accumulates_and_resets() {
        let cell = AggregationCell::long_sum();
        cell.record(MetricValue::Long(3));
        cell.record(MetricValue::Long(4));

        assert_eq!(cell.take(), Accumulation::Sum(MetricValue::Long(7)));
        assert_eq!(cell.take(), Accumulation::Sum(MetricValue::Long(0)));
    }

    #[test]
    fn test_double_sum_concurrent_adds() {
        let cell = Arc::new(AggregationCell::double_sum());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = cell.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    cell.record(MetricValue::Double(0.5));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cell.take(), Accumulation::Sum(MetricValue::Double(4000.0)));
    }

    #[test]
    fn test_count_ignores_value() {
        let cell = AggregationCell::count();
        cell.record(MetricValue::Long(100));
        cell.record(MetricValue::Long(-50));
        cell.record(MetricValue::Double(0.0));

        assert_eq!(cell.take(), Accumulation::Sum(MetricValue::Long(3)));
    }

    #[test]
    fn test_last_value_keeps_latest() {
        let cell = AggregationCell::double_last_value();
        cell.record(MetricValue::Double(1.0));
        cell.record(MetricValue::Double(9.0));

        assert_eq!(
            cell.take(),
            Accumulation::LastValue(MetricValue::Double(9.0))
        );
    }

    #[test]
    fn test_min_max_sum_count() {
        let cell = AggregationCell::min_max_sum_count();
        for value in [3.0, -1.0, 7.0] {
            cell.record(MetricValue::Double(value));
        }

        assert_eq!(
            cell.take(),
            Accumulation::MinMaxSumCount {
                count: 3,
                sum: 9.0,
                min: -1.0,
                max: 7.0,
            }
        );
    }

    #[test]
    fn test_min_max_sum_count_reset_state() {
        let cell = AggregationCell::min_max_sum_count();
        cell.record(MetricValue::Double(5.0));
        cell.take();
        cell.record(MetricValue::Double(2.0));

        assert_eq!(
            cell.take(),
            Accumulation::MinMaxSumCount {
                count: 1,
                sum: 2.0,
                min: 2.0,
                max: 2.0,
            }
        );
    }

    #[test]
    fn test_histogram_bucketing() {
        let cell = AggregationCell::histogram(Arc::new(vec![10.0, 20.0]));
        for value in [5.0, 10.0, 15.0, 25.0] {
            cell.record(MetricValue::Double(value));
        }

        assert_eq!(
            cell.take(),
            Accumulation::Histogram {
                sum: 55.0,
                bucket_counts: vec![2, 1, 1],
            }
        );
    }

    #[test]
    fn test_histogram_reset_zero_fills() {
        let cell = AggregationCell::histogram(Arc::new(vec![10.0]));
        cell.record(MetricValue::Double(50.0));
        cell.take();

        assert_eq!(
            cell.take(),
            Accumulation::Histogram {
                sum: 0.0,
                bucket_counts: vec![0, 0],
            }
        );
    }
}
