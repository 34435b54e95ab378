//! Aggregation strategies.
//!
//! Each instrument kind maps to exactly one aggregation kind through a fixed
//! table; the strategy enum is matched exhaustively so a new kind cannot be
//! added without handling every call site.

use std::sync::Arc;

use telemetry_core::{InstrumentKind, Result, TelemetryError, ValueType};

use crate::accumulation::Accumulation;
use crate::cell::AggregationCell;

/// Default histogram boundaries applied when an instrument does not
/// configure its own.
pub const DEFAULT_HISTOGRAM_BOUNDARIES: &[f64] = &[
    5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0, 7500.0,
    10000.0,
];

#[derive(Debug, Clone)]
pub enum Aggregation {
    Sum,
    Count,
    LastValue,
    MinMaxSumCount,
    Histogram { boundaries: Arc<Vec<f64>> },
}

impl Aggregation {
    /// Build a histogram aggregation, validating the bucket boundaries:
    /// they must be finite and strictly increasing. An empty list yields a
    /// single catch-all bucket.
    pub fn histogram(boundaries: Vec<f64>) -> Result<Self> {
        for boundary in &boundaries {
            if !boundary.is_finite() {
                return Err(TelemetryError::InvalidBucketBoundaries(format!(
                    "boundary {} is not finite",
                    boundary
                )));
            }
        }
        for pair in boundaries.windows(2) {
            if pair[0] >= pair[1] {
                return Err(TelemetryError::InvalidBucketBoundaries(format!(
                    "boundaries must be strictly increasing, found {} before {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(Self::Histogram {
            boundaries: Arc::new(boundaries),
        })
    }

    /// The fixed instrument-kind table. `Count` and `MinMaxSumCount` are
    /// never defaults; they are only reachable through explicit reader
    /// configuration.
    pub fn default_for(kind: InstrumentKind) -> Self {
        match kind {
            InstrumentKind::Counter
            | InstrumentKind::UpDownCounter
            | InstrumentKind::ObservableCounter
            | InstrumentKind::ObservableUpDownCounter => Self::Sum,
            InstrumentKind::ObservableGauge => Self::LastValue,
            InstrumentKind::Histogram => Self::Histogram {
                boundaries: Arc::new(DEFAULT_HISTOGRAM_BOUNDARIES.to_vec()),
            },
        }
    }

    /// Allocate the mutable cell backing one series. Asynchronous
    /// instruments report cumulative absolutes from their callbacks, so
    /// their sum cells store instead of add.
    pub fn create_cell(&self, value_type: ValueType, observed: bool) -> AggregationCell {
        match (self, value_type, observed) {
            (Self::Sum, ValueType::Long, false) => AggregationCell::long_sum(),
            (Self::Sum, ValueType::Double, false) => AggregationCell::double_sum(),
            (Self::Sum, ValueType::Long, true) => AggregationCell::long_observed(),
            (Self::Sum, ValueType::Double, true) => AggregationCell::double_observed(),
            (Self::Count, _, _) => AggregationCell::count(),
            (Self::LastValue, ValueType::Long, _) => AggregationCell::long_last_value(),
            (Self::LastValue, ValueType::Double, _) => AggregationCell::double_last_value(),
            (Self::MinMaxSumCount, _, _) => AggregationCell::min_max_sum_count(),
            (Self::Histogram { boundaries }, _, _) => {
                AggregationCell::histogram(boundaries.clone())
            }
        }
    }

    /// Merge a previous accumulation with a newer one. Mismatched variants
    /// cannot arise from cells created by one storage; if one is observed
    /// anyway the newer accumulation wins.
    pub fn merge(&self, previous: Accumulation, current: Accumulation) -> Accumulation {
        match (previous, current) {
            (Accumulation::Sum(a), Accumulation::Sum(b)) => Accumulation::Sum(a.add(b)),
            // Merged last-value accumulations do not preserve temporal
            // ordering across the merge; the newer operand wins.
            (Accumulation::LastValue(_), Accumulation::LastValue(b)) => {
                Accumulation::LastValue(b)
            }
            (
                Accumulation::MinMaxSumCount {
                    count: count_a,
                    sum: sum_a,
                    min: min_a,
                    max: max_a,
                },
                Accumulation::MinMaxSumCount {
                    count: count_b,
                    sum: sum_b,
                    min: min_b,
                    max: max_b,
                },
            ) => Accumulation::MinMaxSumCount {
                count: count_a + count_b,
                sum: sum_a + sum_b,
                min: min_a.min(min_b),
                max: max_a.max(max_b),
            },
            (
                Accumulation::Histogram {
                    sum: sum_a,
                    bucket_counts: buckets_a,
                },
                Accumulation::Histogram {
                    sum: sum_b,
                    bucket_counts: buckets_b,
                },
            ) => Accumulation::Histogram {
                sum: sum_a + sum_b,
                bucket_counts: buckets_a
                    .iter()
                    .zip(buckets_b.iter())
                    .map(|(a, b)| a + b)
                    .collect(),
            },
            (_, current) => current,
        }
    }

    /// Subtraction merge used when a cumulative absolute stream is read
    /// with delta temporality: the emitted value is `current - previous`.
    /// Only sums carry enough structure to diff; other kinds pass the
    /// current accumulation through.
    pub fn diff(&self, previous: Accumulation, current: Accumulation) -> Accumulation {
        match (previous, current) {
            (Accumulation::Sum(a), Accumulation::Sum(b)) => Accumulation::Sum(b.sub(a)),
            (_, current) => current,
        }
    }
}
