use serde::{Deserialize, Serialize};
use telemetry_core::MetricValue;

/// An immutable snapshot of one series' aggregated state, produced by
/// resetting an aggregator handle. Once produced it is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Accumulation {
    Sum(MetricValue),
    LastValue(MetricValue),
    MinMaxSumCount {
        count: u64,
        sum: f64,
        min: f64,
        max: f64,
    },
    Histogram {
        sum: f64,
        bucket_counts: Vec<u64>,
    },
}
