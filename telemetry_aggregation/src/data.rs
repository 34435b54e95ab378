use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use telemetry_core::{AttributeSet, InstrumentDescriptor, Temporality};

use crate::accumulation::Accumulation;
use crate::exemplar::Exemplar;

/// One emitted data point: the accumulation for a single series over
/// `[start_time, time]`, plus any exemplars sampled during the window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricPoint {
    pub attributes: AttributeSet,
    pub value: Accumulation,
    pub start_time: DateTime<Utc>,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exemplars: Vec<Exemplar>,
}

/// The immutable snapshot of one instrument produced by a collection sweep;
/// this is the unit handed to the export queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricData {
    pub descriptor: InstrumentDescriptor,
    pub temporality: Temporality,
    pub points: Vec<MetricPoint>,
}
