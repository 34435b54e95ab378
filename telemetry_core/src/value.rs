use serde::{Deserialize, Serialize};

use crate::instrument::ValueType;

/// A single measured value, either integral or floating point. The value
/// type of an instrument is fixed at registration, so arithmetic between
/// mismatched variants widens to double rather than failing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MetricValue {
    Long(i64),
    Double(f64),
}

impl MetricValue {
    pub fn zero(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Long => Self::Long(0),
            ValueType::Double => Self::Double(0.0),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Long(v) => *v as f64,
            Self::Double(v) => *v,
        }
    }

    pub fn add(self, other: Self) -> Self {
        match (self, other) {
            (Self::Long(a), Self::Long(b)) => Self::Long(a.wrapping_add(b)),
            (a, b) => Self::Double(a.as_f64() + b.as_f64()),
        }
    }

    pub fn sub(self, other: Self) -> Self {
        match (self, other) {
            (Self::Long(a), Self::Long(b)) => Self::Long(a.wrapping_sub(b)),
            (a, b) => Self::Double(a.as_f64() - b.as_f64()),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}
