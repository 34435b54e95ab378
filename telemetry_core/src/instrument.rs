use serde::{Deserialize, Serialize};

/// The kind of instrument a measurement originates from. Synchronous kinds
/// are recorded inline by application threads; observable kinds report an
/// absolute value from a callback at collection time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Counter,
    UpDownCounter,
    Histogram,
    ObservableGauge,
    ObservableCounter,
    ObservableUpDownCounter,
}

impl InstrumentKind {
    /// Monotonic instruments only accept non-negative deltas. Rejection of
    /// negative values happens at the instrument API boundary; the
    /// aggregation engine assumes it already held.
    pub fn is_monotonic(&self) -> bool {
        matches!(self, Self::Counter | Self::ObservableCounter)
    }

    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::Counter | Self::UpDownCounter | Self::Histogram)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ValueType {
    Long,
    Double,
}

/// Immutable description of one registered instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstrumentDescriptor {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub kind: InstrumentKind,
    pub value_type: ValueType,
}

impl InstrumentDescriptor {
    pub fn new(
        name: impl Into<String>,
        kind: InstrumentKind,
        value_type: ValueType,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            kind,
            value_type,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn is_monotonic(&self) -> bool {
        self.kind.is_monotonic()
    }
}
