use serde::{Deserialize, Serialize};

/// Defines the window an emitted aggregation was calculated over.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Temporality {
    /// A measurement interval that continues to expand forward in time from
    /// a starting point. New measurements are added to all previous
    /// measurements since the start time.
    Cumulative,

    /// A measurement interval that resets each collection cycle.
    /// Measurements from one cycle do not affect the next.
    Delta,
}
