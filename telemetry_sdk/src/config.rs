use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use telemetry_aggregation::aggregator::{Aggregation, DEFAULT_HISTOGRAM_BOUNDARIES};
use telemetry_core::{InstrumentKind, Result, Temporality};

/// Which temporality a reader asks its instruments for. The concrete
/// temporality of each storage is still resolved per instrument kind, once,
/// at registration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TemporalityPreference {
    #[default]
    Cumulative,
    Delta,
}

/// Per-instrument aggregation override. `Default` defers to the fixed
/// instrument-kind table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum AggregationSpec {
    #[default]
    Default,
    Sum,
    Count,
    LastValue,
    MinMaxSumCount,
    Histogram {
        boundaries: Vec<f64>,
    },
}

/// Reader-level configuration consumed at instrument registration: the
/// temporality preference, default histogram boundaries, exemplar sampling,
/// and any per-instrument aggregation overrides keyed by instrument name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default)]
    pub temporality_preference: TemporalityPreference,
    #[serde(default = "default_histogram_boundaries")]
    pub histogram_boundaries: Vec<f64>,
    #[serde(default)]
    pub enable_exemplars: bool,
    #[serde(default)]
    pub aggregation_overrides: HashMap<String, AggregationSpec>,
}

fn default_histogram_boundaries() -> Vec<f64> {
    DEFAULT_HISTOGRAM_BOUNDARIES.to_vec()
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            temporality_preference: TemporalityPreference::default(),
            histogram_boundaries: default_histogram_boundaries(),
            enable_exemplars: false,
            aggregation_overrides: HashMap::new(),
        }
    }
}

impl ReaderConfig {
    pub fn delta() -> Self {
        Self {
            temporality_preference: TemporalityPreference::Delta,
            ..Self::default()
        }
    }

    pub fn temporality_for(&self, _kind: InstrumentKind) -> Temporality {
        match self.temporality_preference {
            TemporalityPreference::Cumulative => Temporality::Cumulative,
            TemporalityPreference::Delta => Temporality::Delta,
        }
    }

    /// Resolve the aggregation for one instrument, validating any histogram
    /// boundaries involved.
    pub fn aggregation_for(&self, name: &str, kind: InstrumentKind) -> Result<Aggregation> {
        let spec = self
            .aggregation_overrides
            .get(name)
            .cloned()
            .unwrap_or_default();

        match spec {
            AggregationSpec::Default => match kind {
                InstrumentKind::Histogram => {
                    Aggregation::histogram(self.histogram_boundaries.clone())
                }
                other => Ok(Aggregation::default_for(other)),
            },
            AggregationSpec::Sum => Ok(Aggregation::Sum),
            AggregationSpec::Count => Ok(Aggregation::Count),
            AggregationSpec::LastValue => Ok(Aggregation::LastValue),
            AggregationSpec::MinMaxSumCount => Ok(Aggregation::MinMaxSumCount),
            AggregationSpec::Histogram { boundaries } => Aggregation::histogram(boundaries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reader_is_cumulative() {
        let config = ReaderConfig::default();
        assert_eq!(
            config.temporality_for(InstrumentKind::Counter),
            Temporality::Cumulative
        );
        assert!(!config.enable_exemplars);
    }

    #[test]
    fn test_delta_preference_applies_to_all_kinds() {
        let config = ReaderConfig::delta();
        assert_eq!(
            config.temporality_for(InstrumentKind::Counter),
            Temporality::Delta
        );
        assert_eq!(
            config.temporality_for(InstrumentKind::ObservableUpDownCounter),
            Temporality::Delta
        );
    }

    #[test]
    fn test_aggregation_override_by_name() {
        let mut config = ReaderConfig::default();
        config
            .aggregation_overrides
            .insert("latency".to_string(), AggregationSpec::MinMaxSumCount);

        let aggregation = config
            .aggregation_for("latency", InstrumentKind::Histogram)
            .unwrap();
        assert!(matches!(aggregation, Aggregation::MinMaxSumCount));

        let aggregation = config
            .aggregation_for("other", InstrumentKind::Histogram)
            .unwrap();
        assert!(matches!(aggregation, Aggregation::Histogram { .. }));
    }

    #[test]
    fn test_invalid_override_boundaries_rejected() {
        let mut config = ReaderConfig::default();
        config.aggregation_overrides.insert(
            "latency".to_string(),
            AggregationSpec::Histogram {
                boundaries: vec![20.0, 10.0],
            },
        );

        assert!(config
            .aggregation_for("latency", InstrumentKind::Histogram)
            .is_err());
    }
}
