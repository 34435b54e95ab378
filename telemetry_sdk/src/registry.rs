//! The instrument registry.
//!
//! One registry object owns every instrument's storage and the observable
//! callbacks attached to them. It is constructed once at process startup
//! and passed by reference wherever instruments are created; there is no
//! ambient global state.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use telemetry_aggregation::{MetricData, MetricStorage};
use telemetry_core::{
    AttributeSet, InstrumentDescriptor, MetricValue, Result, TelemetryError,
};

use crate::config::ReaderConfig;

/// Handed to observable callbacks at collection time; every `observe` call
/// reports the cumulative absolute value of one series.
pub struct Observer<'a> {
    storage: &'a MetricStorage,
}

impl Observer<'_> {
    pub fn observe(&self, attributes: AttributeSet, value: impl Into<MetricValue>) {
        self.storage.record(attributes, value.into());
    }
}

type ObservableCallback = Box<dyn Fn(&Observer<'_>) + Send + Sync>;

struct ObservableRegistration {
    storage: Arc<MetricStorage>,
    callback: ObservableCallback,
}

pub struct MeterRegistry {
    reader: ReaderConfig,
    storages: RwLock<HashMap<String, Arc<MetricStorage>>>,
    observables: Mutex<Vec<ObservableRegistration>>,
}

impl MeterRegistry {
    pub fn new(reader: ReaderConfig) -> Self {
        Self {
            reader,
            storages: RwLock::new(HashMap::new()),
            observables: Mutex::new(Vec::new()),
        }
    }

    /// Create the storage for one instrument, resolving aggregation and
    /// temporality exactly once from (kind, reader configuration).
    pub fn register_instrument(
        &self,
        descriptor: InstrumentDescriptor,
    ) -> Result<Arc<MetricStorage>> {
        let aggregation = self
            .reader
            .aggregation_for(&descriptor.name, descriptor.kind)?;
        let temporality = self.reader.temporality_for(descriptor.kind);

        let mut storages = self.storages.write();
        if storages.contains_key(&descriptor.name) {
            return Err(TelemetryError::DuplicateInstrument(descriptor.name));
        }

        debug!(
            instrument = %descriptor.name,
            kind = ?descriptor.kind,
            temporality = ?temporality,
            "Registered instrument"
        );

        let name = descriptor.name.clone();
        let storage = Arc::new(
            MetricStorage::new(descriptor, aggregation, temporality)
                .with_exemplars(self.reader.enable_exemplars),
        );
        storages.insert(name, storage.clone());
        Ok(storage)
    }

    /// Register an observable instrument together with the callback that
    /// reports its values at every collection.
    pub fn register_observable(
        &self,
        descriptor: InstrumentDescriptor,
        callback: impl Fn(&Observer<'_>) + Send + Sync + 'static,
    ) -> Result<Arc<MetricStorage>> {
        let storage = self.register_instrument(descriptor)?;
        self.observables.lock().push(ObservableRegistration {
            storage: storage.clone(),
            callback: Box::new(callback),
        });
        Ok(storage)
    }

    pub fn storage(&self, name: &str) -> Option<Arc<MetricStorage>> {
        self.storages.read().get(name).cloned()
    }

    pub fn instrument_count(&self) -> usize {
        self.storages.read().len()
    }

    /// One collection pass: run every observable callback, then sweep all
    /// storages. Called from the single collection task.
    pub fn collect_all(&self, now: DateTime<Utc>) -> Vec<MetricData> {
        {
            let observables = self.observables.lock();
            for registration in observables.iter() {
                let observer = Observer {
                    storage: &registration.storage,
                };
                (registration.callback)(&observer);
            }
        }

        self.storages
            .read()
            .values()
            .filter_map(|storage| storage.collect(now))
            .collect()
    }

    /// Stop accepting recordings on every storage. Recordings after this
    /// point are silent no-ops.
    pub fn disable_all(&self) {
        for storage in self.storages.read().values() {
            storage.disable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_core::{InstrumentKind, Temporality, ValueType};

    fn attributes() -> AttributeSet {
        [("host", "a")].into_iter().collect()
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = MeterRegistry::new(ReaderConfig::default());
        let descriptor =
            InstrumentDescriptor::new("requests", InstrumentKind::Counter, ValueType::Long);

        assert!(registry.register_instrument(descriptor.clone()).is_ok());
        assert!(matches!(
            registry.register_instrument(descriptor),
            Err(TelemetryError::DuplicateInstrument(_))
        ));
    }

    #[test]
    fn test_temporality_fixed_at_registration() {
        let registry = MeterRegistry::new(ReaderConfig::delta());
        let storage = registry
            .register_instrument(InstrumentDescriptor::new(
                "requests",
                InstrumentKind::Counter,
                ValueType::Long,
            ))
            .unwrap();

        assert_eq!(storage.temporality(), Temporality::Delta);
    }

    #[test]
    fn test_collect_all_sweeps_every_instrument() {
        let registry = MeterRegistry::new(ReaderConfig::delta());
        let requests = registry
            .register_instrument(InstrumentDescriptor::new(
                "requests",
                InstrumentKind::Counter,
                ValueType::Long,
            ))
            .unwrap();
        let errors = registry
            .register_instrument(InstrumentDescriptor::new(
                "errors",
                InstrumentKind::Counter,
                ValueType::Long,
            ))
            .unwrap();

        requests.record_long(attributes(), 5);
        errors.record_long(attributes(), 1);

        let collected = registry.collect_all(Utc::now());
        assert_eq!(collected.len(), 2);
    }

    #[test]
    fn test_observable_callback_runs_at_collection() {
        let registry = MeterRegistry::new(ReaderConfig::default());
        registry
            .register_observable(
                InstrumentDescriptor::new(
                    "memory.used",
                    InstrumentKind::ObservableGauge,
                    ValueType::Long,
                ),
                |observer| observer.observe(AttributeSet::empty(), 4096i64),
            )
            .unwrap();

        let collected = registry.collect_all(Utc::now());
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].points.len(), 1);
    }

    #[test]
    fn test_disable_all_stops_recording() {
        let registry = MeterRegistry::new(ReaderConfig::delta());
        let storage = registry
            .register_instrument(InstrumentDescriptor::new(
                "requests",
                InstrumentKind::Counter,
                ValueType::Long,
            ))
            .unwrap();

        registry.disable_all();
        storage.record_long(attributes(), 3);
        assert!(registry.collect_all(Utc::now()).is_empty());
    }
}
