pub mod collector;
pub mod config;
pub mod pipeline;
pub mod registry;

pub use collector::PeriodicCollector;
pub use config::{AggregationSpec, ReaderConfig, TemporalityPreference};
pub use pipeline::TelemetryPipeline;
pub use registry::{MeterRegistry, Observer};
