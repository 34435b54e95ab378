pub mod config;
pub mod exporter;
pub mod exporters;
pub mod processor;

pub use config::BatchConfig;
pub use exporter::{ExportResult, Exporter};
pub use exporters::{InMemoryExporter, LoggingExporter, MultiExporter};
pub use processor::BatchProcessor;
