pub mod logging;
pub mod memory;
pub mod multi;

pub use logging::LoggingExporter;
pub use memory::InMemoryExporter;
pub use multi::MultiExporter;
