pub mod attributes;
pub mod error;
pub mod instrument;
pub mod temporality;
pub mod value;

pub use attributes::{AttributeSet, AttributeValue};
pub use error::{Result, TelemetryError};
pub use instrument::{InstrumentDescriptor, InstrumentKind, ValueType};
pub use temporality::Temporality;
pub use value::MetricValue;
