pub mod accumulation;
pub mod aggregator;
pub mod cell;
pub mod data;
pub mod exemplar;
pub mod handle;
pub mod storage;

pub use accumulation::Accumulation;
pub use aggregator::Aggregation;
pub use cell::AggregationCell;
pub use data::{MetricData, MetricPoint};
pub use exemplar::{Exemplar, ExemplarReservoir};
pub use handle::AggregatorHandle;
pub use storage::MetricStorage;
