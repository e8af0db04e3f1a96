pub mod collector;

pub use collector::{global, MetricsCollector};
