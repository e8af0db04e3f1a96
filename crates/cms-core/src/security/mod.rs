pub mod model;
pub mod service;
pub mod stats;

pub use model::{event_types, NewSecurityEvent, SecurityEventFilter, Severity};
pub use service::SecurityEventService;
pub use stats::{aggregate_security, assess_threat, SecurityStats, ThreatAssessment, ThreatLevel};
