pub mod model;
pub mod service;
pub mod stats;

pub use model::{AuditLogFilter, AuditOutcome, NewAuditEntry};
pub use service::AuditLogService;
pub use stats::{aggregate_audit, AuditStats};
