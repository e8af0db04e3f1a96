pub mod audit;
pub mod entity;
pub mod error;
pub mod pagination;
pub mod schema;
pub mod security;
pub mod stats;
pub mod users;

pub use audit::{AuditLogFilter, AuditLogService, AuditOutcome, AuditStats, NewAuditEntry};
pub use error::{CmsError, Result};
pub use pagination::Page;
pub use schema::init_schema;
pub use security::{
    NewSecurityEvent, SecurityEventFilter, SecurityEventService, SecurityStats, Severity,
    ThreatAssessment, ThreatLevel,
};
pub use stats::{CountItem, DailyCount, StatsWindow};
pub use users::{NewUser, UserService};
