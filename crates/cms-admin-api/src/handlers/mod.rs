pub mod audit;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod security;

pub use audit::{audit_stats, get_audit_log, list_audit_logs, my_audit_logs};
pub use auth::{current_session, login, logout};
pub use health::health_check;
pub use metrics::export_metrics;
pub use security::{create_security_event, list_security_events, security_stats};
