pub mod audit_logs;
pub mod security_events;
pub mod users;

pub mod prelude {
    pub use super::audit_logs::Entity as AuditLogs;
    pub use super::security_events::Entity as SecurityEvents;
    pub use super::users::Entity as Users;
}
