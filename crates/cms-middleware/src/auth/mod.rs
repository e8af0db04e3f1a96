pub mod error;
pub mod guard;
pub mod middleware;
pub mod rbac;
pub mod token;

pub use error::AuthError;
pub use guard::{authorize, with_authorization, AccessDecision, AuditSink, AuthState, AuthUser, ClientInfo, ClientIpPolicy};
pub use middleware::{authenticated, require_permissions};
pub use rbac::{check_permissions, has_permission, resources, Action, Permission, Role, Scope, UnknownRole};
pub use token::{Claims, SessionTokens};
