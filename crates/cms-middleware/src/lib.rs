pub mod auth;
pub mod ratelimit;
pub mod session;

pub use auth::{
    authenticated, authorize, require_permissions, with_authorization, AccessDecision, Action,
    AuditSink, AuthError, AuthState, AuthUser, ClientInfo, ClientIpPolicy, Permission, Role, Scope,
    SessionTokens,
};
pub use ratelimit::{RateLimitStrategy, RateLimitSubject, RateLimiter, TokenBucket};
pub use session::{
    extract_token, MemorySessionStore, SessionData, SessionManager, SessionResolver, SessionStore,
    TokenSessionResolver,
};

#[cfg(feature = "redis-session")]
pub use session::RedisSessionStore;
