pub mod data;
pub mod manager;
pub mod resolver;
pub mod store;

pub use data::SessionData;
pub use manager::SessionManager;
pub use resolver::{extract_token, SessionResolver, TokenSessionResolver};
pub use store::{MemorySessionStore, SessionStore};

#[cfg(feature = "redis-session")]
pub use store::RedisSessionStore;
