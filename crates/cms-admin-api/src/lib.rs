pub mod audit_sink;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;

pub use error::{ApiError, FieldError, Result};
pub use routes::create_router;
pub use state::AppState;
