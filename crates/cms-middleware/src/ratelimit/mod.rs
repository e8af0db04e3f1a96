pub mod limiter;
pub mod strategy;
pub mod token_bucket;

pub use limiter::{RateLimitSubject, RateLimiter};
pub use strategy::RateLimitStrategy;
pub use token_bucket::TokenBucket;
