//! Rate limiting logic and state management.

mod bucket;
mod limiter;
mod rules;
pub mod sweeper;

pub use limiter::{Decision, RateLimiter};
pub use rules::{RateLimitRule, RuleSet};
