//! HTTP middleware and request extractors

pub mod auth;
pub mod logging;
pub mod rate_limit;

pub use auth::{AuthenticatedAdmin, CurrentUser, RawToken, SchedulerCaller};
pub use rate_limit::{PublicRateLimiter, SlidingWindowLimiter};
