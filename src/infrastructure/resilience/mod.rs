//! Retry and call-spacing helpers shared by every external caller.

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::CallSpacing;
pub use retry::{Retryable, RetryPolicy};
