//! Dashboard REST API client
//!
//! - [`DashboardApi`]: the key-scoped request surface the engine depends on
//! - [`DashboardClient`]: reqwest implementation with a request budget and
//!   bounded retry
//! - [`RequestBudget`]: requests-per-second pacing plus an in-flight cap

pub mod dashboard_client;
pub mod errors;
pub mod rate_limit;
pub mod retry;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use dashboard_client::{DashboardApi, DashboardClient};
pub use errors::ApiError;
pub use rate_limit::RequestBudget;
pub use retry::{retry_with_backoff, RetryConfig};
pub use types::*;
