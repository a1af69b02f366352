//! Rolling per-principal message quota.

pub mod limiter;
pub mod store;

pub use limiter::{RateLimiter, spawn_sweeper};
pub use store::{DashMapRateStore, RateWindowStore};
