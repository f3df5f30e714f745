//! Shipment tracking provider abstraction.
//!
//! This module provides a `TrackingProvider` trait for looking up the current
//! carrier status of a tracking code, plus an HTTP implementation with
//! client-side rate limiting.

mod http;
mod rate_limiter;
mod types;

pub use http::HttpTrackingProvider;
pub use rate_limiter::{RateLimitStatus, RateLimiter, TokenBucket};
pub use types::*;
