//! Request throttling and duplicate suppression.
//!
//! The first pipeline stage: classifies and throttles inbound reports
//! before any network or storage work occurs.

mod fingerprint;
mod limiter;

pub use fingerprint::create_fingerprint;
pub use limiter::RateLimiter;
