//! Resilient request execution against the Huefy API.
//!
//! - `client` - the request executor and its retry loop
//! - `classify` - HTTP status and body to [`HuefyError`](crate::error::HuefyError)
//! - `decode` - response body to JSON
//! - `retry` - backoff policy and the sleep seam

mod classify;
mod client;
mod decode;
mod retry;

pub use classify::{DEFAULT_RETRY_AFTER_SECS, classify_status, classify_transport};
pub use client::{ClientOptions, HttpClient, Method, RequestSpec, USER_AGENT};
pub use decode::decode_body;
pub use retry::{
    BASE_DELAY_MS, DEFAULT_RETRY_ATTEMPTS, MAX_DELAY_MS, RetryPolicy, Sleeper, TokioSleeper,
};

#[cfg(test)]
pub use retry::MockSleeper;
