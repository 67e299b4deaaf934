//! HTTP client pipeline: cache lookup, dispatch, retry, cache write.

mod client;
mod response;
mod retry;

pub use client::{ApiClient, ApiRequest, ApiSettings, DEFAULT_TIMEOUT, DEFAULT_TTL};
pub use response::{Fetched, Source};
pub use retry::{RetryPolicy, BASE_DELAY, MAX_RETRIES, RETRYABLE_STATUS_CODES};
