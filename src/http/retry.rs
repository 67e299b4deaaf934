//! Retry decisions with exponential backoff.
//!
//! Only failures carrying a retryable HTTP status are retried. A failure
//! with no response at all (connection refused, DNS, per-call timeout) is
//! surfaced immediately: retrying into a network that is down only delays
//! the error.

use std::time::Duration;

pub const MAX_RETRIES: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_millis(1000);
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry state of one logical request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestAttempt {
  pub retry_count: u32,
}

impl RequestAttempt {
  pub fn next(self) -> Self {
    Self {
      retry_count: self.retry_count + 1,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
  /// Wait `delay`, then reissue the request.
  Retry { delay: Duration },
  /// Surface the failure as is.
  GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  max_retries: u32,
  base_delay: Duration,
  status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::new(MAX_RETRIES, BASE_DELAY)
  }
}

impl RetryPolicy {
  pub fn new(max_retries: u32, base_delay: Duration) -> Self {
    Self {
      max_retries,
      base_delay,
      status_codes: RETRYABLE_STATUS_CODES.to_vec(),
    }
  }

  pub fn with_status_codes(mut self, status_codes: Vec<u16>) -> Self {
    self.status_codes = status_codes;
    self
  }

  pub fn is_retryable_status(&self, status: u16) -> bool {
    self.status_codes.contains(&status)
  }

  /// Delay before the retry that follows `retry_count` earlier retries.
  pub fn backoff(&self, retry_count: u32) -> Duration {
    self
      .base_delay
      .saturating_mul(2u32.saturating_pow(retry_count))
  }

  /// Decide what to do after a failed attempt. `status` is `None` when no
  /// response was received.
  pub fn decide(&self, attempt: RequestAttempt, status: Option<u16>) -> RetryDecision {
    match status {
      Some(code) if attempt.retry_count < self.max_retries && self.is_retryable_status(code) => {
        RetryDecision::Retry {
          delay: self.backoff(attempt.retry_count),
        }
      }
      _ => RetryDecision::GiveUp,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn attempt(retry_count: u32) -> RequestAttempt {
    RequestAttempt { retry_count }
  }

  #[test]
  fn test_backoff_doubles() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff(0), Duration::from_millis(1000));
    assert_eq!(policy.backoff(1), Duration::from_millis(2000));
    assert_eq!(policy.backoff(2), Duration::from_millis(4000));
  }

  #[test]
  fn test_retryable_statuses_retry_until_cap() {
    let policy = RetryPolicy::default();
    for status in RETRYABLE_STATUS_CODES {
      for n in 0..MAX_RETRIES {
        assert_eq!(
          policy.decide(attempt(n), Some(status)),
          RetryDecision::Retry {
            delay: policy.backoff(n)
          }
        );
      }
      assert_eq!(
        policy.decide(attempt(MAX_RETRIES), Some(status)),
        RetryDecision::GiveUp
      );
    }
  }

  #[test]
  fn test_non_retryable_status_short_circuits() {
    let policy = RetryPolicy::default();
    for status in [400, 401, 403, 404, 418] {
      assert_eq!(policy.decide(attempt(0), Some(status)), RetryDecision::GiveUp);
    }
  }

  #[test]
  fn test_network_failure_is_not_retried() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.decide(attempt(0), None), RetryDecision::GiveUp);
  }

  #[test]
  fn test_custom_status_codes() {
    let policy = RetryPolicy::new(1, Duration::from_millis(10)).with_status_codes(vec![599]);
    assert!(policy.is_retryable_status(599));
    assert!(!policy.is_retryable_status(503));
    assert_eq!(
      policy.decide(attempt(0), Some(599)),
      RetryDecision::Retry {
        delay: Duration::from_millis(10)
      }
    );
    assert_eq!(policy.decide(attempt(1), Some(599)), RetryDecision::GiveUp);
  }

  #[test]
  fn test_attempt_counter() {
    let a = RequestAttempt::default();
    assert_eq!(a.retry_count, 0);
    assert_eq!(a.next().next().retry_count, 2);
  }
}
