//! Error taxonomy for the API layer.
//!
//! Every failure the client can run into (an HTTP status, a transport error,
//! a payload that does not match the expected shape) is first captured as a
//! [`RawFailure`] and then converted by [`classify`] into an [`ErrorState`].
//! Callers above the client only ever see `ErrorState`.

use std::fmt;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

/// Closed set of error kinds surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
  BadRequest,
  Unauthorized,
  NotFound,
  Timeout,
  ServerError,
  NetworkError,
  InvalidDataFormat,
  Unknown,
}

impl ErrorKind {
  /// User-facing message for this kind.
  pub fn message(self) -> &'static str {
    match self {
      Self::BadRequest => "リクエストが不正です",
      Self::Unauthorized => "APIキーが無効です",
      Self::NotFound => "リソースが見つかりません",
      Self::Timeout => "リクエストがタイムアウトしました",
      Self::ServerError => "サーバーエラーが発生しました",
      Self::NetworkError => "ネットワークエラーが発生しました",
      Self::InvalidDataFormat => "データ形式が不正です",
      Self::Unknown => "予期せぬエラーが発生しました",
    }
  }

  /// Stable machine-readable code.
  pub fn code(self) -> &'static str {
    match self {
      Self::BadRequest => "BAD_REQUEST",
      Self::Unauthorized => "UNAUTHORIZED",
      Self::NotFound => "NOT_FOUND",
      Self::Timeout => "TIMEOUT",
      Self::ServerError => "SERVER_ERROR",
      Self::NetworkError => "NETWORK_ERROR",
      Self::InvalidDataFormat => "INVALID_DATA_FORMAT",
      Self::Unknown => "UNKNOWN",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

/// A failure as observed on the wire, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
  /// The server answered with a non-success status.
  Status(u16),
  /// No response was received (connection refused, reset, DNS, ...).
  Network(String),
  /// The per-call timeout elapsed before a response arrived.
  Timeout(String),
  /// The response did not match the expected shape.
  Schema(String),
  /// Anything that fits none of the above.
  Other(String),
}

impl RawFailure {
  /// HTTP status code, if the failure carries one.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status(code) => Some(*code),
      _ => None,
    }
  }

  /// Map a reqwest error onto a raw failure.
  pub fn from_reqwest(err: &reqwest::Error) -> Self {
    if let Some(status) = err.status() {
      Self::Status(status.as_u16())
    } else if err.is_timeout() {
      Self::Timeout(err.to_string())
    } else if err.is_builder() || err.is_redirect() {
      Self::Other(err.to_string())
    } else if err.is_decode() {
      Self::Schema(err.to_string())
    } else {
      Self::Network(err.to_string())
    }
  }
}

impl fmt::Display for RawFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Status(code) => write!(f, "HTTP status {}", code),
      Self::Network(msg) => write!(f, "network failure: {}", msg),
      Self::Timeout(msg) => write!(f, "timed out: {}", msg),
      Self::Schema(msg) => write!(f, "unexpected response shape: {}", msg),
      Self::Other(msg) => f.write_str(msg),
    }
  }
}

/// Extra context attached to an [`ErrorState`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetails {
  /// Description of the underlying cause
  Text(String),
  /// The individual failures behind an aggregated error
  Errors(Vec<ErrorState>),
}

/// A classified failure, ready to be shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{message}")]
pub struct ErrorState {
  pub kind: ErrorKind,
  pub message: String,
  /// Milliseconds since the Unix epoch
  pub timestamp: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<ErrorDetails>,
}

impl ErrorState {
  pub fn new(kind: ErrorKind) -> Self {
    Self {
      kind,
      message: kind.message().to_string(),
      timestamp: Utc::now().timestamp_millis(),
      details: None,
    }
  }

  pub fn with_details(kind: ErrorKind, details: ErrorDetails) -> Self {
    Self {
      details: Some(details),
      ..Self::new(kind)
    }
  }

  /// Critical errors get a blocking banner instead of a dismissible one.
  pub fn is_critical(&self) -> bool {
    matches!(self.kind, ErrorKind::NetworkError)
  }

  /// Whether offering the user a retry makes sense.
  pub fn is_recoverable(&self) -> bool {
    !matches!(self.kind, ErrorKind::InvalidDataFormat)
  }

  /// Message for display. Textual details are appended for non-critical kinds.
  pub fn display_message(&self) -> String {
    match &self.details {
      Some(ErrorDetails::Text(text)) if !self.is_critical() && !text.is_empty() => {
        format!("{}: {}", self.message, text)
      }
      _ => self.message.clone(),
    }
  }
}

/// Convert a raw failure into its error state.
pub fn classify(raw: RawFailure) -> ErrorState {
  let kind = match &raw {
    RawFailure::Status(400) => ErrorKind::BadRequest,
    RawFailure::Status(401 | 403) => ErrorKind::Unauthorized,
    RawFailure::Status(404) => ErrorKind::NotFound,
    RawFailure::Status(408) => ErrorKind::Timeout,
    RawFailure::Status(429 | 500 | 502 | 503 | 504) => ErrorKind::ServerError,
    RawFailure::Status(_) => ErrorKind::Unknown,
    RawFailure::Network(_) => ErrorKind::NetworkError,
    RawFailure::Timeout(_) => ErrorKind::Timeout,
    RawFailure::Schema(_) => ErrorKind::InvalidDataFormat,
    RawFailure::Other(_) => ErrorKind::Unknown,
  };

  ErrorState::with_details(kind, ErrorDetails::Text(raw.to_string()))
}

/// Collapse the failures of several independent requests into one.
pub fn aggregate(mut errors: Vec<ErrorState>) -> ErrorState {
  match errors.len() {
    0 => ErrorState::new(ErrorKind::Unknown),
    1 => errors.remove(0),
    n => ErrorState {
      message: format!("{}件のエラーが発生しました", n),
      details: Some(ErrorDetails::Errors(errors)),
      ..ErrorState::new(ErrorKind::Unknown)
    },
  }
}

/// Log an error state at a level matching its severity.
pub fn report(state: &ErrorState) {
  if state.is_critical() {
    error!(kind = %state.kind, details = ?state.details, "{}", state.message);
  } else {
    debug!(kind = %state.kind, details = ?state.details, "{}", state.message);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_failure_maps_to_one_kind() {
    let cases = [
      (RawFailure::Status(400), ErrorKind::BadRequest),
      (RawFailure::Status(401), ErrorKind::Unauthorized),
      (RawFailure::Status(403), ErrorKind::Unauthorized),
      (RawFailure::Status(404), ErrorKind::NotFound),
      (RawFailure::Status(408), ErrorKind::Timeout),
      (RawFailure::Status(429), ErrorKind::ServerError),
      (RawFailure::Status(500), ErrorKind::ServerError),
      (RawFailure::Status(502), ErrorKind::ServerError),
      (RawFailure::Status(503), ErrorKind::ServerError),
      (RawFailure::Status(504), ErrorKind::ServerError),
      (RawFailure::Network("refused".into()), ErrorKind::NetworkError),
      (RawFailure::Schema("missing field".into()), ErrorKind::InvalidDataFormat),
      (RawFailure::Status(418), ErrorKind::Unknown),
      (RawFailure::Other("boom".into()), ErrorKind::Unknown),
    ];

    for (raw, expected) in cases {
      let state = classify(raw.clone());
      assert_eq!(state.kind, expected, "{:?}", raw);
      assert_eq!(state.message, expected.message());
    }
  }

  #[test]
  fn test_classify_keeps_cause_in_details() {
    let state = classify(RawFailure::Status(503));
    assert_eq!(
      state.details,
      Some(ErrorDetails::Text("HTTP status 503".to_string()))
    );
  }

  #[test]
  fn test_critical_and_recoverable() {
    let network = ErrorState::new(ErrorKind::NetworkError);
    assert!(network.is_critical());
    assert!(network.is_recoverable());

    let invalid = ErrorState::new(ErrorKind::InvalidDataFormat);
    assert!(!invalid.is_critical());
    assert!(!invalid.is_recoverable());

    let server = ErrorState::new(ErrorKind::ServerError);
    assert!(!server.is_critical());
    assert!(server.is_recoverable());
  }

  #[test]
  fn test_display_message_hides_details_for_critical() {
    let network = ErrorState::with_details(
      ErrorKind::NetworkError,
      ErrorDetails::Text("connection refused".into()),
    );
    assert_eq!(network.display_message(), ErrorKind::NetworkError.message());

    let not_found =
      ErrorState::with_details(ErrorKind::NotFound, ErrorDetails::Text("HTTP status 404".into()));
    assert_eq!(
      not_found.display_message(),
      format!("{}: HTTP status 404", ErrorKind::NotFound.message())
    );
  }

  #[test]
  fn test_aggregate_empty_is_unknown() {
    let state = aggregate(Vec::new());
    assert_eq!(state.kind, ErrorKind::Unknown);
    assert!(state.details.is_none());
  }

  #[test]
  fn test_aggregate_single_passes_through() {
    let single = ErrorState::new(ErrorKind::NotFound);
    assert_eq!(aggregate(vec![single.clone()]), single);
  }

  #[test]
  fn test_aggregate_many_reports_count() {
    let errors = vec![
      ErrorState::new(ErrorKind::NetworkError),
      ErrorState::new(ErrorKind::ServerError),
    ];
    let state = aggregate(errors.clone());

    assert_eq!(state.kind, ErrorKind::Unknown);
    assert!(state.message.contains("2件"));
    assert_eq!(state.details, Some(ErrorDetails::Errors(errors)));
  }

  #[test]
  fn test_error_state_serializes_kind_as_code() {
    let json = serde_json::to_value(ErrorState::new(ErrorKind::ServerError)).unwrap();
    assert_eq!(json["kind"], "SERVER_ERROR");
    assert!(json.get("details").is_none());
  }
}
