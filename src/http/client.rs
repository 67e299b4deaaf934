//! API client with transparent response caching and retries.
//!
//! A logical request runs through four stages:
//!
//! 1. `check_cache` - GET requests with a fresh cache entry resolve here
//! 2. `dispatch` - one network attempt
//! 3. `dispatch_with_retry` - reissues retryable failures with backoff
//! 4. `write_cache` - successful GET payloads are stored
//!
//! Terminal failures are converted to [`ErrorState`] by [`classify`] before
//! leaving the client.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::error::{classify, report, ErrorState, RawFailure};

use super::response::Fetched;
use super::retry::{RequestAttempt, RetryDecision, RetryPolicy};

/// TTL for requests that don't specify one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
/// Per-call timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Connection settings for the remote API.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  pub endpoint: String,
  pub api_key: String,
  pub timeout: Duration,
}

/// A request to send through the client.
#[derive(Debug, Clone)]
pub struct ApiRequest {
  method: Method,
  path: String,
  params: BTreeMap<String, String>,
  body: Option<Value>,
  ttl: Option<Duration>,
  timeout: Option<Duration>,
}

impl ApiRequest {
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      params: BTreeMap::new(),
      body: None,
      ttl: None,
      timeout: None,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::GET, path)
  }

  pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
    self.params.insert(name.into(), value.to_string());
    self
  }

  /// How long a cached response to this request stays valid.
  pub fn ttl(mut self, ttl: Duration) -> Self {
    self.ttl = Some(ttl);
    self
  }

  /// Override the client-wide per-call timeout.
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// Only GET requests go through the cache.
  pub fn is_cacheable(&self) -> bool {
    self.method == Method::GET
  }

  pub fn cache_key(&self) -> CacheKey {
    CacheKey::new(&self.method, &self.path, &self.params)
  }

  fn url(&self, base: &Url) -> std::result::Result<Url, RawFailure> {
    let joined = format!("{}{}", base.as_str().trim_end_matches('/'), self.path);
    let url = if self.params.is_empty() {
      Url::parse(&joined)
    } else {
      Url::parse_with_params(&joined, &self.params)
    };
    url.map_err(|e| RawFailure::Other(format!("Invalid URL {}: {}", joined, e)))
  }
}

/// HTTP client for the statistics API.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  cache: CacheStore,
  retry: RetryPolicy,
  default_ttl: Duration,
}

impl ApiClient {
  pub fn new(settings: &ApiSettings, retry: RetryPolicy, cache: CacheStore) -> Result<Self> {
    let base_url = Url::parse(&settings.endpoint)
      .map_err(|e| eyre!("Invalid API endpoint {}: {}", settings.endpoint, e))?;

    let mut api_key = HeaderValue::from_str(&settings.api_key)
      .map_err(|e| eyre!("API key is not a valid header value: {}", e))?;
    api_key.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(API_KEY_HEADER, api_key);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(settings.timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      cache,
      retry,
      default_ttl: DEFAULT_TTL,
    })
  }

  /// TTL for requests that don't set their own.
  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }

  /// Send a request, serving GETs from the cache when possible.
  pub async fn execute(&self, request: &ApiRequest) -> std::result::Result<Fetched<Value>, ErrorState> {
    let started = Instant::now();
    let key = request.is_cacheable().then(|| request.cache_key());

    if let Some(key) = &key {
      let ttl = request.ttl.unwrap_or(self.default_ttl);
      if let Some(entry) = self.check_cache(key, ttl) {
        let cached_at = entry.cached_at();
        return Ok(Fetched::from_cache(entry.data, cached_at, started.elapsed()));
      }
    }

    let data = match self.dispatch_with_retry(request).await {
      Ok(data) => data,
      Err(failure) => {
        let state = classify(failure);
        report(&state);
        return Err(state);
      }
    };

    if let Some(key) = &key {
      self.write_cache(key, &data);
    }

    Ok(Fetched::from_api(data, started.elapsed()))
  }

  /// Drop the cached response for `request`, if any.
  pub fn invalidate(&self, request: &ApiRequest) {
    if request.is_cacheable() {
      self.cache.remove(&request.cache_key());
    }
  }

  /// Remove every cached response. Returns how many were removed.
  pub fn clear_cache(&self) -> usize {
    self.cache.clear()
  }

  fn check_cache(&self, key: &CacheKey, ttl: Duration) -> Option<CacheEntry> {
    match self.cache.get(key) {
      Some(entry) if entry.is_fresh(ttl) => {
        debug!(key = %key, request = key.description(), "Cache hit");
        Some(entry)
      }
      Some(_) => {
        debug!(key = %key, "Cache entry expired");
        None
      }
      None => {
        debug!(key = %key, "Cache miss");
        None
      }
    }
  }

  fn write_cache(&self, key: &CacheKey, data: &Value) {
    self.cache.set(key, data);
  }

  async fn dispatch_with_retry(&self, request: &ApiRequest) -> std::result::Result<Value, RawFailure> {
    let mut attempt = RequestAttempt::default();

    loop {
      let failure = match self.dispatch(request).await {
        Ok(data) => return Ok(data),
        Err(failure) => failure,
      };

      match self.retry.decide(attempt, failure.status()) {
        RetryDecision::Retry { delay } => {
          warn!(
            path = %request.path,
            retry = attempt.retry_count + 1,
            delay_ms = delay.as_millis() as u64,
            "Request failed ({}), retrying",
            failure
          );
          tokio::time::sleep(delay).await;
          attempt = attempt.next();
        }
        RetryDecision::GiveUp => return Err(failure),
      }
    }
  }

  async fn dispatch(&self, request: &ApiRequest) -> std::result::Result<Value, RawFailure> {
    let url = request.url(&self.base_url)?;
    debug!(method = %request.method, %url, "Dispatching request");

    let mut builder = self.http.request(request.method.clone(), url);
    if let Some(timeout) = request.timeout {
      builder = builder.timeout(timeout);
    }
    if let Some(body) = &request.body {
      let bytes = serde_json::to_vec(body)
        .map_err(|e| RawFailure::Other(format!("Failed to serialize body: {}", e)))?;
      builder = builder.body(bytes);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| RawFailure::from_reqwest(&e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(RawFailure::Status(status.as_u16()));
    }

    let bytes = response
      .bytes()
      .await
      .map_err(|e| RawFailure::from_reqwest(&e))?;

    let body: Value =
      serde_json::from_slice(&bytes).map_err(|e| RawFailure::Schema(e.to_string()))?;

    match embedded_status(&body) {
      Some(code) => Err(RawFailure::Status(code)),
      None => Ok(body),
    }
  }
}

/// The API reports some errors with a 200 response whose body carries the
/// real status, either as `{"statusCode": "403", ...}` or as a bare `"404"`.
fn embedded_status(body: &Value) -> Option<u16> {
  let code = match body {
    Value::Object(map) => map.get("statusCode")?,
    Value::String(_) => body,
    _ => return None,
  };

  let parsed = match code {
    Value::Number(n) => n.as_u64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }?;

  u16::try_from(parsed).ok().filter(|c| *c >= 400)
}
