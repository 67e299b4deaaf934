//! Cache keys for API requests.

use reqwest::Method;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Deterministic key for a request, derived from method, url and params.
///
/// Params are taken as a sorted map, so two requests differing only in the
/// order their params were added produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  hash: String,
  description: String,
}

impl CacheKey {
  pub fn new(method: &Method, url: &str, params: &BTreeMap<String, String>) -> Self {
    let query = params
      .iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect::<Vec<_>>()
      .join("&");
    let description = format!("{}:{}:{{{}}}", method.as_str().to_lowercase(), url, query);

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(description.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Self { hash, description }
  }

  pub fn as_str(&self) -> &str {
    &self.hash
  }

  /// Human-readable form, for logs.
  pub fn description(&self) -> &str {
    &self.description
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.description)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn test_param_order_does_not_matter() {
    let a = CacheKey::new(
      &Method::GET,
      "/api/v1/population/composition/perYear",
      &params(&[("prefCode", "13"), ("cityCode", "-")]),
    );
    let b = CacheKey::new(
      &Method::GET,
      "/api/v1/population/composition/perYear",
      &params(&[("cityCode", "-"), ("prefCode", "13")]),
    );
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
  }

  #[test]
  fn test_method_url_and_params_distinguish_keys() {
    let base = CacheKey::new(&Method::GET, "/a", &params(&[("x", "1")]));
    assert_ne!(base, CacheKey::new(&Method::POST, "/a", &params(&[("x", "1")])));
    assert_ne!(base, CacheKey::new(&Method::GET, "/b", &params(&[("x", "1")])));
    assert_ne!(base, CacheKey::new(&Method::GET, "/a", &params(&[("x", "2")])));
  }

  #[test]
  fn test_description() {
    let key = CacheKey::new(&Method::GET, "/api/v1/prefectures", &BTreeMap::new());
    assert_eq!(key.description(), "get:/api/v1/prefectures:{}");
  }
}
