//! Typed fetchers for the prefecture and population endpoints.

use futures::future::join_all;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::error::{aggregate, classify, report, ErrorState, RawFailure};
use crate::http::{ApiClient, ApiRequest, Fetched};

use super::api_types::{decode, validate_prefectures, ApiPopulation, ApiPrefecture, ApiResponse};
use super::types::{PrefCode, Prefecture, PrefecturePopulation};

pub const PREFECTURES_PATH: &str = "/api/v1/prefectures";
pub const POPULATION_PATH: &str = "/api/v1/population/composition/perYear";

pub const PREFECTURE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const POPULATION_TTL: Duration = Duration::from_secs(60 * 60);
pub const LONG_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Per-endpoint cache and timeout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
  pub prefecture_ttl: Duration,
  pub population_ttl: Duration,
  pub population_timeout: Duration,
}

impl Default for FetchOptions {
  fn default() -> Self {
    Self {
      prefecture_ttl: PREFECTURE_TTL,
      population_ttl: POPULATION_TTL,
      population_timeout: LONG_TIMEOUT,
    }
  }
}

/// Population statistics API.
#[derive(Clone)]
pub struct PopulationApi {
  client: ApiClient,
  options: FetchOptions,
}

impl PopulationApi {
  pub fn new(client: ApiClient) -> Self {
    Self {
      client,
      options: FetchOptions::default(),
    }
  }

  pub fn with_options(mut self, options: FetchOptions) -> Self {
    self.options = options;
    self
  }

  /// Fetch the list of prefectures.
  pub async fn fetch_prefectures(&self) -> Result<Fetched<Vec<Prefecture>>, ErrorState> {
    let request = ApiRequest::get(PREFECTURES_PATH).ttl(self.options.prefecture_ttl);
    let fetched = self.client.execute(&request).await?;

    self.validated(&request, fetched, |raw| {
      let envelope: ApiResponse<Vec<ApiPrefecture>> = decode(raw)?;
      validate_prefectures(envelope.into_result()?)
    })
  }

  /// Fetch the population composition of one prefecture.
  ///
  /// Codes outside `1..=47` fail with `INVALID_DATA_FORMAT` before any
  /// request is made.
  pub async fn fetch_population_composition(
    &self,
    pref_code: i64,
  ) -> Result<Fetched<PrefecturePopulation>, ErrorState> {
    let code = checked_code(pref_code)?;
    self.fetch_population_for(code).await
  }

  /// Fetch several prefectures concurrently.
  ///
  /// Results keep the order of `codes`. If any code is invalid or any
  /// request fails, the failures are aggregated into a single error.
  pub async fn fetch_population_compositions(
    &self,
    codes: &[i64],
  ) -> Result<Vec<(PrefCode, Fetched<PrefecturePopulation>)>, ErrorState> {
    let results = join_all(
      codes
        .iter()
        .map(|&code| self.fetch_population_composition(code)),
    )
    .await;

    let mut fetched = Vec::with_capacity(codes.len());
    let mut errors = Vec::new();
    for (&code, result) in codes.iter().zip(results) {
      match result.and_then(|population| Ok((checked_code(code)?, population))) {
        Ok(pair) => fetched.push(pair),
        Err(e) => errors.push(e),
      }
    }

    if errors.is_empty() {
      Ok(fetched)
    } else {
      Err(aggregate(errors))
    }
  }

  /// Remove every cached response.
  pub fn clear_cache(&self) -> usize {
    self.client.clear_cache()
  }

  async fn fetch_population_for(
    &self,
    code: PrefCode,
  ) -> Result<Fetched<PrefecturePopulation>, ErrorState> {
    let request = ApiRequest::get(POPULATION_PATH)
      .param("prefCode", code)
      .param("cityCode", "-")
      .ttl(self.options.population_ttl)
      .timeout(self.options.population_timeout);
    let fetched = self.client.execute(&request).await?;

    self.validated(&request, fetched, |raw| {
      let envelope: ApiResponse<ApiPopulation> = decode(raw)?;
      envelope.into_result()?.validate()
    })
  }

  /// Validate a payload; a payload that fails is evicted from the cache.
  fn validated<T>(
    &self,
    request: &ApiRequest,
    mut fetched: Fetched<Value>,
    validate: impl FnOnce(Value) -> Result<T, RawFailure>,
  ) -> Result<Fetched<T>, ErrorState> {
    let raw = std::mem::take(&mut fetched.data);
    match validate(raw) {
      Ok(data) => Ok(fetched.with_data(data)),
      Err(failure) => {
        warn!(source = %fetched.source, "Rejecting response: {}", failure);
        self.client.invalidate(request);
        let state = classify(failure);
        report(&state);
        Err(state)
      }
    }
  }
}

fn checked_code(code: i64) -> Result<PrefCode, ErrorState> {
  PrefCode::try_from(code).map_err(|msg| classify(RawFailure::Schema(msg)))
}
