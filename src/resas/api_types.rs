//! Serde-deserializable types matching the API responses.
//!
//! These types are separate from domain types: they accept whatever shape
//! the wire carries so that validation can report exactly what is wrong,
//! and only validated data is converted into domain types.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::RawFailure;

use super::types::{PopulationPoint, PopulationSeries, PrefCode, Prefecture, PrefecturePopulation};

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
  pub message: Option<String>,
  pub result: Option<T>,
}

impl<T> ApiResponse<T> {
  /// The payload. A missing or null `result` is a schema failure carrying
  /// whatever message the server sent along.
  pub fn into_result(self) -> Result<T, RawFailure> {
    self.result.ok_or_else(|| match self.message {
      Some(message) => schema(format!("response has no result: {}", message)),
      None => schema("response has no result".to_string()),
    })
  }
}

/// Deserialize a JSON payload, reporting mismatches as schema failures.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RawFailure> {
  serde_json::from_value(value).map_err(|e| RawFailure::Schema(e.to_string()))
}

fn schema(msg: String) -> RawFailure {
  RawFailure::Schema(msg)
}

// ============================================================================
// Prefectures
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPrefecture {
  pub pref_code: i64,
  pub pref_name: String,
}

impl ApiPrefecture {
  fn validate(self) -> Result<Prefecture, RawFailure> {
    let code = PrefCode::try_from(self.pref_code).map_err(schema)?;
    if self.pref_name.trim().is_empty() {
      return Err(schema(format!("prefecture {} has an empty name", code)));
    }
    Ok(Prefecture {
      code,
      name: self.pref_name,
    })
  }
}

/// Validate a prefecture list: codes in range, names non-empty, no duplicates.
pub fn validate_prefectures(raw: Vec<ApiPrefecture>) -> Result<Vec<Prefecture>, RawFailure> {
  if raw.is_empty() {
    return Err(schema("prefecture list is empty".to_string()));
  }

  let mut seen = HashSet::new();
  raw
    .into_iter()
    .map(|p| {
      let prefecture = p.validate()?;
      if !seen.insert(prefecture.code) {
        return Err(schema(format!(
          "prefecture code {} appears more than once",
          prefecture.code
        )));
      }
      Ok(prefecture)
    })
    .collect()
}

// ============================================================================
// Population composition
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPopulationPoint {
  pub year: i64,
  pub value: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApiPopulationSeries {
  pub label: String,
  pub data: Vec<ApiPopulationPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPopulation {
  pub boundary_year: i64,
  pub data: Vec<ApiPopulationSeries>,
}

fn to_year(year: i64) -> Result<i32, RawFailure> {
  i32::try_from(year).map_err(|_| schema(format!("year {} is out of range", year)))
}

impl ApiPopulationPoint {
  fn validate(self, label: &str) -> Result<PopulationPoint, RawFailure> {
    let year = to_year(self.year)?;
    let value = u64::try_from(self.value).map_err(|_| {
      schema(format!(
        "{} has a negative population ({}) in {}",
        label, self.value, year
      ))
    })?;
    Ok(PopulationPoint { year, value })
  }
}

impl ApiPopulation {
  pub fn validate(self) -> Result<PrefecturePopulation, RawFailure> {
    let boundary_year = to_year(self.boundary_year)?;
    let data = self
      .data
      .into_iter()
      .map(|series| {
        let points = series
          .data
          .into_iter()
          .map(|p| p.validate(&series.label))
          .collect::<Result<Vec<_>, _>>()?;
        Ok(PopulationSeries {
          label: series.label,
          data: points,
        })
      })
      .collect::<Result<Vec<_>, RawFailure>>()?;

    Ok(PrefecturePopulation {
      boundary_year,
      data,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn prefectures(value: Value) -> Result<Vec<Prefecture>, RawFailure> {
    let envelope: ApiResponse<Vec<ApiPrefecture>> = decode(value)?;
    validate_prefectures(envelope.into_result()?)
  }

  fn population(value: Value) -> Result<PrefecturePopulation, RawFailure> {
    let envelope: ApiResponse<ApiPopulation> = decode(value)?;
    envelope.into_result()?.validate()
  }

  #[test]
  fn test_missing_result_carries_server_message() {
    let err = prefectures(json!({"message": "Forbidden.", "result": null})).unwrap_err();
    assert_eq!(
      err,
      RawFailure::Schema("response has no result: Forbidden.".to_string())
    );

    let err = population(json!({"message": null})).unwrap_err();
    assert_eq!(err, RawFailure::Schema("response has no result".to_string()));
  }

  #[test]
  fn test_valid_prefectures() {
    let list = prefectures(json!({
      "message": null,
      "result": [
        {"prefCode": 1, "prefName": "北海道"},
        {"prefCode": 13, "prefName": "東京都"}
      ]
    }))
    .unwrap();

    assert_eq!(list.len(), 2);
    assert_eq!(list[1].code.get(), 13);
    assert_eq!(list[1].name, "東京都");
  }

  #[test]
  fn test_prefecture_shape_errors() {
    let cases = [
      json!({"message": null, "result": [{"prefCode": 48, "prefName": "x"}]}),
      json!({"message": null, "result": [{"prefCode": 0, "prefName": "x"}]}),
      json!({"message": null, "result": [{"prefCode": 1, "prefName": ""}]}),
      json!({"message": null, "result": [{"prefCode": "1", "prefName": "x"}]}),
      json!({"message": null, "result": [{"prefCode": 1.5, "prefName": "x"}]}),
      json!({"message": null, "result": [{"prefName": "x"}]}),
      json!({"message": null, "result": []}),
      json!({"message": null, "result": [
        {"prefCode": 1, "prefName": "a"},
        {"prefCode": 1, "prefName": "b"}
      ]}),
      json!({"result": {"prefCode": 1}}),
      json!([]),
    ];

    for case in cases {
      assert!(
        matches!(prefectures(case.clone()), Err(RawFailure::Schema(_))),
        "{}",
        case
      );
    }
  }

  #[test]
  fn test_valid_population() {
    let pop = population(json!({
      "message": null,
      "result": {
        "boundaryYear": 2020,
        "data": [
          {"label": "総人口", "data": [
            {"year": 1980, "value": 11618281},
            {"year": 2045, "value": 13607348}
          ]},
          {"label": "年少人口", "data": [
            {"year": 1980, "value": 2507260, "rate": 21.58}
          ]}
        ]
      }
    }))
    .unwrap();

    assert_eq!(pop.boundary_year, 2020);
    assert_eq!(pop.data.len(), 2);
    assert_eq!(pop.series("総人口").unwrap().data[1].value, 13607348);
  }

  #[test]
  fn test_population_shape_errors() {
    let cases = [
      json!({"message": null, "result": {"boundaryYear": "2020", "data": []}}),
      json!({"message": null, "result": {"boundaryYear": 2020}}),
      json!({"message": null, "result": {"boundaryYear": 2020, "data": [
        {"label": "総人口", "data": [{"year": 1980, "value": -1}]}
      ]}}),
      json!({"message": null, "result": {"boundaryYear": 2020, "data": [
        {"label": "総人口", "data": [{"year": 1980, "value": 10.5}]}
      ]}}),
      json!({"message": null, "result": {"boundaryYear": 2020, "data": [
        {"label": 3, "data": []}
      ]}}),
    ];

    for case in cases {
      assert!(
        matches!(population(case.clone()), Err(RawFailure::Schema(_))),
        "{}",
        case
      );
    }
  }
}
