use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefecture code, always within `1..=47`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct PrefCode(u8);

impl PrefCode {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 47;

  pub fn new(code: i64) -> Option<Self> {
    u8::try_from(code)
      .ok()
      .filter(|c| (Self::MIN..=Self::MAX).contains(c))
      .map(Self)
  }

  pub fn get(self) -> u8 {
    self.0
  }

  /// Every valid code in ascending order.
  pub fn all() -> impl Iterator<Item = PrefCode> {
    (Self::MIN..=Self::MAX).map(Self)
  }
}

impl TryFrom<i64> for PrefCode {
  type Error = String;

  fn try_from(code: i64) -> Result<Self, Self::Error> {
    Self::new(code).ok_or_else(|| {
      format!(
        "prefecture code {} is outside {}..={}",
        code,
        Self::MIN,
        Self::MAX
      )
    })
  }
}

impl From<PrefCode> for u8 {
  fn from(code: PrefCode) -> Self {
    code.0
  }
}

impl fmt::Display for PrefCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

/// A prefecture as listed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefecture {
  pub code: PrefCode,
  pub name: String,
}

/// Population for one year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationPoint {
  pub year: i32,
  pub value: u64,
}

/// A labelled population series (total, young, working-age, elderly)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationSeries {
  pub label: String,
  pub data: Vec<PopulationPoint>,
}

/// Population composition of one prefecture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefecturePopulation {
  /// Last year of recorded data; later years are projections
  pub boundary_year: i32,
  pub data: Vec<PopulationSeries>,
}

impl PrefecturePopulation {
  pub fn series(&self, label: &str) -> Option<&PopulationSeries> {
    self.data.iter().find(|s| s.label == label)
  }
}
