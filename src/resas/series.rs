//! Summaries over a population series.

use super::types::PopulationPoint;

/// First and last year covered, inclusive.
pub fn year_range(data: &[PopulationPoint]) -> Option<(i32, i32)> {
  let min = data.iter().map(|p| p.year).min()?;
  let max = data.iter().map(|p| p.year).max()?;
  Some((min, max))
}

/// Smallest and largest population.
pub fn value_range(data: &[PopulationPoint]) -> Option<(u64, u64)> {
  let min = data.iter().map(|p| p.value).min()?;
  let max = data.iter().map(|p| p.value).max()?;
  Some((min, max))
}

/// The point with the highest population; the earliest one wins ties.
pub fn peak(data: &[PopulationPoint]) -> Option<PopulationPoint> {
  data
    .iter()
    .copied()
    .reduce(|best, p| if p.value > best.value { p } else { best })
}

pub fn value_at(data: &[PopulationPoint], year: i32) -> Option<u64> {
  data.iter().find(|p| p.year == year).map(|p| p.value)
}

/// Percentage change between two years.
pub fn growth_rate(data: &[PopulationPoint], base_year: i32, target_year: i32) -> Option<f64> {
  let base = value_at(data, base_year)?;
  let target = value_at(data, target_year)?;
  if base == 0 {
    return None;
  }
  Some((target as f64 - base as f64) / base as f64 * 100.0)
}

/// Points from `from_year` on, i.e. the projection past the boundary year.
pub fn projected(data: &[PopulationPoint], from_year: i32) -> Vec<PopulationPoint> {
  data.iter().copied().filter(|p| p.year >= from_year).collect()
}
