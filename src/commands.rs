//! Subcommands and their plain-text output.

use clap::Subcommand;
use std::fmt::Write;
use std::time::Duration;

use crate::error::{report, ErrorDetails, ErrorKind, ErrorState};
use crate::http::{Fetched, Source};
use crate::resas::region::{code_by_name, group_by_region, name_by_code, search, sort_by_reading};
use crate::resas::series;
use crate::resas::{PopulationApi, PrefCode, Prefecture, PrefecturePopulation};

/// Label of the total population series.
pub const TOTAL_LABEL: &str = "総人口";

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List prefectures
  Prefectures {
    /// Group the list by region
    #[arg(short, long)]
    region: bool,
    /// Sort by reading instead of by code
    #[arg(short, long)]
    kana: bool,
  },
  /// Summarise the population composition of prefectures
  Population {
    /// Prefecture codes (1-47) or names
    #[arg(required_unless_present = "all")]
    prefectures: Vec<String>,
    /// Fetch every prefecture
    #[arg(long, conflicts_with = "prefectures")]
    all: bool,
    /// Series to summarise
    #[arg(short, long, default_value = TOTAL_LABEL)]
    label: String,
  },
  /// Remove all cached API responses
  ClearCache,
}

/// Run a command, printing its output to stdout.
pub async fn run(command: Command, api: &PopulationApi) -> Result<(), ErrorState> {
  match command {
    Command::Prefectures { region, kana } => {
      let fetched = api.fetch_prefectures().await?;
      println!("{}", render_provenance(&fetched));
      if kana {
        let sorted: Vec<Prefecture> = sort_by_reading(&fetched.data).into_iter().cloned().collect();
        print!("{}", render_prefectures(&sorted, region));
      } else {
        print!("{}", render_prefectures(&fetched.data, region));
      }
    }
    Command::Population {
      prefectures,
      all,
      label,
    } => {
      let names = prefecture_names(api, &prefectures).await?;
      let codes = if all {
        PrefCode::all().map(|c| i64::from(c.get())).collect()
      } else {
        resolve_codes(&prefectures, names.as_deref())?
      };

      let results = api.fetch_population_compositions(&codes).await?;
      for (code, fetched) in &results {
        let name = names
          .as_deref()
          .and_then(|list| name_by_code(list, *code))
          .unwrap_or("?");
        println!("{}", render_provenance(fetched));
        print!("{}", render_population(*code, name, &fetched.data, &label));
      }
    }
    Command::ClearCache => {
      let removed = api.clear_cache();
      println!("Removed {} cached response(s)", removed);
    }
  }

  Ok(())
}

/// Prefecture list for name lookups.
///
/// Required when any argument is a name; otherwise only used for display,
/// and a failure just means codes are shown without names.
async fn prefecture_names(
  api: &PopulationApi,
  args: &[String],
) -> Result<Option<Vec<Prefecture>>, ErrorState> {
  let needs_names = args.iter().any(|a| a.parse::<i64>().is_err());
  match api.fetch_prefectures().await {
    Ok(fetched) => Ok(Some(fetched.data)),
    Err(e) if needs_names => Err(e),
    Err(e) => {
      report(&e);
      Ok(None)
    }
  }
}

/// Turn codes or names into codes. Codes are passed through unchecked.
fn resolve_codes(args: &[String], prefectures: Option<&[Prefecture]>) -> Result<Vec<i64>, ErrorState> {
  args
    .iter()
    .map(|arg| match arg.parse::<i64>() {
      Ok(code) => Ok(code),
      Err(_) => resolve_name(prefectures.unwrap_or_default(), arg).map(|code| i64::from(code.get())),
    })
    .collect()
}

/// An exact name, or a partial name or reading matching one prefecture.
fn resolve_name(prefectures: &[Prefecture], query: &str) -> Result<PrefCode, ErrorState> {
  if let Some(code) = code_by_name(prefectures, query) {
    return Ok(code);
  }

  match search(prefectures, query).as_slice() {
    [only] => Ok(only.code),
    [] => Err(ErrorState::with_details(
      ErrorKind::NotFound,
      ErrorDetails::Text(format!("unknown prefecture {}", query)),
    )),
    candidates => {
      let names: Vec<&str> = candidates.iter().map(|p| p.name.as_str()).collect();
      Err(ErrorState::with_details(
        ErrorKind::BadRequest,
        ErrorDetails::Text(format!("{} matches {}", query, names.join(", "))),
      ))
    }
  }
}

fn format_elapsed(elapsed: Duration) -> String {
  format!("{:.1}ms", elapsed.as_secs_f64() * 1000.0)
}

pub fn render_provenance<T>(fetched: &Fetched<T>) -> String {
  let mut out = format!("[{} {}]", fetched.source, format_elapsed(fetched.elapsed));
  if let (Source::Cache, Some(cached_at)) = (fetched.source, fetched.cached_at) {
    let _ = write!(out, " cached at {}", cached_at.format("%Y-%m-%d %H:%M:%S UTC"));
  }
  out
}

pub fn render_prefectures(prefectures: &[Prefecture], by_region: bool) -> String {
  let mut out = String::new();
  if by_region {
    for (region, members) in group_by_region(prefectures) {
      if members.is_empty() {
        continue;
      }
      let _ = writeln!(out, "{}", region);
      for p in members {
        let _ = writeln!(out, "  {:>2}  {}", p.code, p.name);
      }
    }
  } else {
    for p in prefectures {
      let _ = writeln!(out, "{:>2}  {}", p.code, p.name);
    }
  }
  out
}

pub fn render_population(
  code: PrefCode,
  name: &str,
  population: &PrefecturePopulation,
  label: &str,
) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "{:>2} {} (recorded until {})", code, name, population.boundary_year);

  let Some(found) = population.series(label) else {
    let labels: Vec<&str> = population.data.iter().map(|s| s.label.as_str()).collect();
    let _ = writeln!(out, "  no {} series (available: {})", label, labels.join(", "));
    return out;
  };

  let data = &found.data;
  if let Some((first, last)) = series::year_range(data) {
    let _ = writeln!(out, "  {}: {}-{}", label, first, last);
  }
  if let Some((min, max)) = series::value_range(data) {
    let _ = writeln!(out, "  range: {} - {}", min, max);
  }
  if let Some(peak) = series::peak(data) {
    let _ = writeln!(out, "  peak: {} in {}", peak.value, peak.year);
  }
  if let Some((first, _)) = series::year_range(data) {
    if let Some(rate) = series::growth_rate(data, first, population.boundary_year) {
      let _ = writeln!(
        out,
        "  change {}-{}: {:+.1}%",
        first, population.boundary_year, rate
      );
    }
  }
  if let Some(last) = series::projected(data, population.boundary_year + 1).last() {
    let _ = writeln!(out, "  projected {}: {}", last.year, last.value);
  }
  out
}

/// Error text for stderr, with severity and retry hints.
pub fn render_error(state: &ErrorState) -> String {
  let mut out = String::new();
  if state.is_critical() {
    out.push_str("[critical] ");
  }
  let _ = write!(out, "{} ({})", state.display_message(), state.kind);

  if let Some(ErrorDetails::Errors(errors)) = &state.details {
    for e in errors {
      let _ = write!(out, "\n  - {} ({})", e.display_message(), e.kind);
    }
  }
  if state.is_recoverable() {
    out.push_str("\nThe request can be retried.");
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::aggregate;
  use chrono::{TimeZone, Utc};
  use serde_json::json;

  fn pref(code: i64, name: &str) -> Prefecture {
    Prefecture {
      code: PrefCode::new(code).unwrap(),
      name: name.to_string(),
    }
  }

  fn population() -> PrefecturePopulation {
    serde_json::from_value(json!({
      "boundary_year": 2020,
      "data": [{
        "label": TOTAL_LABEL,
        "data": [
          {"year": 1980, "value": 100},
          {"year": 2000, "value": 200},
          {"year": 2020, "value": 150},
          {"year": 2045, "value": 120}
        ]
      }]
    }))
    .unwrap()
  }

  #[test]
  fn test_resolve_codes() {
    let list = vec![pref(13, "東京都"), pref(27, "大阪府")];
    let codes = resolve_codes(&["1".into(), "大阪府".into(), "99".into()], Some(list.as_slice())).unwrap();
    assert_eq!(codes, vec![1, 27, 99]);

    let err = resolve_codes(&["京都府".into()], Some(list.as_slice())).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(resolve_codes(&["東京都".into()], None).is_err());
  }

  #[test]
  fn test_resolve_partial_names() {
    let list = vec![pref(13, "東京都"), pref(26, "京都府"), pref(27, "大阪府")];

    assert_eq!(resolve_name(&list, "京都府").map(PrefCode::get), Ok(26));
    assert_eq!(resolve_name(&list, "大阪").map(PrefCode::get), Ok(27));
    assert_eq!(resolve_name(&list, "とうきょう").map(PrefCode::get), Ok(13));

    let err = resolve_name(&list, "京都").unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);
    assert!(err.display_message().contains("東京都, 京都府"));
  }

  #[test]
  fn test_render_provenance() {
    let api = Fetched::from_api((), Duration::from_micros(12_340));
    assert_eq!(render_provenance(&api), "[api 12.3ms]");

    let cached_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single();
    let cache = Fetched::from_cache((), cached_at, Duration::from_micros(500));
    assert_eq!(
      render_provenance(&cache),
      "[cache 0.5ms] cached at 2024-01-02 03:04:05 UTC"
    );
  }

  #[test]
  fn test_render_prefectures_by_region() {
    let list = vec![pref(1, "北海道"), pref(13, "東京都")];
    assert_eq!(render_prefectures(&list, false), " 1  北海道\n13  東京都\n");
    assert_eq!(
      render_prefectures(&list, true),
      "北海道\n   1  北海道\n関東\n  13  東京都\n"
    );
  }

  #[test]
  fn test_render_population() {
    let out = render_population(PrefCode::new(13).unwrap(), "東京都", &population(), TOTAL_LABEL);
    assert!(out.starts_with("13 東京都 (recorded until 2020)"));
    assert!(out.contains("総人口: 1980-2045"));
    assert!(out.contains("peak: 200 in 2000"));
    assert!(out.contains("change 1980-2020: +50.0%"));
    assert!(out.contains("projected 2045: 120"));
  }

  #[test]
  fn test_render_population_missing_label() {
    let out = render_population(PrefCode::new(13).unwrap(), "東京都", &population(), "年少人口");
    assert!(out.contains("no 年少人口 series (available: 総人口)"));
  }

  #[test]
  fn test_render_error() {
    let network = ErrorState::new(ErrorKind::NetworkError);
    let text = render_error(&network);
    assert!(text.starts_with("[critical] "));
    assert!(text.contains("NETWORK_ERROR"));
    assert!(text.ends_with("The request can be retried."));

    let invalid = ErrorState::new(ErrorKind::InvalidDataFormat);
    assert!(!render_error(&invalid).contains("retried"));

    let many = aggregate(vec![
      ErrorState::new(ErrorKind::NotFound),
      ErrorState::new(ErrorKind::ServerError),
    ]);
    let text = render_error(&many);
    assert!(text.contains("\n  - "));
    assert!(text.contains("SERVER_ERROR"));
  }
}
