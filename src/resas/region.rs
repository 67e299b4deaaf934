//! Grouping prefectures into the eight traditional regions, plus name
//! lookups and search.

use std::fmt;

use super::types::{PrefCode, Prefecture};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
  Hokkaido,
  Tohoku,
  Kanto,
  Chubu,
  Kinki,
  Chugoku,
  Shikoku,
  Kyushu,
}

impl Region {
  pub const ALL: [Region; 8] = [
    Region::Hokkaido,
    Region::Tohoku,
    Region::Kanto,
    Region::Chubu,
    Region::Kinki,
    Region::Chugoku,
    Region::Shikoku,
    Region::Kyushu,
  ];

  pub fn of(code: PrefCode) -> Region {
    match code.get() {
      1 => Region::Hokkaido,
      2..=7 => Region::Tohoku,
      8..=14 => Region::Kanto,
      15..=23 => Region::Chubu,
      24..=30 => Region::Kinki,
      31..=35 => Region::Chugoku,
      36..=39 => Region::Shikoku,
      _ => Region::Kyushu,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Region::Hokkaido => "北海道",
      Region::Tohoku => "東北",
      Region::Kanto => "関東",
      Region::Chubu => "中部",
      Region::Kinki => "近畿",
      Region::Chugoku => "中国",
      Region::Shikoku => "四国",
      Region::Kyushu => "九州",
    }
  }
}

impl fmt::Display for Region {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Group prefectures by region. Every region is present, possibly empty.
pub fn group_by_region(prefectures: &[Prefecture]) -> Vec<(Region, Vec<&Prefecture>)> {
  Region::ALL
    .iter()
    .map(|&region| {
      let members = prefectures
        .iter()
        .filter(|p| Region::of(p.code) == region)
        .collect();
      (region, members)
    })
    .collect()
}

/// Hiragana reading of each prefecture, indexed by `code - 1`.
const READINGS: [&str; 47] = [
  "ほっかいどう",
  "あおもりけん",
  "いわてけん",
  "みやぎけん",
  "あきたけん",
  "やまがたけん",
  "ふくしまけん",
  "いばらきけん",
  "とちぎけん",
  "ぐんまけん",
  "さいたまけん",
  "ちばけん",
  "とうきょうと",
  "かながわけん",
  "にいがたけん",
  "とやまけん",
  "いしかわけん",
  "ふくいけん",
  "やまなしけん",
  "ながのけん",
  "ぎふけん",
  "しずおかけん",
  "あいちけん",
  "みえけん",
  "しがけん",
  "きょうとふ",
  "おおさかふ",
  "ひょうごけん",
  "ならけん",
  "わかやまけん",
  "とっとりけん",
  "しまねけん",
  "おかやまけん",
  "ひろしまけん",
  "やまぐちけん",
  "とくしまけん",
  "かがわけん",
  "えひめけん",
  "こうちけん",
  "ふくおかけん",
  "さがけん",
  "ながさきけん",
  "くまもとけん",
  "おおいたけん",
  "みやざきけん",
  "かごしまけん",
  "おきなわけん",
];

pub fn reading(code: PrefCode) -> &'static str {
  READINGS[usize::from(code.get()) - 1]
}

/// Prefectures in order of their hiragana reading.
pub fn sort_by_reading(prefectures: &[Prefecture]) -> Vec<&Prefecture> {
  let mut sorted: Vec<&Prefecture> = prefectures.iter().collect();
  sorted.sort_by_key(|p| reading(p.code));
  sorted
}

/// Prefectures whose name or reading contains `query`.
pub fn search<'a>(prefectures: &'a [Prefecture], query: &str) -> Vec<&'a Prefecture> {
  let query = query.trim();
  if query.is_empty() {
    return Vec::new();
  }
  prefectures
    .iter()
    .filter(|p| p.name.contains(query) || reading(p.code).contains(query))
    .collect()
}

pub fn code_by_name(prefectures: &[Prefecture], name: &str) -> Option<PrefCode> {
  prefectures.iter().find(|p| p.name == name).map(|p| p.code)
}

pub fn name_by_code(prefectures: &[Prefecture], code: PrefCode) -> Option<&str> {
  prefectures
    .iter()
    .find(|p| p.code == code)
    .map(|p| p.name.as_str())
}
