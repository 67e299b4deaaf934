//! Prefecture population statistics API.

mod api_types;
mod client;
pub mod region;
pub mod series;
mod types;

pub use client::{FetchOptions, PopulationApi, LONG_TIMEOUT, POPULATION_TTL, PREFECTURE_TTL};
pub use types::{PrefCode, Prefecture, PrefecturePopulation};
