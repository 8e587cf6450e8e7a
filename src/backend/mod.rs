//! Seam between the dashboard and the results / pattern-analysis API.

pub mod client;
pub mod wire;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::analysis::FrequencyReport;
use crate::error::Result;
use crate::types::{
    AnimalCode, AnimalSearch, AutoScrapingStatus, CoincidenceSearch, Direction, DrawRecord,
    ForecastReport, MultiLotterySearch, PatternSearch,
};

pub use client::HttpBackend;

/// A decoded response. `Rejected` carries the server's `error` message: the
/// request worked but the analysis had nothing to say (no reference data, no
/// history, ...). Transport failures are `Err` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ready(T),
    Rejected(String),
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ready(v) => Outcome::Ready(f(v)),
            Outcome::Rejected(msg) => Outcome::Rejected(msg),
        }
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(v) => Some(v),
            Outcome::Rejected(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternQuery {
    pub lottery: String,
    pub reference_date: NaiveDate,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub min_similarity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastQuery {
    pub lottery: String,
    pub reference_date: NaiveDate,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Not sent for multi forecasts, which always return the full ranking.
    pub top_n: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiLotteryQuery {
    pub lottery: String,
    pub comparison_lotteries: Vec<String>,
    pub reference_date: NaiveDate,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub min_similarity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyQuery {
    pub lottery: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoincidenceQuery {
    pub lottery: String,
    pub first_animal: AnimalCode,
    pub second_animal: AnimalCode,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// None means every lottery.
    pub lottery: Option<String>,
    /// None means every schedule.
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapingRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub lotteries: Vec<String>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Analysis endpoints consumed by the dashboard controller.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn reference_day(&self, lottery: &str, date: NaiveDate) -> Result<Outcome<Vec<DrawRecord>>>;

    async fn similar_patterns(&self, query: &PatternQuery) -> Result<Outcome<PatternSearch>>;

    async fn pattern_forecasts(&self, query: &ForecastQuery) -> Result<Outcome<ForecastReport>>;

    async fn animal_patterns(&self, query: &PatternQuery) -> Result<Outcome<AnimalSearch>>;

    async fn animal_forecasts(&self, query: &ForecastQuery) -> Result<Outcome<ForecastReport>>;

    async fn multi_lottery(&self, query: &MultiLotteryQuery) -> Result<Outcome<MultiLotterySearch>>;

    async fn frequencies(&self, query: &FrequencyQuery) -> Result<Outcome<FrequencyReport>>;

    async fn multi_forecasts(&self, query: &ForecastQuery) -> Result<Outcome<ForecastReport>>;

    async fn coincidences(&self, query: &CoincidenceQuery) -> Result<Outcome<CoincidenceSearch>>;

    async fn coincidence_day(&self, lottery: &str, date: NaiveDate) -> Result<Outcome<Vec<DrawRecord>>>;
}

/// Source of the auto-scraping "last updated" marker.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn auto_scraping_status(&self) -> Result<AutoScrapingStatus>;
}
