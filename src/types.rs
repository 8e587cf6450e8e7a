use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily draw slot identifier, e.g. `08:30AM`.
pub type ScheduleId = String;
/// Animal code as printed on the ticket, e.g. `0`, `00`, `36`.
pub type AnimalCode = String;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewId {
    PatternSearch,
    AnimalPatternSearch,
    MultiLotterySearch,
    Frequencies,
    MultiForecast,
    CoincidenceSearch,
}

impl ViewId {
    pub const ALL: [ViewId; 6] = [
        ViewId::PatternSearch,
        ViewId::AnimalPatternSearch,
        ViewId::MultiLotterySearch,
        ViewId::Frequencies,
        ViewId::MultiForecast,
        ViewId::CoincidenceSearch,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ViewId::PatternSearch => "Historical patterns",
            ViewId::AnimalPatternSearch => "Animal patterns",
            ViewId::MultiLotterySearch => "Multi-lottery",
            ViewId::Frequencies => "Frequencies",
            ViewId::MultiForecast => "Multi-forecast",
            ViewId::CoincidenceSearch => "Coincidences",
        }
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ViewId::PatternSearch => "pattern_search",
            ViewId::AnimalPatternSearch => "animal_pattern_search",
            ViewId::MultiLotterySearch => "multi_lottery_search",
            ViewId::Frequencies => "frequencies",
            ViewId::MultiForecast => "multi_forecast",
            ViewId::CoincidenceSearch => "coincidence_search",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Draws
// ---------------------------------------------------------------------------

/// One observed outcome at one schedule slot on one date for one lottery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    pub date: NaiveDate,
    pub lottery: String,
    pub schedule: ScheduleId,
    pub animal_code: AnimalCode,
    pub animal_name: String,
}

/// Slot → animal assignments of the reference day, plus the slots that make
/// up the reference pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    pub assignments: HashMap<ScheduleId, AnimalCode>,
    /// Chronological, as supplied by the backend.
    pub reference_schedules: Vec<ScheduleId>,
}

impl ReferenceSet {
    pub fn new(assignments: HashMap<ScheduleId, AnimalCode>, reference_schedules: Vec<ScheduleId>) -> Self {
        Self { assignments, reference_schedules }
    }

    pub fn is_reference_schedule(&self, schedule: &str) -> bool {
        self.reference_schedules.iter().any(|s| s == schedule)
    }

    pub fn animal_at(&self, schedule: &str) -> Option<&AnimalCode> {
        self.assignments.get(schedule)
    }
}

// ---------------------------------------------------------------------------
// Candidate patterns
// ---------------------------------------------------------------------------

/// A historical day the backend considers structurally similar to the
/// reference day.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePattern {
    pub date: NaiveDate,
    pub lottery: String,
    /// Percent, 0–100, computed server-side.
    pub similarity: f64,
    pub hits: u32,
    pub total_comparisons: u32,
    pub total_future: u32,
    pub future_draws: Vec<DrawRecord>,
}

/// Animal-set variant: similarity counts shared animals regardless of slot,
/// so future draws carry no schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimalPattern {
    pub pattern: CandidatePattern,
    pub reference_animals: u32,
    pub historical_animals: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiLotteryPattern {
    /// `pattern.lottery` is the compared lottery.
    pub pattern: CandidatePattern,
    pub reference_schedules: Vec<ScheduleId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternSearch {
    pub lottery: String,
    pub reference_date: NaiveDate,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub candidates: Vec<CandidatePattern>,
    pub reference: ReferenceSet,
    pub total_analyzed: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimalSearch {
    pub lottery: String,
    pub reference_date: NaiveDate,
    pub candidates: Vec<AnimalPattern>,
    pub reference_animals: Vec<AnimalCode>,
    pub total_analyzed: u32,
}

impl AnimalSearch {
    pub fn max_hits(&self) -> u32 {
        self.candidates.iter().map(|c| c.pattern.hits).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiLotterySearch {
    pub lottery: String,
    pub reference_date: NaiveDate,
    pub candidates: Vec<MultiLotteryPattern>,
    pub reference: ReferenceSet,
}

// ---------------------------------------------------------------------------
// Coincidences
// ---------------------------------------------------------------------------

/// A day where the first animal was immediately followed by the second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoincidenceDate {
    pub date: NaiveDate,
    pub first_schedule: ScheduleId,
    pub second_schedule: ScheduleId,
    /// 1-based slot index of the first animal within the day.
    pub position: u32,
    pub draws_that_day: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoincidenceSearch {
    pub lottery: String,
    pub first_animal: AnimalCode,
    pub second_animal: AnimalCode,
    pub first_name: String,
    pub second_name: String,
    pub dates: Vec<CoincidenceDate>,
    pub total: u32,
}

// ---------------------------------------------------------------------------
// Cached payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SearchPayload {
    Patterns(PatternSearch),
    Animals(AnimalSearch),
    MultiLottery(MultiLotterySearch),
    Coincidences(CoincidenceSearch),
}

impl SearchPayload {
    pub fn view(&self) -> ViewId {
        match self {
            SearchPayload::Patterns(_) => ViewId::PatternSearch,
            SearchPayload::Animals(_) => ViewId::AnimalPatternSearch,
            SearchPayload::MultiLottery(_) => ViewId::MultiLotterySearch,
            SearchPayload::Coincidences(_) => ViewId::CoincidenceSearch,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SearchPayload::Patterns(s) => s.candidates.len(),
            SearchPayload::Animals(s) => s.candidates.len(),
            SearchPayload::MultiLottery(s) => s.candidates.len(),
            SearchPayload::Coincidences(s) => s.dates.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Frequencies
// ---------------------------------------------------------------------------

/// One ranked follow-up statistic for a reference animal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FrequencyEntry {
    #[serde(rename = "animalito")]
    pub animal_code: AnimalCode,
    #[serde(rename = "nombre", default)]
    pub animal_name: String,
    #[serde(rename = "frecuencia")]
    pub frequency: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Animal drawn in the slot right before the reference animal.
    #[serde(rename = "antes")]
    Before,
    /// Animal drawn in the slot right after the reference animal.
    #[serde(rename = "despues")]
    After,
}

impl Direction {
    pub fn as_param(self) -> &'static str {
        match self {
            Direction::Before => "antes",
            Direction::After => "despues",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Before => write!(f, "BEFORE"),
            Direction::After => write!(f, "AFTER"),
        }
    }
}

// ---------------------------------------------------------------------------
// Forecasts
// ---------------------------------------------------------------------------

/// Ranked suggestion from one of the forecast endpoints. Scores are opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub animal_code: AnimalCode,
    pub animal_name: String,
    pub score: f64,
    pub frequency: Option<f64>,
    /// Days the animal appeared among the best patterns (animal forecasts).
    pub appearances: Option<u32>,
    /// Number of analyses agreeing on the animal (multi forecasts).
    pub sources: Option<u32>,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastReport {
    pub forecasts: Vec<Forecast>,
    pub best_similarity: Option<f64>,
    pub max_hits: Option<u32>,
}

// ---------------------------------------------------------------------------
// Auxiliary endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub total: u64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutoScrapingStatus {
    pub active: bool,
    /// Server-local `HH:MM:SS`, or the server's "never" marker.
    pub last_update: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateReport {
    pub groups: u64,
    pub records: u64,
}
