//! Where controller output goes. The CLI prints plain tables; the TUI keeps
//! its own screen model behind the same trait.

use std::sync::Arc;

use crate::analysis::frequency::rank_label;
use crate::analysis::{ClassifiedDraw, FrequencyMatrix, MatrixCell, ReferenceRow, TaggedDraw};
use crate::dates::format_local;
use crate::types::{DrawRecord, Forecast, SearchPayload, ViewId};

/// One line of a detail table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailRow {
    /// Follow-up draw of a candidate, with its classification.
    Draw(ClassifiedDraw),
    /// Reference-day slot listed under a multi-lottery detail.
    Reference(ReferenceRow),
    /// Full day around a coincidence.
    Day(TaggedDraw),
}

pub trait PresentationSink: Send + Sync {
    /// Drop everything shown for `view`.
    fn clear(&self, view: ViewId);

    fn render_status(&self, view: ViewId, message: &str);

    fn render_reference_day(&self, view: ViewId, draws: &[DrawRecord]);

    fn render_candidates(&self, payload: &Arc<SearchPayload>);

    fn render_rows(&self, view: ViewId, rows: &[DetailRow]);

    fn render_matrix(&self, matrix: &FrequencyMatrix);

    fn render_forecasts(&self, view: ViewId, forecasts: &[Forecast]);
}

// ---------------------------------------------------------------------------
// Line formatting (shared by both front-ends)
// ---------------------------------------------------------------------------

/// Animal-pattern futures have no slot.
fn slot(schedule: &str) -> &str {
    if schedule.is_empty() {
        "–"
    } else {
        schedule
    }
}

pub fn reference_day_lines(draws: &[DrawRecord]) -> Vec<String> {
    draws
        .iter()
        .map(|d| format!("{:<8} {:>3}  {}", d.schedule, d.animal_code, d.animal_name))
        .collect()
}

pub fn candidate_header(view: ViewId) -> &'static str {
    match view {
        ViewId::PatternSearch => "  #  Date        Similarity  Hits  Compared  Futures",
        ViewId::AnimalPatternSearch => "  #  Date        Hits  Similarity  Ref  Hist  Futures",
        ViewId::MultiLotterySearch => "  #  Lottery          Date        Similarity  Hits  Compared",
        ViewId::CoincidenceSearch => "  #  Date        First     Second    Position  Draws",
        ViewId::Frequencies | ViewId::MultiForecast => "",
    }
}

pub fn candidate_lines(payload: &SearchPayload) -> Vec<String> {
    match payload {
        SearchPayload::Patterns(s) => s
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "{:>3}  {}  {:>9.1}%  {:>4}  {:>8}  {:>7}",
                    i,
                    format_local(c.date),
                    c.similarity,
                    c.hits,
                    c.total_comparisons,
                    c.total_future
                )
            })
            .collect(),
        SearchPayload::Animals(s) => s
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "{:>3}  {}  {:>4}  {:>9.1}%  {:>3}  {:>4}  {:>7}",
                    i,
                    format_local(c.pattern.date),
                    c.pattern.hits,
                    c.pattern.similarity,
                    c.reference_animals,
                    c.historical_animals,
                    c.pattern.total_future
                )
            })
            .collect(),
        SearchPayload::MultiLottery(s) => s
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "{:>3}  {:<15}  {}  {:>9.1}%  {:>4}  {:>8}",
                    i,
                    c.pattern.lottery,
                    format_local(c.pattern.date),
                    c.pattern.similarity,
                    c.pattern.hits,
                    c.pattern.total_comparisons
                )
            })
            .collect(),
        SearchPayload::Coincidences(s) => s
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| {
                format!(
                    "{:>3}  {}  {:<8}  {:<8}  {:>8}  {:>5}",
                    i,
                    format_local(d.date),
                    d.first_schedule,
                    d.second_schedule,
                    d.position,
                    d.draws_that_day
                )
            })
            .collect(),
    }
}

pub fn detail_line(row: &DetailRow) -> String {
    match row {
        DetailRow::Draw(c) => format!(
            "{:<8} {:>3}  {:<12} {}",
            slot(&c.draw.schedule),
            c.draw.animal_code,
            c.draw.animal_name,
            c.status
        ),
        DetailRow::Reference(r) => format!(
            "{:<8} {:>3}  {:<12} REF",
            r.schedule,
            r.animal_code.as_deref().unwrap_or("N/A"),
            r.animal_name
        ),
        DetailRow::Day(t) => format!(
            "{:<8} {:>3}  {:<12} {}",
            t.draw.schedule, t.draw.animal_code, t.draw.animal_name, t.tag
        ),
    }
}

/// Header line followed by one line per reference animal.
pub fn matrix_lines(matrix: &FrequencyMatrix) -> Vec<String> {
    let mut lines = Vec::with_capacity(matrix.rows.len() + 1);
    lines.push(matrix.header_labels().join(" | "));
    for row in &matrix.rows {
        let mut cells = vec![row.reference_animal.clone(), row.reference_name.clone()];
        for cell in &row.top_entries {
            match cell {
                MatrixCell::Entry(e) => {
                    cells.push(e.animal_code.clone());
                    cells.push(e.animal_name.clone());
                    cells.push(e.frequency.to_string());
                }
                MatrixCell::Padding => cells.extend([String::new(), String::new(), String::new()]),
            }
        }
        lines.push(cells.join(" | "));
    }
    lines
}

pub fn forecast_line(rank: usize, forecast: &Forecast) -> String {
    let mut line = format!(
        "{:>3}  {:>3}  {:<12} {:>8.2}",
        rank_label(rank),
        forecast.animal_code,
        forecast.animal_name,
        forecast.score
    );
    if let Some(freq) = forecast.frequency {
        line.push_str(&format!("  freq {freq:.2}"));
    }
    if let Some(days) = forecast.appearances {
        line.push_str(&format!("  days {days}"));
    }
    if let Some(sources) = forecast.sources {
        line.push_str(&format!("  sources {sources}"));
    }
    if !forecast.details.is_empty() {
        line.push_str(&format!("  {}", forecast.details.join(" | ")));
    }
    line
}

// ---------------------------------------------------------------------------
// ConsoleSink
// ---------------------------------------------------------------------------

/// Prints everything to stdout as it arrives.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl PresentationSink for ConsoleSink {
    fn clear(&self, _view: ViewId) {}

    fn render_status(&self, view: ViewId, message: &str) {
        println!("[{}] {message}", view.title());
    }

    fn render_reference_day(&self, _view: ViewId, draws: &[DrawRecord]) {
        for line in reference_day_lines(draws) {
            println!("{line}");
        }
    }

    fn render_candidates(&self, payload: &Arc<SearchPayload>) {
        if payload.is_empty() {
            return;
        }
        println!("{}", candidate_header(payload.view()));
        for line in candidate_lines(payload) {
            println!("{line}");
        }
    }

    fn render_rows(&self, _view: ViewId, rows: &[DetailRow]) {
        for row in rows {
            println!("{}", detail_line(row));
        }
    }

    fn render_matrix(&self, matrix: &FrequencyMatrix) {
        for line in matrix_lines(matrix) {
            println!("{line}");
        }
    }

    fn render_forecasts(&self, _view: ViewId, forecasts: &[Forecast]) {
        for (i, f) in forecasts.iter().enumerate() {
            println!("{}", forecast_line(i + 1, f));
        }
    }
}
