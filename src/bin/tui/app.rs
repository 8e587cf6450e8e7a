use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDate};
use crossterm::event::KeyCode;

use animalito_dashboard::analysis::{FrequencyMatrix, TopN};
use animalito_dashboard::backend::{
    CoincidenceQuery, ForecastQuery, FrequencyQuery, MultiLotteryQuery, PatternQuery,
};
use animalito_dashboard::catalog;
use animalito_dashboard::config::{Config, DEFAULT_RANGE_DAYS};
use animalito_dashboard::sink::{DetailRow, PresentationSink};
use animalito_dashboard::status_poller::StatusBoard;
use animalito_dashboard::types::{Direction, DrawRecord, Forecast, SearchPayload, ViewId};

// ---------------------------------------------------------------------------
// Screen model (written by the controller through TuiSink)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ViewScreen {
    pub status: String,
    pub reference: Vec<DrawRecord>,
    pub candidates: Option<Arc<SearchPayload>>,
    pub rows: Vec<DetailRow>,
    pub matrix: Option<FrequencyMatrix>,
    pub forecasts: Vec<Forecast>,
}

/// Presentation sink backing the terminal UI. Each view keeps its own screen;
/// the render loop reads a copy every frame.
#[derive(Debug, Default)]
pub struct TuiSink {
    screens: Mutex<HashMap<ViewId, ViewScreen>>,
}

impl TuiSink {
    fn with<F: FnOnce(&mut ViewScreen)>(&self, view: ViewId, f: F) {
        if let Ok(mut screens) = self.screens.lock() {
            f(screens.entry(view).or_default());
        }
    }

    pub fn view(&self, view: ViewId) -> ViewScreen {
        self.screens
            .lock()
            .ok()
            .and_then(|s| s.get(&view).cloned())
            .unwrap_or_default()
    }
}

impl PresentationSink for TuiSink {
    fn clear(&self, view: ViewId) {
        // Status line and reference day survive; they are replaced on load.
        self.with(view, |s| {
            let status = std::mem::take(&mut s.status);
            let reference = std::mem::take(&mut s.reference);
            *s = ViewScreen { status, reference, ..ViewScreen::default() };
        });
    }

    fn render_status(&self, view: ViewId, message: &str) {
        self.with(view, |s| s.status = message.to_string());
    }

    fn render_reference_day(&self, view: ViewId, draws: &[DrawRecord]) {
        self.with(view, |s| s.reference = draws.to_vec());
    }

    fn render_candidates(&self, payload: &Arc<SearchPayload>) {
        self.with(payload.view(), |s| {
            s.candidates = Some(Arc::clone(payload));
            s.rows.clear();
        });
    }

    fn render_rows(&self, view: ViewId, rows: &[DetailRow]) {
        self.with(view, |s| s.rows = rows.to_vec());
    }

    fn render_matrix(&self, matrix: &FrequencyMatrix) {
        self.with(ViewId::Frequencies, |s| s.matrix = Some(matrix.clone()));
    }

    fn render_forecasts(&self, view: ViewId, forecasts: &[Forecast]) {
        self.with(view, |s| s.forecasts = forecasts.to_vec());
    }
}

// ---------------------------------------------------------------------------
// Search form
// ---------------------------------------------------------------------------

/// Parameters shared by every view, edited from the keyboard.
#[derive(Debug, Clone)]
pub struct Form {
    pub lottery: usize,
    pub reference_date: NaiveDate,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub min_similarity: u32,
    pub forecast_top: u32,
    pub top_n: TopN,
    pub direction: Direction,
    pub first_animal: usize,
    pub second_animal: usize,
}

impl Form {
    pub fn new(cfg: &Config, today: NaiveDate) -> Self {
        let lottery = catalog::LOTTERIES
            .iter()
            .position(|l| l.eq_ignore_ascii_case(&cfg.default_lottery))
            .unwrap_or(0);
        Self {
            lottery,
            reference_date: today,
            from: today - Duration::days(DEFAULT_RANGE_DAYS),
            to: today,
            min_similarity: cfg.min_similarity,
            forecast_top: 10,
            top_n: TopN::default(),
            direction: Direction::After,
            first_animal: 2,
            second_animal: 3,
        }
    }

    pub fn lottery(&self) -> &'static str {
        catalog::LOTTERIES[self.lottery % catalog::LOTTERIES.len()]
    }

    pub fn first_animal(&self) -> (&'static str, &'static str) {
        catalog::ANIMALS[self.first_animal % catalog::ANIMALS.len()]
    }

    pub fn second_animal(&self) -> (&'static str, &'static str) {
        catalog::ANIMALS[self.second_animal % catalog::ANIMALS.len()]
    }

    pub fn pattern_query(&self) -> PatternQuery {
        PatternQuery {
            lottery: self.lottery().to_string(),
            reference_date: self.reference_date,
            from: self.from,
            to: self.to,
            min_similarity: self.min_similarity,
        }
    }

    pub fn forecast_query(&self, top_n: Option<u32>) -> ForecastQuery {
        ForecastQuery {
            lottery: self.lottery().to_string(),
            reference_date: self.reference_date,
            from: self.from,
            to: self.to,
            top_n,
        }
    }

    /// Compares against every other known lottery.
    pub fn multi_lottery_query(&self) -> MultiLotteryQuery {
        let lottery = self.lottery();
        MultiLotteryQuery {
            lottery: lottery.to_string(),
            comparison_lotteries: catalog::LOTTERIES
                .iter()
                .filter(|l| **l != lottery)
                .map(|l| l.to_string())
                .collect(),
            reference_date: self.reference_date,
            from: self.from,
            to: self.to,
            min_similarity: self.min_similarity,
        }
    }

    pub fn frequency_query(&self) -> FrequencyQuery {
        FrequencyQuery {
            lottery: self.lottery().to_string(),
            from: self.from,
            to: self.to,
            direction: self.direction,
        }
    }

    pub fn coincidence_query(&self) -> CoincidenceQuery {
        CoincidenceQuery {
            lottery: self.lottery().to_string(),
            first_animal: self.first_animal().0.to_string(),
            second_animal: self.second_animal().0.to_string(),
            from: self.from,
            to: self.to,
        }
    }
}

fn cycle(index: usize, len: usize, forward: bool) -> usize {
    if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    }
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Search(ViewId),
    Forecast(ViewId),
    Detail(ViewId, usize),
}

pub struct App {
    pub active: usize,
    pub selected: Option<usize>,
    pub form: Form,
    pub board: Arc<StatusBoard>,
}

impl App {
    pub fn new(cfg: &Config, board: Arc<StatusBoard>) -> Self {
        Self {
            active: 0,
            selected: None,
            form: Form::new(cfg, Local::now().date_naive()),
            board,
        }
    }

    pub fn view(&self) -> ViewId {
        ViewId::ALL[self.active % ViewId::ALL.len()]
    }

    /// Map a key press to a form edit or an action for the controller.
    /// `rows` is the number of selectable candidates in the active view.
    pub fn on_key(&mut self, code: KeyCode, rows: usize) -> Action {
        let view = self.view();
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Tab => {
                self.active = cycle(self.active, ViewId::ALL.len(), true);
                self.selected = None;
            }
            KeyCode::BackTab => {
                self.active = cycle(self.active, ViewId::ALL.len(), false);
                self.selected = None;
            }
            KeyCode::Down | KeyCode::Char('j') if rows > 0 => {
                let max = rows - 1;
                self.selected = Some(self.selected.map_or(0, |i| (i + 1).min(max)));
            }
            KeyCode::Up | KeyCode::Char('k') if rows > 0 => {
                self.selected = Some(self.selected.map_or(0, |i| i.saturating_sub(1)));
            }
            KeyCode::Enter => {
                if let Some(i) = self.selected.filter(|i| *i < rows) {
                    return Action::Detail(view, i);
                }
            }
            KeyCode::Char('s') => {
                self.selected = None;
                return Action::Search(view);
            }
            KeyCode::Char('f') if matches!(view, ViewId::PatternSearch | ViewId::AnimalPatternSearch) => {
                return Action::Forecast(view);
            }
            KeyCode::Char('l') => self.form.lottery = cycle(self.form.lottery, catalog::LOTTERIES.len(), true),
            KeyCode::Char('L') => self.form.lottery = cycle(self.form.lottery, catalog::LOTTERIES.len(), false),
            KeyCode::Char('[') => self.form.reference_date -= Duration::days(1),
            KeyCode::Char(']') => self.form.reference_date += Duration::days(1),
            KeyCode::Char('{') => self.form.from -= Duration::days(30),
            KeyCode::Char('}') if self.form.from + Duration::days(30) <= self.form.to => {
                self.form.from += Duration::days(30);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_count(1),
            KeyCode::Char('-') => self.adjust_count(-1),
            KeyCode::Char('d') => {
                self.form.direction = match self.form.direction {
                    Direction::After => Direction::Before,
                    Direction::Before => Direction::After,
                };
            }
            KeyCode::Char('a') => self.form.first_animal = cycle(self.form.first_animal, catalog::ANIMALS.len(), true),
            KeyCode::Char('A') => self.form.first_animal = cycle(self.form.first_animal, catalog::ANIMALS.len(), false),
            KeyCode::Char('b') => self.form.second_animal = cycle(self.form.second_animal, catalog::ANIMALS.len(), true),
            KeyCode::Char('B') => self.form.second_animal = cycle(self.form.second_animal, catalog::ANIMALS.len(), false),
            _ => {}
        }
        Action::None
    }

    /// `+`/`-` edit the matrix width on the frequency view and the minimum
    /// similarity (steps of 5) everywhere else.
    fn adjust_count(&mut self, step: i64) {
        if self.view() == ViewId::Frequencies {
            self.form.top_n = TopN::new(self.form.top_n.get() as i64 + step);
        } else {
            let next = self.form.min_similarity as i64 + step * 5;
            self.form.min_similarity = next.clamp(0, 100) as u32;
        }
    }

    pub fn auto_scraping_label(&self) -> String {
        if !self.board.reachable() {
            return "auto-scraping: unknown".to_string();
        }
        let state = if self.board.active() { "on" } else { "off" };
        format!("auto-scraping {state} · last update {}", self.board.last_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animalito_dashboard::types::AutoScrapingStatus;

    fn cfg() -> Config {
        Config {
            api_url: "http://localhost:5000".to_string(),
            log_level: "info".to_string(),
            http_timeout_secs: 5,
            status_poll_interval_secs: 30,
            default_lottery: "LA GRANJITA".to_string(),
            min_similarity: 30,
        }
    }

    fn app() -> App {
        App::new(&cfg(), Arc::new(StatusBoard::new()))
    }

    #[test]
    fn form_starts_on_configured_lottery() {
        let app = app();
        assert_eq!(app.form.lottery(), "LA GRANJITA");
        assert_eq!(app.form.to - app.form.from, Duration::days(DEFAULT_RANGE_DAYS));
    }

    #[test]
    fn tab_cycles_views_and_resets_selection() {
        let mut app = app();
        app.selected = Some(3);
        app.on_key(KeyCode::Tab, 5);
        assert_eq!(app.view(), ViewId::AnimalPatternSearch);
        assert_eq!(app.selected, None);
        app.on_key(KeyCode::BackTab, 0);
        app.on_key(KeyCode::BackTab, 0);
        assert_eq!(app.view(), ViewId::CoincidenceSearch);
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut app = app();
        assert_eq!(app.on_key(KeyCode::Enter, 2), Action::None);
        app.on_key(KeyCode::Char('j'), 2);
        app.on_key(KeyCode::Char('j'), 2);
        app.on_key(KeyCode::Char('j'), 2);
        assert_eq!(app.selected, Some(1));
        assert_eq!(app.on_key(KeyCode::Enter, 2), Action::Detail(ViewId::PatternSearch, 1));
        app.on_key(KeyCode::Char('k'), 2);
        app.on_key(KeyCode::Char('k'), 2);
        assert_eq!(app.selected, Some(0));
    }

    #[test]
    fn plus_minus_edit_top_n_on_frequencies() {
        let mut app = app();
        app.active = ViewId::ALL.iter().position(|v| *v == ViewId::Frequencies).unwrap();
        app.on_key(KeyCode::Char('+'), 0);
        assert_eq!(app.form.top_n.get(), 10);
        for _ in 0..20 {
            app.on_key(KeyCode::Char('-'), 0);
        }
        assert_eq!(app.form.top_n.get(), 1);
        assert_eq!(app.form.min_similarity, 30);
    }

    #[test]
    fn forecast_only_on_pattern_views() {
        let mut app = app();
        assert_eq!(app.on_key(KeyCode::Char('f'), 0), Action::Forecast(ViewId::PatternSearch));
        app.active = ViewId::ALL.iter().position(|v| *v == ViewId::CoincidenceSearch).unwrap();
        assert_eq!(app.on_key(KeyCode::Char('f'), 0), Action::None);
        assert_eq!(app.on_key(KeyCode::Char('s'), 0), Action::Search(ViewId::CoincidenceSearch));
    }

    #[test]
    fn multi_lottery_query_excludes_reference_lottery() {
        let app = app();
        let q = app.form.multi_lottery_query();
        assert_eq!(q.comparison_lotteries.len(), catalog::LOTTERIES.len() - 1);
        assert!(!q.comparison_lotteries.iter().any(|l| l == "LA GRANJITA"));
    }

    #[test]
    fn sink_clear_keeps_status() {
        let sink = TuiSink::default();
        sink.render_status(ViewId::PatternSearch, "Searching patterns...");
        sink.render_reference_day(ViewId::PatternSearch, &[]);
        sink.render_forecasts(ViewId::PatternSearch, &[]);
        sink.clear(ViewId::PatternSearch);
        let screen = sink.view(ViewId::PatternSearch);
        assert_eq!(screen.status, "Searching patterns...");
        assert!(screen.candidates.is_none());
        assert!(screen.forecasts.is_empty());
        assert!(sink.view(ViewId::Frequencies).status.is_empty());
    }

    #[test]
    fn status_label_reflects_board() {
        let app = app();
        assert_eq!(app.auto_scraping_label(), "auto-scraping: unknown");
        app.board.update(AutoScrapingStatus { active: true, last_update: "09:15:00".to_string() });
        assert_eq!(app.auto_scraping_label(), "auto-scraping on · last update 09:15:00");
    }
}
