use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::analysis::classifier::reference_rows;
use crate::analysis::frequency::build as build_matrix;
use crate::analysis::{classify_all, highlight_by_schedules, ClassificationMode, FrequencyMatrix, TopN};
use crate::backend::{
    CoincidenceQuery, ForecastQuery, FrequencyQuery, MultiLotteryQuery, Outcome, PatternQuery,
    SearchBackend,
};
use crate::dates::format_local;
use crate::error::Result;
use crate::sink::{DetailRow, PresentationSink};
use crate::state::{Lookup, RequestToken, SearchResultCache};
use crate::types::{DrawRecord, ForecastReport, ReferenceSet, SearchPayload, ViewId};

/// Drives every dashboard action: ask the backend, keep the result for the
/// view, hand rows to the sink.
pub struct DashboardController<B, S> {
    backend: B,
    sink: S,
    cache: SearchResultCache,
}

impl<B: SearchBackend, S: PresentationSink> DashboardController<B, S> {
    pub fn new(backend: B, sink: S) -> Self {
        Self {
            backend,
            sink,
            cache: SearchResultCache::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn cache(&self) -> &SearchResultCache {
        &self.cache
    }

    // -----------------------------------------------------------------------
    // Action plumbing
    // -----------------------------------------------------------------------

    /// Reset the view and take a fresh request token for it.
    fn start(&self, view: ViewId, searching: &str) -> RequestToken {
        self.cache.clear(view);
        self.sink.clear(view);
        let token = self.cache.begin_request(view);
        self.sink.render_status(view, searching);
        token
    }

    /// Unwrap a backend reply. `Ok(None)` means nothing to show: either the
    /// server rejected the analysis (its message is rendered) or a newer
    /// request for the view has already been issued.
    fn settle<T>(&self, view: ViewId, token: Option<RequestToken>, reply: Result<Outcome<T>>) -> Result<Option<T>> {
        let current = token.map_or(true, |t| self.cache.is_current(t));
        match reply {
            Err(e) => {
                error!(view = %view, "request failed: {e}");
                if current {
                    self.sink.render_status(view, &format!("Error: {e}"));
                }
                Err(e)
            }
            Ok(_) if !current => {
                debug!(view = %view, "dropping response for superseded request");
                Ok(None)
            }
            Ok(Outcome::Rejected(message)) => {
                info!(view = %view, reason = %message, "analysis rejected");
                self.sink.render_status(view, &message);
                Ok(None)
            }
            Ok(Outcome::Ready(value)) => Ok(Some(value)),
        }
    }

    /// Store and render a fresh payload. None when the token went stale.
    fn publish(&self, token: RequestToken, payload: SearchPayload) -> Option<Arc<SearchPayload>> {
        let payload = Arc::new(payload);
        if !self.cache.store_if_current(token, Arc::clone(&payload)) {
            return None;
        }
        info!(view = %token.view(), count = payload.len(), "search stored");
        self.sink.render_candidates(&payload);
        Some(payload)
    }

    fn render_detail(&self, view: ViewId, rows: Vec<DetailRow>) -> Vec<DetailRow> {
        self.sink.render_rows(view, &rows);
        rows
    }

    // -----------------------------------------------------------------------
    // Reference day
    // -----------------------------------------------------------------------

    pub async fn load_reference_day(&self, view: ViewId, lottery: &str, date: NaiveDate) -> Result<Vec<DrawRecord>> {
        self.fetch_reference_day(view, None, lottery, date).await
    }

    /// With a token, the day is only rendered while that request is still
    /// the latest for the view.
    async fn fetch_reference_day(
        &self,
        view: ViewId,
        token: Option<RequestToken>,
        lottery: &str,
        date: NaiveDate,
    ) -> Result<Vec<DrawRecord>> {
        let reply = self.backend.reference_day(lottery, date).await;
        let Some(draws) = self.settle(view, token, reply)? else {
            return Ok(Vec::new());
        };
        self.sink.render_reference_day(view, &draws);
        self.sink
            .render_status(view, &format!("{} reference results loaded.", draws.len()));
        Ok(draws)
    }

    // -----------------------------------------------------------------------
    // Historical patterns
    // -----------------------------------------------------------------------

    pub async fn search_patterns(&self, query: &PatternQuery) -> Result<Option<Arc<SearchPayload>>> {
        let view = ViewId::PatternSearch;
        let token = self.start(view, "Searching patterns...");
        let reply = self.backend.similar_patterns(query).await;
        let Some(search) = self.settle(view, Some(token), reply)? else {
            return Ok(None);
        };

        let found = search.candidates.len();
        let Some(payload) = self.publish(token, SearchPayload::Patterns(search)) else {
            return Ok(None);
        };
        self.sink.render_status(
            view,
            &format!(
                "{found} patterns found in {} – {}.",
                format_local(query.from),
                format_local(query.to)
            ),
        );
        Ok(Some(payload))
    }

    pub fn show_pattern_detail(&self, index: usize) -> Vec<DetailRow> {
        let view = ViewId::PatternSearch;
        let Lookup::Active(payload) = self.cache.get(view) else {
            return Vec::new();
        };
        let SearchPayload::Patterns(search) = payload.as_ref() else {
            return Vec::new();
        };
        let Some(candidate) = search.candidates.get(index) else {
            return Vec::new();
        };

        let rows = classify_all(ClassificationMode::ThreeWay, &candidate.future_draws, &search.reference)
            .into_iter()
            .map(DetailRow::Draw)
            .collect();
        self.render_detail(view, rows)
    }

    pub async fn forecast_patterns(&self, query: &ForecastQuery) -> Result<Option<ForecastReport>> {
        let view = ViewId::PatternSearch;
        self.sink.render_status(view, "Generating forecasts...");
        let reply = self.backend.pattern_forecasts(query).await;
        let Some(report) = self.settle(view, None, reply)? else {
            return Ok(None);
        };

        self.sink.render_forecasts(view, &report.forecasts);
        self.sink.render_status(
            view,
            &format!(
                "{} forecasts. Best similarity: {}%",
                report.forecasts.len(),
                report.best_similarity.unwrap_or(0.0)
            ),
        );
        Ok(Some(report))
    }

    // -----------------------------------------------------------------------
    // Animal patterns
    // -----------------------------------------------------------------------

    /// Loads the reference day first, then runs the animal-set search.
    pub async fn search_animal_patterns(&self, query: &PatternQuery) -> Result<Option<Arc<SearchPayload>>> {
        let view = ViewId::AnimalPatternSearch;
        let token = self.start(view, "Searching animal patterns...");
        if let Err(e) = self
            .fetch_reference_day(view, Some(token), &query.lottery, query.reference_date)
            .await
        {
            warn!(view = %view, "reference day unavailable: {e}");
        }

        let reply = self.backend.animal_patterns(query).await;
        let Some(search) = self.settle(view, Some(token), reply)? else {
            return Ok(None);
        };

        let found = search.candidates.len();
        let max_hits = search.max_hits();
        let Some(payload) = self.publish(token, SearchPayload::Animals(search)) else {
            return Ok(None);
        };
        self.sink
            .render_status(view, &format!("{found} patterns found. Max hits: {max_hits}."));
        Ok(Some(payload))
    }

    /// Animal futures carry no slot, so every row comes out FUTURE.
    pub fn show_animal_detail(&self, index: usize) -> Vec<DetailRow> {
        let view = ViewId::AnimalPatternSearch;
        let Lookup::Active(payload) = self.cache.get(view) else {
            return Vec::new();
        };
        let SearchPayload::Animals(search) = payload.as_ref() else {
            return Vec::new();
        };
        let Some(candidate) = search.candidates.get(index) else {
            return Vec::new();
        };

        let rows = classify_all(
            ClassificationMode::ThreeWay,
            &candidate.pattern.future_draws,
            &ReferenceSet::default(),
        )
        .into_iter()
        .map(DetailRow::Draw)
        .collect();
        self.render_detail(view, rows)
    }

    pub async fn forecast_animals(&self, query: &ForecastQuery) -> Result<Option<ForecastReport>> {
        let view = ViewId::AnimalPatternSearch;
        self.sink.render_status(view, "Generating forecasts...");
        let reply = self.backend.animal_forecasts(query).await;
        let Some(report) = self.settle(view, None, reply)? else {
            return Ok(None);
        };

        self.sink.render_forecasts(view, &report.forecasts);
        self.sink.render_status(
            view,
            &format!(
                "{} forecasts. Max hits: {}.",
                report.forecasts.len(),
                report.max_hits.unwrap_or(0)
            ),
        );
        Ok(Some(report))
    }

    // -----------------------------------------------------------------------
    // Multi-lottery
    // -----------------------------------------------------------------------

    pub async fn search_multi_lottery(&self, query: &MultiLotteryQuery) -> Result<Option<Arc<SearchPayload>>> {
        let view = ViewId::MultiLotterySearch;
        let token = self.start(view, "Searching multi-lottery patterns...");
        if query.comparison_lotteries.is_empty() {
            self.sink
                .render_status(view, "Select at least one lottery to compare against.");
            return Ok(None);
        }

        let reply = self.backend.multi_lottery(query).await;
        let Some(search) = self.settle(view, Some(token), reply)? else {
            return Ok(None);
        };

        let found = search.candidates.len();
        let Some(payload) = self.publish(token, SearchPayload::MultiLottery(search)) else {
            return Ok(None);
        };
        self.sink
            .render_status(view, &format!("{found} multi-lottery patterns found."));
        Ok(Some(payload))
    }

    /// Future draws (all FUTURE) followed by one row per reference slot.
    pub fn show_multi_lottery_detail(&self, index: usize) -> Vec<DetailRow> {
        let view = ViewId::MultiLotterySearch;
        let Lookup::Active(payload) = self.cache.get(view) else {
            return Vec::new();
        };
        let SearchPayload::MultiLottery(search) = payload.as_ref() else {
            return Vec::new();
        };
        let Some(candidate) = search.candidates.get(index) else {
            return Vec::new();
        };

        let schedules = if candidate.reference_schedules.is_empty() {
            &search.reference.reference_schedules
        } else {
            &candidate.reference_schedules
        };

        let mut rows: Vec<DetailRow> = classify_all(
            ClassificationMode::FutureOnly,
            &candidate.pattern.future_draws,
            &search.reference,
        )
        .into_iter()
        .map(DetailRow::Draw)
        .collect();
        rows.extend(
            reference_rows(schedules, &search.reference)
                .into_iter()
                .map(DetailRow::Reference),
        );
        self.render_detail(view, rows)
    }

    // -----------------------------------------------------------------------
    // Frequencies
    // -----------------------------------------------------------------------

    pub async fn analyze_frequencies(&self, query: &FrequencyQuery, top_n: TopN) -> Result<Option<FrequencyMatrix>> {
        let view = ViewId::Frequencies;
        let token = self.start(view, "Analyzing frequencies...");
        let reply = self.backend.frequencies(query).await;
        let Some(report) = self.settle(view, Some(token), reply)? else {
            return Ok(None);
        };

        let matrix = FrequencyMatrix {
            top_n,
            direction: report.direction.unwrap_or(query.direction),
            rows: build_matrix(&report.frequencies, top_n),
        };
        debug!(rows = matrix.rows.len(), days = report.total_days, "frequency matrix built");
        self.sink.render_matrix(&matrix);
        self.sink.render_status(
            view,
            &format!(
                "{} animals. Top {} animals {}.",
                matrix.rows.len(),
                top_n.get(),
                matrix.direction
            ),
        );
        Ok(Some(matrix))
    }

    // -----------------------------------------------------------------------
    // Multi-forecast
    // -----------------------------------------------------------------------

    pub async fn forecast_multi(&self, query: &ForecastQuery) -> Result<Option<ForecastReport>> {
        let view = ViewId::MultiForecast;
        let token = self.start(view, "Generating multi-forecasts...");
        let reply = self.backend.multi_forecasts(query).await;
        let Some(report) = self.settle(view, Some(token), reply)? else {
            return Ok(None);
        };

        self.sink.render_forecasts(view, &report.forecasts);
        self.sink.render_status(
            view,
            &format!(
                "{} multi-forecasts generated for {} – {}.",
                report.forecasts.len(),
                query.lottery,
                format_local(query.reference_date)
            ),
        );
        Ok(Some(report))
    }

    // -----------------------------------------------------------------------
    // Coincidences
    // -----------------------------------------------------------------------

    pub async fn search_coincidences(&self, query: &CoincidenceQuery) -> Result<Option<Arc<SearchPayload>>> {
        let view = ViewId::CoincidenceSearch;
        if query.first_animal == query.second_animal {
            self.sink.render_status(view, "The two animals must be different.");
            return Ok(None);
        }

        let token = self.start(view, "Searching coincidences...");
        let reply = self.backend.coincidences(query).await;
        let Some(search) = self.settle(view, Some(token), reply)? else {
            return Ok(None);
        };

        let status = format!(
            "{} coincidences: {}({}) → {}({})",
            search.total, search.first_animal, search.first_name, search.second_animal, search.second_name
        );
        let Some(payload) = self.publish(token, SearchPayload::Coincidences(search)) else {
            return Ok(None);
        };
        self.sink.render_status(view, &status);
        Ok(Some(payload))
    }

    /// Fetch the whole day of one coincidence and mark both of its slots.
    pub async fn show_coincidence_day(&self, index: usize) -> Result<Vec<DetailRow>> {
        let view = ViewId::CoincidenceSearch;
        let Lookup::Active(payload) = self.cache.get(view) else {
            return Ok(Vec::new());
        };
        let SearchPayload::Coincidences(search) = payload.as_ref() else {
            return Ok(Vec::new());
        };
        let Some(coincidence) = search.dates.get(index) else {
            return Ok(Vec::new());
        };

        let reply = self.backend.coincidence_day(&search.lottery, coincidence.date).await;
        // A new search may have replaced the one this day belongs to.
        let still_shown = matches!(self.cache.get(view), Lookup::Active(current) if Arc::ptr_eq(&current, &payload));
        if !still_shown {
            debug!(view = %view, "dropping coincidence day for superseded search");
            reply?;
            return Ok(Vec::new());
        }
        let Some(draws) = self.settle(view, None, reply)? else {
            return Ok(Vec::new());
        };

        let marked = [coincidence.first_schedule.clone(), coincidence.second_schedule.clone()];
        let rows = highlight_by_schedules(&draws, &marked)
            .into_iter()
            .map(DetailRow::Day)
            .collect();
        Ok(self.render_detail(view, rows))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::pin::pin;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures_util::poll;
    use tokio::sync::oneshot;

    use crate::analysis::{DayTag, DrawStatus, FrequencyReport, FrequencyTable, MatrixCell};
    use crate::error::AppError;
    use crate::types::{
        AnimalPattern, AnimalSearch, CandidatePattern, CoincidenceDate, CoincidenceSearch, Direction,
        Forecast, FrequencyEntry, MultiLotteryPattern, MultiLotterySearch, PatternSearch,
    };

    // -- fakes --------------------------------------------------------------

    type Reply<T> = Result<Outcome<T>>;

    /// Queue of replies for one endpoint. `gate` hands back the sender so a
    /// test decides when the call completes.
    struct Script<T>(Mutex<VecDeque<oneshot::Receiver<Reply<T>>>>);

    impl<T> Default for Script<T> {
        fn default() -> Self {
            Self(Mutex::new(VecDeque::new()))
        }
    }

    impl<T> Script<T> {
        fn reply(&self, value: Reply<T>) {
            let tx = self.gate();
            let _ = tx.send(value);
        }

        fn ready(&self, value: T) {
            self.reply(Ok(Outcome::Ready(value)));
        }

        fn gate(&self) -> oneshot::Sender<Reply<T>> {
            let (tx, rx) = oneshot::channel();
            self.0.lock().unwrap().push_back(rx);
            tx
        }

        async fn next(&self) -> Reply<T> {
            let rx = self.0.lock().unwrap().pop_front().expect("unscripted backend call");
            rx.await.expect("gate dropped")
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<&'static str>>,
        reference: Script<Vec<DrawRecord>>,
        patterns: Script<PatternSearch>,
        pattern_forecasts: Script<ForecastReport>,
        animals: Script<AnimalSearch>,
        animal_forecasts: Script<ForecastReport>,
        multi: Script<MultiLotterySearch>,
        frequencies: Script<FrequencyReport>,
        multi_forecasts: Script<ForecastReport>,
        coincidences: Script<CoincidenceSearch>,
        day: Script<Vec<DrawRecord>>,
    }

    impl FakeBackend {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn reference_day(&self, _lottery: &str, _date: NaiveDate) -> Reply<Vec<DrawRecord>> {
            self.record("reference_day");
            self.reference.next().await
        }

        async fn similar_patterns(&self, _q: &PatternQuery) -> Reply<PatternSearch> {
            self.record("similar_patterns");
            self.patterns.next().await
        }

        async fn pattern_forecasts(&self, _q: &ForecastQuery) -> Reply<ForecastReport> {
            self.record("pattern_forecasts");
            self.pattern_forecasts.next().await
        }

        async fn animal_patterns(&self, _q: &PatternQuery) -> Reply<AnimalSearch> {
            self.record("animal_patterns");
            self.animals.next().await
        }

        async fn animal_forecasts(&self, _q: &ForecastQuery) -> Reply<ForecastReport> {
            self.record("animal_forecasts");
            self.animal_forecasts.next().await
        }

        async fn multi_lottery(&self, _q: &MultiLotteryQuery) -> Reply<MultiLotterySearch> {
            self.record("multi_lottery");
            self.multi.next().await
        }

        async fn frequencies(&self, _q: &FrequencyQuery) -> Reply<FrequencyReport> {
            self.record("frequencies");
            self.frequencies.next().await
        }

        async fn multi_forecasts(&self, _q: &ForecastQuery) -> Reply<ForecastReport> {
            self.record("multi_forecasts");
            self.multi_forecasts.next().await
        }

        async fn coincidences(&self, _q: &CoincidenceQuery) -> Reply<CoincidenceSearch> {
            self.record("coincidences");
            self.coincidences.next().await
        }

        async fn coincidence_day(&self, _lottery: &str, _date: NaiveDate) -> Reply<Vec<DrawRecord>> {
            self.record("coincidence_day");
            self.day.next().await
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Clear(ViewId),
        Status(ViewId, String),
        Reference(ViewId, usize),
        Candidates(ViewId, usize),
        Rows(ViewId, Vec<DetailRow>),
        Matrix(FrequencyMatrix),
        Forecasts(ViewId, usize),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn push(&self, e: Event) {
            self.events.lock().unwrap().push(e);
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn statuses(&self, view: ViewId) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Status(v, s) if v == view => Some(s),
                    _ => None,
                })
                .collect()
        }

        fn last_status(&self, view: ViewId) -> String {
            self.statuses(view).pop().unwrap_or_default()
        }
    }

    impl PresentationSink for RecordingSink {
        fn clear(&self, view: ViewId) {
            self.push(Event::Clear(view));
        }

        fn render_status(&self, view: ViewId, message: &str) {
            self.push(Event::Status(view, message.to_string()));
        }

        fn render_reference_day(&self, view: ViewId, draws: &[DrawRecord]) {
            self.push(Event::Reference(view, draws.len()));
        }

        fn render_candidates(&self, payload: &Arc<SearchPayload>) {
            self.push(Event::Candidates(payload.view(), payload.len()));
        }

        fn render_rows(&self, view: ViewId, rows: &[DetailRow]) {
            self.push(Event::Rows(view, rows.to_vec()));
        }

        fn render_matrix(&self, matrix: &FrequencyMatrix) {
            self.push(Event::Matrix(matrix.clone()));
        }

        fn render_forecasts(&self, view: ViewId, forecasts: &[Forecast]) {
            self.push(Event::Forecasts(view, forecasts.len()));
        }
    }

    type Controller = DashboardController<FakeBackend, RecordingSink>;

    fn controller() -> Controller {
        DashboardController::new(FakeBackend::default(), RecordingSink::default())
    }

    // -- fixtures -----------------------------------------------------------

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draw(date: NaiveDate, lottery: &str, schedule: &str, code: &str) -> DrawRecord {
        DrawRecord {
            date,
            lottery: lottery.to_string(),
            schedule: schedule.to_string(),
            animal_code: code.to_string(),
            animal_name: String::new(),
        }
    }

    fn reference() -> ReferenceSet {
        let assignments: HashMap<String, String> = [("08:00AM", "1"), ("09:00AM", "7"), ("10:00AM", "0")]
            .iter()
            .map(|(s, a)| (s.to_string(), a.to_string()))
            .collect();
        ReferenceSet::new(
            assignments,
            vec!["08:00AM".to_string(), "09:00AM".to_string(), "10:00AM".to_string()],
        )
    }

    fn candidate(date: NaiveDate, lottery: &str, futures: &[(&str, &str)]) -> CandidatePattern {
        CandidatePattern {
            date,
            lottery: lottery.to_string(),
            similarity: 66.7,
            hits: 2,
            total_comparisons: 3,
            total_future: futures.len() as u32,
            future_draws: futures.iter().map(|(s, a)| draw(date, lottery, s, a)).collect(),
        }
    }

    fn pattern_query() -> PatternQuery {
        PatternQuery {
            lottery: "LOTTO ACTIVO".to_string(),
            reference_date: ymd(2024, 3, 7),
            from: ymd(2024, 1, 1),
            to: ymd(2024, 3, 6),
            min_similarity: 30,
        }
    }

    fn forecast_query() -> ForecastQuery {
        ForecastQuery {
            lottery: "LOTTO ACTIVO".to_string(),
            reference_date: ymd(2024, 3, 7),
            from: ymd(2024, 1, 1),
            to: ymd(2024, 3, 6),
            top_n: Some(10),
        }
    }

    fn pattern_search() -> PatternSearch {
        let q = pattern_query();
        PatternSearch {
            lottery: q.lottery.clone(),
            reference_date: q.reference_date,
            from: q.from,
            to: q.to,
            candidates: vec![
                candidate(ymd(2024, 3, 2), "LOTTO ACTIVO", &[("09:00AM", "7"), ("10:00AM", "5"), ("11:00AM", "3")]),
                candidate(ymd(2024, 2, 20), "LOTTO ACTIVO", &[]),
            ],
            reference: reference(),
            total_analyzed: 60,
        }
    }

    fn coincidence_query(a: &str, b: &str) -> CoincidenceQuery {
        CoincidenceQuery {
            lottery: "LOTTO ACTIVO".to_string(),
            first_animal: a.to_string(),
            second_animal: b.to_string(),
            from: ymd(2024, 2, 1),
            to: ymd(2024, 3, 1),
        }
    }

    fn coincidence_search(total: u32) -> CoincidenceSearch {
        CoincidenceSearch {
            lottery: "LOTTO ACTIVO".to_string(),
            first_animal: "1".to_string(),
            second_animal: "2".to_string(),
            first_name: "CARNERO".to_string(),
            second_name: "TORO".to_string(),
            dates: (0..total)
                .map(|i| CoincidenceDate {
                    date: ymd(2024, 2, 5 + i),
                    first_schedule: "10:00AM".to_string(),
                    second_schedule: "11:00AM".to_string(),
                    position: 3,
                    draws_that_day: 11,
                })
                .collect(),
            total,
        }
    }

    fn forecast(code: &str) -> Forecast {
        Forecast {
            animal_code: code.to_string(),
            animal_name: String::new(),
            score: 1.0,
            frequency: None,
            appearances: None,
            sources: None,
            details: Vec::new(),
        }
    }

    fn statuses_of(rows: &[DetailRow]) -> Vec<DrawStatus> {
        rows.iter()
            .filter_map(|r| match r {
                DetailRow::Draw(c) => Some(c.status),
                _ => None,
            })
            .collect()
    }

    // -- pattern search -----------------------------------------------------

    #[tokio::test]
    async fn pattern_search_stores_and_reports() {
        let ctrl = controller();
        ctrl.backend().patterns.ready(pattern_search());

        let payload = ctrl.search_patterns(&pattern_query()).await.unwrap().unwrap();

        let Lookup::Active(cached) = ctrl.cache().get(ViewId::PatternSearch) else {
            panic!("search not cached");
        };
        assert!(Arc::ptr_eq(&cached, &payload));
        assert_eq!(
            ctrl.sink().last_status(ViewId::PatternSearch),
            "2 patterns found in 01/01/2024 – 06/03/2024."
        );
        let events = ctrl.sink().events();
        assert_eq!(events[0], Event::Clear(ViewId::PatternSearch));
        assert!(events.contains(&Event::Candidates(ViewId::PatternSearch, 2)));
    }

    #[tokio::test]
    async fn pattern_detail_classifies_hit_miss_future() {
        let ctrl = controller();
        ctrl.backend().patterns.ready(pattern_search());
        ctrl.search_patterns(&pattern_query()).await.unwrap();

        let rows = ctrl.show_pattern_detail(0);
        assert_eq!(statuses_of(&rows), vec![DrawStatus::Hit, DrawStatus::Miss, DrawStatus::Future]);
        assert!(ctrl.sink().events().contains(&Event::Rows(ViewId::PatternSearch, rows)));

        // Candidate without futures renders an empty table.
        assert!(ctrl.show_pattern_detail(1).is_empty());
    }

    #[tokio::test]
    async fn detail_without_search_or_out_of_range_renders_nothing() {
        let ctrl = controller();
        assert!(ctrl.show_pattern_detail(0).is_empty());
        assert!(ctrl.show_animal_detail(0).is_empty());
        assert!(ctrl.show_multi_lottery_detail(0).is_empty());
        assert!(ctrl.show_coincidence_day(0).await.unwrap().is_empty());
        assert!(ctrl.sink().events().is_empty());

        ctrl.backend().patterns.ready(pattern_search());
        ctrl.search_patterns(&pattern_query()).await.unwrap();
        let before = ctrl.sink().events().len();
        assert!(ctrl.show_pattern_detail(7).is_empty());
        assert_eq!(ctrl.sink().events().len(), before);
    }

    #[tokio::test]
    async fn rejection_leaves_view_empty() {
        let ctrl = controller();
        ctrl.backend().patterns.ready(pattern_search());
        ctrl.search_patterns(&pattern_query()).await.unwrap();

        ctrl.backend()
            .patterns
            .reply(Ok(Outcome::Rejected("No hay datos históricos".to_string())));
        let result = ctrl.search_patterns(&pattern_query()).await.unwrap();

        assert!(result.is_none());
        assert_eq!(ctrl.cache().get(ViewId::PatternSearch), Lookup::NoActiveSearch);
        assert_eq!(ctrl.sink().last_status(ViewId::PatternSearch), "No hay datos históricos");
    }

    #[tokio::test]
    async fn transport_failure_is_returned_and_shown() {
        let ctrl = controller();
        ctrl.backend().patterns.reply(Err(AppError::Server {
            status: 500,
            body: "boom".to_string(),
        }));

        let err = ctrl.search_patterns(&pattern_query()).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(ctrl.sink().last_status(ViewId::PatternSearch), "Error: HTTP 500: boom");
        assert!(!ctrl.cache().get(ViewId::PatternSearch).is_active());
    }

    #[tokio::test]
    async fn pattern_forecast_status() {
        let ctrl = controller();
        ctrl.backend().pattern_forecasts.ready(ForecastReport {
            forecasts: vec![forecast("5"), forecast("12")],
            best_similarity: Some(75.0),
            max_hits: None,
        });
        ctrl.forecast_patterns(&forecast_query()).await.unwrap();
        assert_eq!(
            ctrl.sink().last_status(ViewId::PatternSearch),
            "2 forecasts. Best similarity: 75%"
        );
        assert!(ctrl.sink().events().contains(&Event::Forecasts(ViewId::PatternSearch, 2)));
    }

    // -- overlapping requests -----------------------------------------------

    #[tokio::test]
    async fn stale_response_is_discarded() {
        let ctrl = controller();
        let first_gate = ctrl.backend().coincidences.gate();
        let second_gate = ctrl.backend().coincidences.gate();

        let q = coincidence_query("1", "2");
        let mut first = pin!(ctrl.search_coincidences(&q));
        let mut second = pin!(ctrl.search_coincidences(&q));
        assert!(poll!(first.as_mut()).is_pending());
        assert!(poll!(second.as_mut()).is_pending());

        // Newer request answers first.
        second_gate.send(Ok(Outcome::Ready(coincidence_search(3)))).unwrap();
        let newest = second.await.unwrap().unwrap();

        first_gate.send(Ok(Outcome::Ready(coincidence_search(1)))).unwrap();
        assert!(first.await.unwrap().is_none());

        let Lookup::Active(cached) = ctrl.cache().get(ViewId::CoincidenceSearch) else {
            panic!("search not cached");
        };
        assert!(Arc::ptr_eq(&cached, &newest));
        let rendered: Vec<Event> = ctrl
            .sink()
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Candidates(..)))
            .collect();
        assert_eq!(rendered, vec![Event::Candidates(ViewId::CoincidenceSearch, 3)]);
        assert_eq!(
            ctrl.sink().last_status(ViewId::CoincidenceSearch),
            "3 coincidences: 1(CARNERO) → 2(TORO)"
        );
    }

    #[tokio::test]
    async fn stale_rejection_is_not_shown() {
        let ctrl = controller();
        let old = ctrl.backend().coincidences.gate();
        let q = coincidence_query("1", "2");
        let mut first = pin!(ctrl.search_coincidences(&q));
        assert!(poll!(first.as_mut()).is_pending());

        ctrl.backend().coincidences.ready(coincidence_search(2));
        ctrl.search_coincidences(&q).await.unwrap();

        old.send(Ok(Outcome::Rejected("Sin datos".to_string()))).unwrap();
        assert!(first.await.unwrap().is_none());
        assert!(!ctrl.sink().statuses(ViewId::CoincidenceSearch).contains(&"Sin datos".to_string()));
    }

    // -- animal patterns ----------------------------------------------------

    fn animal_search() -> AnimalSearch {
        let date = ymd(2024, 1, 10);
        AnimalSearch {
            lottery: "LOTTO ACTIVO".to_string(),
            reference_date: ymd(2024, 3, 7),
            candidates: vec![AnimalPattern {
                pattern: CandidatePattern {
                    hits: 4,
                    ..candidate(date, "LOTTO ACTIVO", &[("", "00"), ("", "5")])
                },
                reference_animals: 8,
                historical_animals: 10,
            }],
            reference_animals: vec!["1".to_string(), "7".to_string()],
            total_analyzed: 30,
        }
    }

    #[tokio::test]
    async fn animal_search_loads_reference_first() {
        let ctrl = controller();
        let date = ymd(2024, 3, 7);
        ctrl.backend().reference.ready(vec![
            draw(date, "LOTTO ACTIVO", "08:00AM", "1"),
            draw(date, "LOTTO ACTIVO", "09:00AM", "7"),
        ]);
        ctrl.backend().animals.ready(animal_search());

        ctrl.search_animal_patterns(&pattern_query()).await.unwrap().unwrap();

        assert_eq!(ctrl.backend().calls(), vec!["reference_day", "animal_patterns"]);
        let statuses = ctrl.sink().statuses(ViewId::AnimalPatternSearch);
        assert!(statuses.contains(&"2 reference results loaded.".to_string()));
        assert_eq!(statuses.last().unwrap(), "1 patterns found. Max hits: 4.");
        assert!(ctrl.sink().events().contains(&Event::Reference(ViewId::AnimalPatternSearch, 2)));
    }

    #[tokio::test]
    async fn reference_day_of_superseded_animal_search_is_dropped() {
        let ctrl = controller();
        let date = ymd(2024, 3, 7);
        let first_reference = ctrl.backend().reference.gate();
        let second_reference = ctrl.backend().reference.gate();

        let q = pattern_query();
        let mut first = pin!(ctrl.search_animal_patterns(&q));
        assert!(poll!(first.as_mut()).is_pending());
        let mut second = pin!(ctrl.search_animal_patterns(&q));
        assert!(poll!(second.as_mut()).is_pending());

        let second_animals = ctrl.backend().animals.gate();
        second_reference
            .send(Ok(Outcome::Ready(vec![draw(date, "LOTTO ACTIVO", "08:00AM", "1")])))
            .unwrap();
        assert!(poll!(second.as_mut()).is_pending());
        second_animals.send(Ok(Outcome::Ready(animal_search()))).unwrap();
        second.await.unwrap().unwrap();
        let events_before = ctrl.sink().events().len();

        // The superseded search still asks for its patterns; leave that pending.
        let _first_animals = ctrl.backend().animals.gate();
        first_reference
            .send(Ok(Outcome::Ready(vec![
                draw(date, "LOTTO ACTIVO", "08:00AM", "5"),
                draw(date, "LOTTO ACTIVO", "09:00AM", "6"),
                draw(date, "LOTTO ACTIVO", "10:00AM", "7"),
            ])))
            .unwrap();
        assert!(poll!(first.as_mut()).is_pending());

        assert_eq!(ctrl.sink().events().len(), events_before);
        assert!(!ctrl.sink().events().contains(&Event::Reference(ViewId::AnimalPatternSearch, 3)));
        assert_eq!(
            ctrl.sink().last_status(ViewId::AnimalPatternSearch),
            "1 patterns found. Max hits: 4."
        );
    }

    #[tokio::test]
    async fn animal_search_survives_missing_reference() {
        let ctrl = controller();
        ctrl.backend().reference.reply(Err(AppError::Server {
            status: 502,
            body: String::new(),
        }));
        ctrl.backend().animals.ready(animal_search());

        assert!(ctrl.search_animal_patterns(&pattern_query()).await.unwrap().is_some());
        assert!(ctrl.cache().get(ViewId::AnimalPatternSearch).is_active());
    }

    #[tokio::test]
    async fn animal_detail_is_all_future() {
        let ctrl = controller();
        ctrl.backend().reference.ready(Vec::new());
        ctrl.backend().animals.ready(animal_search());
        ctrl.search_animal_patterns(&pattern_query()).await.unwrap();

        let rows = ctrl.show_animal_detail(0);
        assert_eq!(statuses_of(&rows), vec![DrawStatus::Future, DrawStatus::Future]);
    }

    #[tokio::test]
    async fn animal_forecast_status() {
        let ctrl = controller();
        ctrl.backend().animal_forecasts.ready(ForecastReport {
            forecasts: vec![forecast("3")],
            best_similarity: None,
            max_hits: Some(5),
        });
        ctrl.forecast_animals(&forecast_query()).await.unwrap();
        assert_eq!(ctrl.sink().last_status(ViewId::AnimalPatternSearch), "1 forecasts. Max hits: 5.");
    }

    // -- multi-lottery ------------------------------------------------------

    fn multi_query(lotteries: &[&str]) -> MultiLotteryQuery {
        MultiLotteryQuery {
            lottery: "LOTTO ACTIVO".to_string(),
            comparison_lotteries: lotteries.iter().map(|l| l.to_string()).collect(),
            reference_date: ymd(2024, 3, 7),
            from: ymd(2024, 1, 1),
            to: ymd(2024, 3, 6),
            min_similarity: 30,
        }
    }

    fn multi_search() -> MultiLotterySearch {
        let date = ymd(2024, 3, 1);
        MultiLotterySearch {
            lottery: "LOTTO ACTIVO".to_string(),
            reference_date: ymd(2024, 3, 7),
            candidates: vec![
                MultiLotteryPattern {
                    pattern: candidate(date, "LA GRANJITA", &[("09:00AM", "7"), ("11:00AM", "3")]),
                    reference_schedules: vec!["08:00AM".to_string(), "12:00PM".to_string()],
                },
                MultiLotteryPattern {
                    pattern: candidate(date, "LOTTO REY", &[("11:00AM", "3")]),
                    reference_schedules: Vec::new(),
                },
            ],
            reference: reference(),
        }
    }

    #[tokio::test]
    async fn multi_lottery_requires_comparison_lotteries() {
        let ctrl = controller();
        assert!(ctrl.search_multi_lottery(&multi_query(&[])).await.unwrap().is_none());
        assert!(ctrl.backend().calls().is_empty());
        assert_eq!(
            ctrl.sink().last_status(ViewId::MultiLotterySearch),
            "Select at least one lottery to compare against."
        );
    }

    #[tokio::test]
    async fn multi_lottery_detail_is_future_only_with_reference_rows() {
        let ctrl = controller();
        ctrl.backend().multi.ready(multi_search());
        ctrl.search_multi_lottery(&multi_query(&["LA GRANJITA", "LOTTO REY"])).await.unwrap();
        assert_eq!(
            ctrl.sink().last_status(ViewId::MultiLotterySearch),
            "2 multi-lottery patterns found."
        );

        // 09:00AM is a reference slot with the same animal; still FUTURE here.
        let rows = ctrl.show_multi_lottery_detail(0);
        assert_eq!(statuses_of(&rows), vec![DrawStatus::Future, DrawStatus::Future]);
        let refs: Vec<(String, Option<String>)> = rows
            .iter()
            .filter_map(|r| match r {
                DetailRow::Reference(r) => Some((r.schedule.clone(), r.animal_code.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            refs,
            vec![
                ("08:00AM".to_string(), Some("1".to_string())),
                ("12:00PM".to_string(), None),
            ]
        );

        // No per-pattern slots: fall back to the search-level ones.
        let rows = ctrl.show_multi_lottery_detail(1);
        assert_eq!(rows.len(), 1 + 3);
        assert!(matches!(rows[0], DetailRow::Draw(_)));
        assert!(rows[1..].iter().all(|r| matches!(r, DetailRow::Reference(_))));
    }

    // -- frequencies --------------------------------------------------------

    #[tokio::test]
    async fn frequencies_build_padded_matrix() {
        let ctrl = controller();
        let entry = |code: &str, f: u32| FrequencyEntry {
            animal_code: code.to_string(),
            animal_name: String::new(),
            frequency: f,
        };
        ctrl.backend().frequencies.ready(FrequencyReport {
            frequencies: FrequencyTable(vec![
                ("12".to_string(), vec![entry("3", 4)]),
                ("1".to_string(), vec![entry("5", 9), entry("7", 2)]),
            ]),
            total_days: 30,
            direction: Some(Direction::After),
        });
        let query = FrequencyQuery {
            lottery: "LOTTO ACTIVO".to_string(),
            from: ymd(2024, 2, 1),
            to: ymd(2024, 3, 1),
            direction: Direction::After,
        };

        let matrix = ctrl.analyze_frequencies(&query, TopN::parse("3")).await.unwrap().unwrap();

        assert_eq!(matrix.rows[0].reference_animal, "1");
        assert_eq!(matrix.rows[0].reference_name, "CARNERO");
        assert!(matrix.rows.iter().all(|r| r.top_entries.len() == 3));
        assert_eq!(matrix.rows[1].top_entries[1], MatrixCell::Padding);
        assert_eq!(
            ctrl.sink().last_status(ViewId::Frequencies),
            "2 animals. Top 3 animals AFTER."
        );
        assert!(ctrl.sink().events().contains(&Event::Matrix(matrix)));
    }

    // -- multi-forecast -----------------------------------------------------

    #[tokio::test]
    async fn multi_forecast_status() {
        let ctrl = controller();
        ctrl.backend().multi_forecasts.ready(ForecastReport {
            forecasts: vec![forecast("0"), forecast("00"), forecast("9")],
            best_similarity: None,
            max_hits: None,
        });
        let q = ForecastQuery { top_n: None, ..forecast_query() };
        ctrl.forecast_multi(&q).await.unwrap();
        assert_eq!(
            ctrl.sink().last_status(ViewId::MultiForecast),
            "3 multi-forecasts generated for LOTTO ACTIVO – 07/03/2024."
        );
    }

    // -- coincidences -------------------------------------------------------

    #[tokio::test]
    async fn identical_animals_are_refused() {
        let ctrl = controller();
        assert!(ctrl.search_coincidences(&coincidence_query("5", "5")).await.unwrap().is_none());
        assert!(ctrl.backend().calls().is_empty());
        assert_eq!(
            ctrl.sink().last_status(ViewId::CoincidenceSearch),
            "The two animals must be different."
        );
    }

    #[tokio::test]
    async fn coincidence_day_marks_both_slots() {
        let ctrl = controller();
        ctrl.backend().coincidences.ready(coincidence_search(1));
        ctrl.search_coincidences(&coincidence_query("1", "2")).await.unwrap();

        let day = ymd(2024, 2, 5);
        ctrl.backend().day.ready(vec![
            draw(day, "LOTTO ACTIVO", "09:00AM", "30"),
            draw(day, "LOTTO ACTIVO", "10:00AM", "1"),
            draw(day, "LOTTO ACTIVO", "11:00AM", "2"),
            draw(day, "LOTTO ACTIVO", "12:00PM", "4"),
        ]);
        let rows = ctrl.show_coincidence_day(0).await.unwrap();
        let tags: Vec<DayTag> = rows
            .iter()
            .filter_map(|r| match r {
                DetailRow::Day(t) => Some(t.tag),
                _ => None,
            })
            .collect();
        assert_eq!(
            tags,
            vec![DayTag::Normal, DayTag::Coincidence, DayTag::Coincidence, DayTag::Normal]
        );
        assert!(ctrl.show_coincidence_day(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn coincidence_day_of_replaced_search_is_dropped() {
        let ctrl = controller();
        ctrl.backend().coincidences.ready(coincidence_search(1));
        ctrl.search_coincidences(&coincidence_query("1", "2")).await.unwrap();

        let day_gate = ctrl.backend().day.gate();
        let mut day = pin!(ctrl.show_coincidence_day(0));
        assert!(poll!(day.as_mut()).is_pending());

        // A newer search completes while the day is still loading.
        ctrl.backend().coincidences.ready(coincidence_search(2));
        ctrl.search_coincidences(&coincidence_query("1", "2")).await.unwrap();
        let events_before = ctrl.sink().events().len();

        let date = ymd(2024, 2, 5);
        day_gate
            .send(Ok(Outcome::Ready(vec![draw(date, "LOTTO ACTIVO", "10:00AM", "1")])))
            .unwrap();
        assert!(day.await.unwrap().is_empty());
        assert_eq!(ctrl.sink().events().len(), events_before);
        assert_eq!(
            ctrl.sink().last_status(ViewId::CoincidenceSearch),
            "2 coincidences: 1(CARNERO) → 2(TORO)"
        );
    }

    #[tokio::test]
    async fn coincidence_day_error_of_replaced_search_is_not_shown() {
        let ctrl = controller();
        ctrl.backend().coincidences.ready(coincidence_search(1));
        ctrl.search_coincidences(&coincidence_query("1", "2")).await.unwrap();

        let day_gate = ctrl.backend().day.gate();
        let mut day = pin!(ctrl.show_coincidence_day(0));
        assert!(poll!(day.as_mut()).is_pending());

        ctrl.backend().coincidences.ready(coincidence_search(2));
        ctrl.search_coincidences(&coincidence_query("1", "2")).await.unwrap();

        day_gate
            .send(Err(AppError::Server { status: 502, body: String::new() }))
            .unwrap();
        assert!(day.await.is_err());
        assert!(!ctrl
            .sink()
            .statuses(ViewId::CoincidenceSearch)
            .iter()
            .any(|s| s.starts_with("Error:")));
    }
}
