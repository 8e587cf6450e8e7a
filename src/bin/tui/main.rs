mod app;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

use animalito_dashboard::analysis::{DayTag, DrawStatus, FrequencyMatrix, MatrixCell};
use animalito_dashboard::analysis::frequency::rank_label;
use animalito_dashboard::backend::HttpBackend;
use animalito_dashboard::config::Config;
use animalito_dashboard::controller::DashboardController;
use animalito_dashboard::dates::format_local;
use animalito_dashboard::error::Result;
use animalito_dashboard::sink::DetailRow;
use animalito_dashboard::status_poller::{StatusBoard, StatusPoller};
use animalito_dashboard::types::{Forecast, SearchPayload, ViewId};
use app::{Action, App, Form, TuiSink, ViewScreen};

type Controller = DashboardController<HttpBackend, TuiSink>;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Log lines would tear the alternate screen; only emit them when asked.
    let filter = EnvFilter::new(&cfg.log_level);
    if std::env::var_os("LOG_LEVEL").is_some() {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::sink).init();
    }

    let (backend, status_source) = match (HttpBackend::new(&cfg), HttpBackend::new(&cfg)) {
        (Ok(b), Ok(s)) => (b, Arc::new(s)),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let board = Arc::new(StatusBoard::new());
    tokio::spawn(StatusPoller::new(status_source, Arc::clone(&board), cfg.status_poll_interval_secs).run());

    let ctrl = Arc::new(DashboardController::new(backend, TuiSink::default()));
    let mut app = App::new(&cfg, board);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &ctrl);

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    ctrl: &Arc<Controller>,
) -> io::Result<()> {
    // Searches run on spawned tasks; redraw often enough to pick up results.
    let frame_interval = Duration::from_millis(200);

    loop {
        let screen = ctrl.sink().view(app.view());
        terminal.draw(|f| render(f, app, &screen))?;

        if event::poll(frame_interval)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let rows = screen.candidates.as_ref().map_or(0, |c| c.len());
                match app.on_key(key.code, rows) {
                    Action::Quit => return Ok(()),
                    Action::None => {}
                    action => dispatch(ctrl, &app.form, action),
                }
            }
        }
    }
}

fn report<T>(what: &str, result: Result<T>) {
    if let Err(e) = result {
        error!("{what} failed: {e}");
    }
}

fn dispatch(ctrl: &Arc<Controller>, form: &Form, action: Action) {
    let ctrl = Arc::clone(ctrl);
    match action {
        Action::Search(ViewId::PatternSearch) => {
            let query = form.pattern_query();
            tokio::spawn(async move {
                let loaded = ctrl
                    .load_reference_day(ViewId::PatternSearch, &query.lottery, query.reference_date)
                    .await;
                report("Reference day", loaded);
                report("Pattern search", ctrl.search_patterns(&query).await);
            });
        }
        Action::Search(ViewId::AnimalPatternSearch) => {
            let query = form.pattern_query();
            tokio::spawn(async move {
                report("Animal pattern search", ctrl.search_animal_patterns(&query).await);
            });
        }
        Action::Search(ViewId::MultiLotterySearch) => {
            let query = form.multi_lottery_query();
            tokio::spawn(async move {
                report("Multi-lottery search", ctrl.search_multi_lottery(&query).await);
            });
        }
        Action::Search(ViewId::Frequencies) => {
            let query = form.frequency_query();
            let top_n = form.top_n;
            tokio::spawn(async move {
                report("Frequency analysis", ctrl.analyze_frequencies(&query, top_n).await);
            });
        }
        Action::Search(ViewId::MultiForecast) => {
            let query = form.forecast_query(None);
            tokio::spawn(async move {
                report("Multi forecast", ctrl.forecast_multi(&query).await);
            });
        }
        Action::Search(ViewId::CoincidenceSearch) => {
            let query = form.coincidence_query();
            tokio::spawn(async move {
                report("Coincidence search", ctrl.search_coincidences(&query).await);
            });
        }
        Action::Forecast(ViewId::PatternSearch) => {
            let query = form.forecast_query(Some(form.forecast_top));
            tokio::spawn(async move {
                report("Pattern forecast", ctrl.forecast_patterns(&query).await);
            });
        }
        Action::Forecast(ViewId::AnimalPatternSearch) => {
            let query = form.forecast_query(Some(form.forecast_top));
            tokio::spawn(async move {
                report("Animal forecast", ctrl.forecast_animals(&query).await);
            });
        }
        Action::Detail(ViewId::PatternSearch, i) => {
            ctrl.show_pattern_detail(i);
        }
        Action::Detail(ViewId::AnimalPatternSearch, i) => {
            ctrl.show_animal_detail(i);
        }
        Action::Detail(ViewId::MultiLotterySearch, i) => {
            ctrl.show_multi_lottery_detail(i);
        }
        Action::Detail(ViewId::CoincidenceSearch, i) => {
            tokio::spawn(async move {
                report("Coincidence day", ctrl.show_coincidence_day(i).await);
            });
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &App, screen: &ViewScreen) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_tabs(f, app, chunks[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[2]);

    match app.view() {
        ViewId::Frequencies => render_matrix(f, screen.matrix.as_ref(), chunks[2]),
        ViewId::MultiForecast => render_forecasts(f, &screen.forecasts, " MULTI-FORECAST ", chunks[2]),
        _ => {
            render_candidates(f, app, screen, body[0]);
            render_side(f, screen, body[1]);
        }
    }

    let status = Paragraph::new(Line::from(Span::styled(
        format!(" {}", screen.status),
        Style::default().fg(Color::Cyan),
    )));
    f.render_widget(status, chunks[3]);
    render_footer(f, app.view(), chunks[4]);
}

fn header_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn titled_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)))
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let form = &app.form;
    let scraping_color = if app.board.reachable() {
        if app.board.active() {
            Color::Green
        } else {
            Color::Yellow
        }
    } else {
        Color::DarkGray
    };

    let mut spans = vec![
        Span::styled(" ANIMALITOS ", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(form.lottery(), Style::default().fg(Color::Cyan)),
        Span::raw(format!(
            "  ref {}  range {} – {}  ",
            format_local(form.reference_date),
            format_local(form.from),
            format_local(form.to)
        )),
    ];
    match app.view() {
        ViewId::Frequencies => spans.push(Span::raw(format!(
            "top {}  {}  ",
            form.top_n.get(),
            form.direction
        ))),
        ViewId::CoincidenceSearch => {
            let (a, a_name) = form.first_animal();
            let (b, b_name) = form.second_animal();
            spans.push(Span::raw(format!("{a}({a_name}) → {b}({b_name})  ")));
        }
        ViewId::MultiForecast => {}
        _ => spans.push(Span::raw(format!("min {}%  ", form.min_similarity))),
    }
    spans.push(Span::raw("│ "));
    spans.push(Span::styled(app.auto_scraping_label(), Style::default().fg(scraping_color)));

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(header, area);
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let active = app.view();
    let mut spans = vec![Span::raw(" ")];
    for view in ViewId::ALL {
        let style = if view == active {
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {} ", view.title()), style));
        spans.push(Span::raw(" "));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_candidates(f: &mut Frame, app: &App, screen: &ViewScreen, area: Rect) {
    let (headers, widths, rows): (&[&str], Vec<Constraint>, Vec<Row>) = match screen.candidates.as_deref() {
        Some(SearchPayload::Patterns(s)) => (
            &["#", "Date", "Similarity", "Hits", "Compared", "Futures"],
            vec![
                Constraint::Length(4),
                Constraint::Length(11),
                Constraint::Length(11),
                Constraint::Length(5),
                Constraint::Length(9),
                Constraint::Length(8),
            ],
            s.candidates
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    Row::new(vec![
                        Cell::from(i.to_string()).style(Style::default().fg(Color::DarkGray)),
                        Cell::from(format_local(c.date)),
                        Cell::from(format!("{:.1}%", c.similarity)).style(similarity_style(c.similarity)),
                        Cell::from(c.hits.to_string()),
                        Cell::from(c.total_comparisons.to_string()),
                        Cell::from(c.total_future.to_string()),
                    ])
                })
                .collect(),
        ),
        Some(SearchPayload::Animals(s)) => (
            &["#", "Date", "Hits", "Similarity", "Ref", "Hist", "Futures"],
            vec![
                Constraint::Length(4),
                Constraint::Length(11),
                Constraint::Length(5),
                Constraint::Length(11),
                Constraint::Length(4),
                Constraint::Length(5),
                Constraint::Length(8),
            ],
            s.candidates
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    Row::new(vec![
                        Cell::from(i.to_string()).style(Style::default().fg(Color::DarkGray)),
                        Cell::from(format_local(c.pattern.date)),
                        Cell::from(c.pattern.hits.to_string()).style(Style::default().fg(Color::Green)),
                        Cell::from(format!("{:.1}%", c.pattern.similarity)),
                        Cell::from(c.reference_animals.to_string()),
                        Cell::from(c.historical_animals.to_string()),
                        Cell::from(c.pattern.total_future.to_string()),
                    ])
                })
                .collect(),
        ),
        Some(SearchPayload::MultiLottery(s)) => (
            &["#", "Lottery", "Date", "Similarity", "Hits", "Compared"],
            vec![
                Constraint::Length(4),
                Constraint::Min(12),
                Constraint::Length(11),
                Constraint::Length(11),
                Constraint::Length(5),
                Constraint::Length(9),
            ],
            s.candidates
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    Row::new(vec![
                        Cell::from(i.to_string()).style(Style::default().fg(Color::DarkGray)),
                        Cell::from(truncate(&c.pattern.lottery, 16)),
                        Cell::from(format_local(c.pattern.date)),
                        Cell::from(format!("{:.1}%", c.pattern.similarity))
                            .style(similarity_style(c.pattern.similarity)),
                        Cell::from(c.pattern.hits.to_string()),
                        Cell::from(c.pattern.total_comparisons.to_string()),
                    ])
                })
                .collect(),
        ),
        Some(SearchPayload::Coincidences(s)) => (
            &["#", "Date", "First", "Second", "Position", "Draws"],
            vec![
                Constraint::Length(4),
                Constraint::Length(11),
                Constraint::Length(9),
                Constraint::Length(9),
                Constraint::Length(9),
                Constraint::Length(6),
            ],
            s.dates
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    Row::new(vec![
                        Cell::from(i.to_string()).style(Style::default().fg(Color::DarkGray)),
                        Cell::from(format_local(d.date)),
                        Cell::from(d.first_schedule.clone()),
                        Cell::from(d.second_schedule.clone()),
                        Cell::from(d.position.to_string()),
                        Cell::from(d.draws_that_day.to_string()),
                    ])
                })
                .collect(),
        ),
        None => (&[], vec![Constraint::Min(0)], Vec::new()),
    };

    let header = Row::new(headers.iter().map(|h| Cell::from(*h).style(header_style()))).height(1);
    let title = format!(" {} ", app.view().title().to_uppercase());
    let table = Table::new(rows, widths)
        .header(header)
        .block(titled_block(&title))
        .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    let mut state = TableState::default().with_selected(app.selected);
    f.render_stateful_widget(table, area, &mut state);
}

/// Reference day above, detail rows and forecasts below.
fn render_side(f: &mut Frame, screen: &ViewScreen, area: Rect) {
    let mut constraints = Vec::new();
    if !screen.reference.is_empty() {
        constraints.push(Constraint::Length(screen.reference.len().min(12) as u16 + 3));
    }
    constraints.push(Constraint::Min(5));
    if !screen.forecasts.is_empty() {
        constraints.push(Constraint::Length(screen.forecasts.len().min(10) as u16 + 3));
    }
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next = 0;
    if !screen.reference.is_empty() {
        let rows = screen.reference.iter().map(|d| {
            Row::new(vec![
                Cell::from(d.schedule.clone()),
                Cell::from(d.animal_code.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(d.animal_name.clone()),
            ])
        });
        let table = Table::new(rows, [Constraint::Length(8), Constraint::Length(4), Constraint::Min(10)])
            .header(Row::new(["Slot", "Code", "Animal"].map(|h| Cell::from(h).style(header_style()))))
            .block(titled_block(" REFERENCE DAY "));
        f.render_widget(table, parts[next]);
        next += 1;
    }

    let rows = screen.rows.iter().map(detail_row);
    let table = Table::new(
        rows,
        [Constraint::Length(8), Constraint::Length(4), Constraint::Min(10), Constraint::Length(7)],
    )
    .header(Row::new(["Slot", "Code", "Animal", "Status"].map(|h| Cell::from(h).style(header_style()))))
    .block(titled_block(" DETAIL "));
    f.render_widget(table, parts[next]);
    next += 1;

    if !screen.forecasts.is_empty() {
        render_forecasts(f, &screen.forecasts, " FORECAST ", parts[next]);
    }
}

fn detail_row(row: &DetailRow) -> Row<'static> {
    let (schedule, code, name, label, color) = match row {
        DetailRow::Draw(c) => {
            let color = match c.status {
                DrawStatus::Hit => Color::Green,
                DrawStatus::Miss => Color::Red,
                DrawStatus::Future => Color::Magenta,
            };
            let schedule = if c.draw.schedule.is_empty() { "–".to_string() } else { c.draw.schedule.clone() };
            (schedule, c.draw.animal_code.clone(), c.draw.animal_name.clone(), c.status.to_string(), color)
        }
        DetailRow::Reference(r) => (
            r.schedule.clone(),
            r.animal_code.clone().unwrap_or_else(|| "N/A".to_string()),
            r.animal_name.clone(),
            "REF".to_string(),
            Color::Cyan,
        ),
        DetailRow::Day(t) => {
            let color = match t.tag {
                DayTag::Coincidence => Color::Yellow,
                DayTag::Normal => Color::White,
            };
            (t.draw.schedule.clone(), t.draw.animal_code.clone(), t.draw.animal_name.clone(), t.tag.to_string(), color)
        }
    };
    Row::new(vec![
        Cell::from(schedule),
        Cell::from(code),
        Cell::from(name),
        Cell::from(label).style(Style::default().fg(color)),
    ])
}

fn render_forecasts(f: &mut Frame, forecasts: &[Forecast], title: &str, area: Rect) {
    let rows = forecasts.iter().enumerate().map(|(i, fc)| {
        let mut extra = Vec::new();
        if let Some(freq) = fc.frequency {
            extra.push(format!("freq {freq:.2}"));
        }
        if let Some(days) = fc.appearances {
            extra.push(format!("days {days}"));
        }
        if let Some(sources) = fc.sources {
            extra.push(format!("sources {sources}"));
        }
        extra.extend(fc.details.iter().cloned());
        Row::new(vec![
            Cell::from(rank_label(i + 1)),
            Cell::from(fc.animal_code.clone()).style(Style::default().fg(Color::Cyan)),
            Cell::from(fc.animal_name.clone()),
            Cell::from(format!("{:.2}", fc.score)).style(Style::default().fg(Color::Green)),
            Cell::from(extra.join(" | ")).style(Style::default().fg(Color::DarkGray)),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Min(10),
        ],
    )
    .header(Row::new(["Rank", "Code", "Animal", "Score", "Details"].map(|h| Cell::from(h).style(header_style()))))
    .block(titled_block(title));
    f.render_widget(table, area);
}

fn render_matrix(f: &mut Frame, matrix: Option<&FrequencyMatrix>, area: Rect) {
    let Some(matrix) = matrix else {
        f.render_widget(Paragraph::new("").block(titled_block(" FREQUENCIES ")), area);
        return;
    };

    let header = Row::new(matrix.header_labels().into_iter().map(|h| Cell::from(h).style(header_style())));
    let rows = matrix.rows.iter().map(|row| {
        let mut cells = vec![
            Cell::from(row.reference_animal.clone()).style(Style::default().fg(Color::Cyan)),
            Cell::from(truncate(&row.reference_name, 10)),
        ];
        for cell in &row.top_entries {
            match cell {
                MatrixCell::Entry(e) => {
                    cells.push(Cell::from(e.animal_code.clone()).style(Style::default().fg(Color::Cyan)));
                    cells.push(Cell::from(truncate(&e.animal_name, 8)));
                    cells.push(Cell::from(e.frequency.to_string()).style(Style::default().fg(Color::Green)));
                }
                MatrixCell::Padding => cells.extend([Cell::from(""), Cell::from(""), Cell::from("")]),
            }
        }
        Row::new(cells)
    });

    let mut widths = vec![Constraint::Length(3), Constraint::Length(10)];
    for _ in 0..matrix.top_n.get() {
        widths.extend([Constraint::Length(3), Constraint::Length(8), Constraint::Length(4)]);
    }
    let title = format!(" FREQUENCIES · {} ", matrix.direction);
    let table = Table::new(rows, widths).header(header).block(titled_block(&title));
    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, view: ViewId, area: Rect) {
    let key = Style::default().fg(Color::Yellow);
    let mut spans = vec![
        Span::styled(" [q] ", key),
        Span::raw("quit  "),
        Span::styled("[Tab] ", key),
        Span::raw("view  "),
        Span::styled("[s] ", key),
        Span::raw("search  "),
        Span::styled("[l] ", key),
        Span::raw("lottery  "),
        Span::styled("[[ ] { }] ", key),
        Span::raw("dates  "),
    ];
    match view {
        ViewId::Frequencies => {
            spans.extend([Span::styled("[+/-] ", key), Span::raw("top N  "), Span::styled("[d] ", key), Span::raw("direction")]);
        }
        ViewId::CoincidenceSearch => {
            spans.extend([
                Span::styled("[a/b] ", key),
                Span::raw("animals  "),
                Span::styled("[↑↓ Enter] ", key),
                Span::raw("day"),
            ]);
        }
        ViewId::MultiForecast => {}
        _ => {
            spans.extend([
                Span::styled("[+/-] ", key),
                Span::raw("similarity  "),
                Span::styled("[↑↓ Enter] ", key),
                Span::raw("detail"),
            ]);
            if matches!(view, ViewId::PatternSearch | ViewId::AnimalPatternSearch) {
                spans.extend([Span::styled("  [f] ", key), Span::raw("forecast")]);
            }
        }
    }
    f.render_widget(Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::White)), area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn similarity_style(similarity: f64) -> Style {
    let color = if similarity >= 70.0 {
        Color::Green
    } else if similarity >= 50.0 {
        Color::Yellow
    } else {
        Color::White
    };
    Style::default().fg(color)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
