use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use animalito_dashboard::analysis::TopN;
use animalito_dashboard::backend::{
    CoincidenceQuery, ForecastQuery, FrequencyQuery, HttpBackend, MultiLotteryQuery, Outcome,
    PatternQuery, ResultsQuery, ScrapingRequest,
};
use animalito_dashboard::catalog;
use animalito_dashboard::config::{Config, DEFAULT_RANGE_DAYS};
use animalito_dashboard::controller::DashboardController;
use animalito_dashboard::dates::{format_local, parse_any};
use animalito_dashboard::error::{AppError, Result};
use animalito_dashboard::sink::{reference_day_lines, ConsoleSink};
use animalito_dashboard::status_poller::{StatusBoard, StatusPoller};
use animalito_dashboard::types::{AutoScrapingStatus, Direction, ViewId};

type Controller = DashboardController<HttpBackend, ConsoleSink>;

#[derive(Parser)]
#[command(name = "dashboard", about = "Animalitos results and pattern analysis client")]
struct Cli {
    /// Lottery to analyse (defaults to DEFAULT_LOTTERY)
    #[arg(short, long, global = true)]
    lottery: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Date window shared by most analyses. Dates accept `YYYY-MM-DD` or `DD/MM/YYYY`.
#[derive(clap::Args, Clone)]
struct Range {
    /// First day of the history window (default: 90 days before --to)
    #[arg(long)]
    from: Option<String>,

    /// Last day of the history window (default: today)
    #[arg(long)]
    to: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    After,
    Before,
}

impl From<DirectionArg> for Direction {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::After => Direction::After,
            DirectionArg::Before => Direction::Before,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
enum Command {
    /// Show the results of one day
    Reference {
        /// Day to show (default: today)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Historical days whose slots match the reference day
    Patterns {
        /// Reference day (default: today)
        #[arg(short, long)]
        date: Option<String>,

        #[command(flatten)]
        range: Range,

        /// Minimum similarity percent (default: MIN_SIMILARITY)
        #[arg(long)]
        min_similarity: Option<u32>,

        /// Expand one candidate by index
        #[arg(long)]
        detail: Option<usize>,

        /// Also request forecasts, keeping the best N
        #[arg(long)]
        forecast: Option<u32>,
    },

    /// Historical days sharing animals with the reference day, in any slot
    Animals {
        #[arg(short, long)]
        date: Option<String>,

        #[command(flatten)]
        range: Range,

        #[arg(long)]
        min_similarity: Option<u32>,

        #[arg(long)]
        detail: Option<usize>,

        #[arg(long)]
        forecast: Option<u32>,
    },

    /// Compare the reference day against other lotteries
    Multi {
        #[arg(short, long)]
        date: Option<String>,

        /// Lottery to compare against (repeatable)
        #[arg(short, long = "compare")]
        compare: Vec<String>,

        #[command(flatten)]
        range: Range,

        #[arg(long)]
        min_similarity: Option<u32>,

        #[arg(long)]
        detail: Option<usize>,
    },

    /// Top-N follow-up frequency matrix
    Frequencies {
        #[command(flatten)]
        range: Range,

        #[arg(long, value_enum, default_value = "after")]
        direction: DirectionArg,

        /// Columns per animal, 1 to 10
        #[arg(long, default_value = "10")]
        top: String,
    },

    /// Combined forecast across every analysis
    Forecast {
        #[arg(short, long)]
        date: Option<String>,

        #[command(flatten)]
        range: Range,
    },

    /// Days where one animal was immediately followed by another
    Coincidences {
        /// First animal code
        first: String,

        /// Second animal code
        second: String,

        #[command(flatten)]
        range: Range,

        /// Show the whole day of one coincidence by index
        #[arg(long)]
        day: Option<usize>,
    },

    /// Stored results, optionally filtered
    Results {
        #[command(flatten)]
        range: Range,

        /// Only this schedule, e.g. 09:00AM
        #[arg(long)]
        schedule: Option<String>,
    },

    /// Database totals and covered dates
    Stats,

    /// Scrape historical results for a date range
    Scrape {
        #[command(flatten)]
        range: Range,

        /// Lottery to scrape (repeatable; default: all known)
        #[arg(long = "only")]
        only: Vec<String>,
    },

    /// Turn background scraping on or off
    AutoScraping {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Auto-scraping status
    Status {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Detect duplicate results
    Duplicates {
        /// Delete them, keeping the newest row of each group
        #[arg(long)]
        remove: bool,
    },

    /// Known animals, lotteries and schedules
    Catalog,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli, cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cfg: Config) -> Result<()> {
    let lottery = resolve_lottery(cli.lottery, &cfg);
    let ctrl = DashboardController::new(HttpBackend::new(&cfg)?, ConsoleSink);
    info!(api = %ctrl.backend().base_url(), lottery = %lottery, "dashboard ready");

    match cli.command {
        Command::Reference { date } => {
            let date = parse_date_or_today(date.as_deref())?;
            ctrl.load_reference_day(ViewId::PatternSearch, &lottery, date).await?;
            Ok(())
        }
        Command::Patterns { date, range, min_similarity, detail, forecast } => {
            let query = pattern_query(&cfg, lottery, date, &range, min_similarity)?;
            cmd_patterns(&ctrl, &query, detail, forecast).await
        }
        Command::Animals { date, range, min_similarity, detail, forecast } => {
            let query = pattern_query(&cfg, lottery, date, &range, min_similarity)?;
            cmd_animals(&ctrl, &query, detail, forecast).await
        }
        Command::Multi { date, compare, range, min_similarity, detail } => {
            let (from, to) = resolve_range(&range)?;
            for name in &compare {
                check_lottery(name);
            }
            let query = MultiLotteryQuery {
                lottery,
                comparison_lotteries: compare,
                reference_date: parse_date_or_today(date.as_deref())?,
                from,
                to,
                min_similarity: min_similarity.unwrap_or(cfg.min_similarity),
            };
            let found = ctrl.search_multi_lottery(&query).await?;
            if let (Some(_), Some(i)) = (found, detail) {
                ctrl.show_multi_lottery_detail(i);
            }
            Ok(())
        }
        Command::Frequencies { range, direction, top } => {
            let (from, to) = resolve_range(&range)?;
            let query = FrequencyQuery { lottery, from, to, direction: direction.into() };
            ctrl.analyze_frequencies(&query, TopN::parse(&top)).await?;
            Ok(())
        }
        Command::Forecast { date, range } => {
            let (from, to) = resolve_range(&range)?;
            let query = ForecastQuery {
                lottery,
                reference_date: parse_date_or_today(date.as_deref())?,
                from,
                to,
                top_n: None,
            };
            ctrl.forecast_multi(&query).await?;
            Ok(())
        }
        Command::Coincidences { first, second, range, day } => {
            check_animal(&first)?;
            check_animal(&second)?;
            let (from, to) = resolve_range(&range)?;
            let query = CoincidenceQuery {
                lottery,
                first_animal: first,
                second_animal: second,
                from,
                to,
            };
            let found = ctrl.search_coincidences(&query).await?;
            if let (Some(_), Some(i)) = (found, day) {
                ctrl.show_coincidence_day(i).await?;
            }
            Ok(())
        }
        Command::Results { range, schedule } => cmd_results(&ctrl, lottery, &range, schedule).await,
        Command::Stats => cmd_stats(&ctrl).await,
        Command::Scrape { range, only } => cmd_scrape(&ctrl, &range, only).await,
        Command::AutoScraping { state } => {
            let status = ctrl.backend().set_auto_scraping(matches!(state, Toggle::On)).await?;
            print_status(&status);
            Ok(())
        }
        Command::Status { watch } => cmd_status(&cfg, watch).await,
        Command::Duplicates { remove } => cmd_duplicates(&ctrl, remove).await,
        Command::Catalog => {
            cmd_catalog();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Argument resolution
// ---------------------------------------------------------------------------

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_date_or_today(raw: Option<&str>) -> Result<NaiveDate> {
    raw.map(parse_any).transpose().map(|d| d.unwrap_or_else(today))
}

fn resolve_range(range: &Range) -> Result<(NaiveDate, NaiveDate)> {
    let to = parse_date_or_today(range.to.as_deref())?;
    let from = match range.from.as_deref() {
        Some(raw) => parse_any(raw)?,
        None => to - chrono::Duration::days(DEFAULT_RANGE_DAYS),
    };
    if from > to {
        return Err(AppError::InvalidArgument(format!(
            "--from {} is after --to {}",
            format_local(from),
            format_local(to)
        )));
    }
    Ok((from, to))
}

fn resolve_lottery(arg: Option<String>, cfg: &Config) -> String {
    let lottery = arg.unwrap_or_else(|| cfg.default_lottery.clone());
    check_lottery(&lottery);
    lottery
}

fn check_lottery(name: &str) {
    if !catalog::is_lottery(name) {
        warn!(lottery = %name, "lottery not in the catalog; sending as given");
    }
}

fn check_animal(code: &str) -> Result<()> {
    if catalog::is_animal(code) {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(format!("unknown animal code {code:?}")))
    }
}

fn pattern_query(
    cfg: &Config,
    lottery: String,
    date: Option<String>,
    range: &Range,
    min_similarity: Option<u32>,
) -> Result<PatternQuery> {
    let (from, to) = resolve_range(range)?;
    let min_similarity = min_similarity.unwrap_or(cfg.min_similarity);
    if min_similarity > 100 {
        return Err(AppError::InvalidArgument("--min-similarity must be 0-100".to_string()));
    }
    Ok(PatternQuery {
        lottery,
        reference_date: parse_date_or_today(date.as_deref())?,
        from,
        to,
        min_similarity,
    })
}

fn forecast_query(query: &PatternQuery, top_n: u32) -> ForecastQuery {
    ForecastQuery {
        lottery: query.lottery.clone(),
        reference_date: query.reference_date,
        from: query.from,
        to: query.to,
        top_n: Some(top_n),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_patterns(ctrl: &Controller, query: &PatternQuery, detail: Option<usize>, forecast: Option<u32>) -> Result<()> {
    ctrl.load_reference_day(ViewId::PatternSearch, &query.lottery, query.reference_date)
        .await?;
    let found = ctrl.search_patterns(query).await?;
    if let (Some(_), Some(i)) = (found, detail) {
        ctrl.show_pattern_detail(i);
    }
    if let Some(top_n) = forecast {
        ctrl.forecast_patterns(&forecast_query(query, top_n)).await?;
    }
    Ok(())
}

async fn cmd_animals(ctrl: &Controller, query: &PatternQuery, detail: Option<usize>, forecast: Option<u32>) -> Result<()> {
    let found = ctrl.search_animal_patterns(query).await?;
    if let (Some(_), Some(i)) = (found, detail) {
        ctrl.show_animal_detail(i);
    }
    if let Some(top_n) = forecast {
        ctrl.forecast_animals(&forecast_query(query, top_n)).await?;
    }
    Ok(())
}

async fn cmd_results(ctrl: &Controller, lottery: String, range: &Range, schedule: Option<String>) -> Result<()> {
    let (from, to) = resolve_range(range)?;
    let query = ResultsQuery {
        from,
        to,
        lottery: Some(lottery),
        schedule,
    };
    match ctrl.backend().results(&query).await? {
        Outcome::Ready(mut draws) => {
            draws.sort_by(|a, b| {
                b.date
                    .cmp(&a.date)
                    .then_with(|| a.lottery.cmp(&b.lottery))
                    .then_with(|| catalog::schedule_minutes(&a.schedule).cmp(&catalog::schedule_minutes(&b.schedule)))
            });
            let mut current: Option<NaiveDate> = None;
            for d in &draws {
                if current != Some(d.date) {
                    println!("{}  {}", format_local(d.date), d.lottery);
                    current = Some(d.date);
                }
                for line in reference_day_lines(std::slice::from_ref(d)) {
                    println!("  {line}");
                }
            }
            println!("{} results.", draws.len());
        }
        Outcome::Rejected(message) => println!("{message}"),
    }
    Ok(())
}

async fn cmd_stats(ctrl: &Controller) -> Result<()> {
    match ctrl.backend().stats().await? {
        Outcome::Ready(stats) => {
            println!("Total results: {}", stats.total);
            println!("First date:    {}", stats.first_date.as_deref().unwrap_or("N/A"));
            println!("Last date:     {}", stats.last_date.as_deref().unwrap_or("N/A"));
        }
        Outcome::Rejected(message) => println!("{message}"),
    }
    Ok(())
}

async fn cmd_scrape(ctrl: &Controller, range: &Range, only: Vec<String>) -> Result<()> {
    let (from, to) = resolve_range(range)?;
    let lotteries = if only.is_empty() {
        catalog::LOTTERIES.iter().map(|l| l.to_string()).collect()
    } else {
        only
    };
    let req = ScrapingRequest { from, to, lotteries };
    match ctrl.backend().start_scraping(&req).await? {
        Outcome::Ready(total) => println!("Scrape finished: {total} results stored."),
        Outcome::Rejected(message) => println!("Scrape failed: {message}"),
    }
    Ok(())
}

async fn cmd_duplicates(ctrl: &Controller, remove: bool) -> Result<()> {
    match ctrl.backend().duplicates().await? {
        Outcome::Ready(report) => println!(
            "{} duplicate groups, {} duplicated rows.",
            report.groups, report.records
        ),
        Outcome::Rejected(message) => {
            println!("{message}");
            return Ok(());
        }
    }
    if remove {
        match ctrl.backend().remove_duplicates().await? {
            Outcome::Ready(removed) => println!("{removed} rows removed."),
            Outcome::Rejected(message) => println!("Removal failed: {message}"),
        }
    }
    Ok(())
}

async fn cmd_status(cfg: &Config, watch: bool) -> Result<()> {
    let board = Arc::new(StatusBoard::new());
    let poller = StatusPoller::new(
        Arc::new(HttpBackend::new(cfg)?),
        Arc::clone(&board),
        cfg.status_poll_interval_secs,
    );

    if !watch {
        poller.poll_once().await?;
        print_status(&board.snapshot());
        return Ok(());
    }

    let handle = tokio::spawn(poller.run());
    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.status_poll_interval_secs));
    let mut last_seen: Option<AutoScrapingStatus> = None;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !board.reachable() {
                    continue;
                }
                let snapshot = board.snapshot();
                if last_seen.as_ref() != Some(&snapshot) {
                    print_status(&snapshot);
                    last_seen = Some(snapshot);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    handle.abort();
    Ok(())
}

fn print_status(status: &AutoScrapingStatus) {
    let state = if status.active { "on" } else { "off" };
    println!("Auto-scraping {state}. Last update: {}", status.last_update);
}

fn cmd_catalog() {
    println!("Lotteries:");
    for lottery in catalog::LOTTERIES {
        println!("  {lottery}");
    }
    println!("Schedules: {}", catalog::SCHEDULES.join(" "));
    println!("Animals:");
    for chunk in catalog::ANIMALS.chunks(4) {
        let line: Vec<String> = chunk.iter().map(|(code, name)| format!("{code:>3} {name:<15}")).collect();
        println!("  {}", line.join(""));
    }
}
