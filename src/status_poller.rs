//! Auto-scraping "last updated" indicator, refreshed on a fixed interval.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, error};

use crate::backend::StatusSource;
use crate::error::Result;
use crate::types::AutoScrapingStatus;

/// Latest auto-scraping status. Written by the poller, read by the front-ends.
#[derive(Debug, Default)]
pub struct StatusBoard {
    active: AtomicBool,
    /// False until the first successful poll, and after any failed one.
    reachable: AtomicBool,
    failures: AtomicU64,
    last_update: RwLock<String>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, status: AutoScrapingStatus) {
        self.active.store(status.active, Ordering::Relaxed);
        self.reachable.store(true, Ordering::Relaxed);
        if let Ok(mut last) = self.last_update.write() {
            *last = status.last_update;
        }
    }

    /// Previous values are kept; only reachability changes.
    pub fn mark_failed(&self) {
        self.reachable.store(false, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn last_update(&self) -> String {
        self.last_update.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> AutoScrapingStatus {
        AutoScrapingStatus {
            active: self.active(),
            last_update: self.last_update(),
        }
    }
}

/// Background task polling the auto-scraping status endpoint.
pub struct StatusPoller<S> {
    source: Arc<S>,
    board: Arc<StatusBoard>,
    period: Duration,
}

impl<S: StatusSource> StatusPoller<S> {
    pub fn new(source: Arc<S>, board: Arc<StatusBoard>, interval_secs: u64) -> Self {
        Self {
            source,
            board,
            period: Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub async fn run(self) {
        // First tick fires immediately so the indicator fills in on startup.
        let mut ticker = interval(self.period);

        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once().await {
                error!("Auto-scraping status poll failed: {e}");
            }
        }
    }

    pub async fn poll_once(&self) -> Result<()> {
        match self.source.auto_scraping_status().await {
            Ok(status) => {
                debug!(active = status.active, last_update = %status.last_update, "auto-scraping status");
                self.board.update(status);
                Ok(())
            }
            Err(e) => {
                self.board.mark_failed();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::AppError;

    struct ScriptedSource(Mutex<VecDeque<Result<AutoScrapingStatus>>>);

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn auto_scraping_status(&self) -> Result<AutoScrapingStatus> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Config("no more replies".to_string())))
        }
    }

    fn status(active: bool, at: &str) -> AutoScrapingStatus {
        AutoScrapingStatus { active, last_update: at.to_string() }
    }

    #[tokio::test]
    async fn failure_keeps_previous_value() {
        let source = Arc::new(ScriptedSource(Mutex::new(VecDeque::from(vec![
            Ok(status(true, "14:05:00")),
            Err(AppError::Server { status: 503, body: String::new() }),
        ]))));
        let board = Arc::new(StatusBoard::new());
        let poller = StatusPoller::new(source, Arc::clone(&board), 30);

        assert!(!board.reachable());
        poller.poll_once().await.unwrap();
        assert!(board.reachable());
        assert_eq!(board.snapshot(), status(true, "14:05:00"));

        assert!(poller.poll_once().await.is_err());
        assert!(!board.reachable());
        assert_eq!(board.failures(), 1);
        assert_eq!(board.last_update(), "14:05:00");
        assert!(board.active());
    }

    #[tokio::test]
    async fn run_polls_on_start() {
        let source = Arc::new(ScriptedSource(Mutex::new(VecDeque::from(vec![Ok(status(
            false, "Nunca",
        ))]))));
        let board = Arc::new(StatusBoard::new());
        let handle = tokio::spawn(StatusPoller::new(source, Arc::clone(&board), 3600).run());

        // Sleeping lets the runtime park so the timer can fire the first tick.
        let filled = tokio::time::timeout(Duration::from_secs(5), async {
            while !board.reachable() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        handle.abort();
        assert!(filled.is_ok(), "poller never reported");
        assert_eq!(board.last_update(), "Nunca");
        assert!(!board.active());
    }
}
