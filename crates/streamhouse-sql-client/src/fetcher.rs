//! Paging driver for one statement's results.
//!
//! `ResultFetcher` owns the current [`Statement`] and its
//! [`MaterializedResultSet`], and pulls further pages from a [`Store`]
//! either on demand or from a background auto-refresh task.
//!
//! ## State machine
//!
//! ```text
//!            toggle (start)                 no continuation token
//!  Paused ─────────────────▶ Running ─────────────────────────────▶ Completed
//!    ▲  ◀───────────────────   │  │                                    ▲
//!    │     toggle (stop)       │  │ fetch error                        │
//!    │                         │  ▼                                    │
//!    └──── fetch ok + token ── Failed ── toggle (start) ──▶ Running    │
//!                                └────────── fetch ok, no token ───────┘
//! ```
//!
//! The state lives in an `AtomicU8` and is the only start/stop signal for the
//! background task. Fetches are single-flight: every path that talks to the
//! store goes through one async mutex.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex, RwLock as AsyncRwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::FetcherConfig;
use crate::result_set::MaterializedResultSet;
use crate::statement::Statement;
use crate::store::Store;

/// Result retrieval state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FetchState {
    /// More pages exist but nothing is polling for them.
    Paused = 0,
    /// The auto-refresh task is polling.
    Running = 1,
    /// The last fetch failed; auto-refresh can be restarted.
    Failed = 2,
    /// The stream is exhausted. Terminal.
    Completed = 3,
}

impl From<u8> for FetchState {
    fn from(value: u8) -> Self {
        match value {
            0 => FetchState::Paused,
            1 => FetchState::Running,
            2 => FetchState::Failed,
            3 => FetchState::Completed,
            _ => FetchState::Paused,
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchState::Paused => "paused",
            FetchState::Running => "running",
            FetchState::Failed => "failed",
            FetchState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Invoked by the auto-refresh task after each page is applied.
pub type RefreshCallback = Arc<dyn Fn() + Send + Sync>;

struct Shared {
    store: Arc<dyn Store>,
    config: FetcherConfig,
    state: AtomicU8,
    statement: AsyncRwLock<Statement>,
    results: RwLock<Arc<MaterializedResultSet>>,
    fetch_lock: Mutex<()>,
    refresh_callback: RwLock<Option<RefreshCallback>>,
    /// Bumped whenever a refresh task starts or must stop; a task exits as
    /// soon as its own epoch is no longer current.
    refresh_epoch: AtomicU64,
}

/// Fetches result pages for the current statement into a
/// [`MaterializedResultSet`].
///
/// # Example
///
/// ```ignore
/// let fetcher = ResultFetcher::new(Arc::new(store), FetcherConfig::default());
/// fetcher.init(first_page).await;
/// fetcher.set_refresh_callback(|| redraw());
/// fetcher.toggle_auto_refresh();
/// ```
pub struct ResultFetcher {
    shared: Arc<Shared>,
}

impl ResultFetcher {
    /// Create an idle fetcher with an empty statement in the `Completed`
    /// state.
    pub fn new(store: Arc<dyn Store>, config: FetcherConfig) -> Self {
        let results = MaterializedResultSet::new(Vec::new(), config.capacity());
        Self {
            shared: Arc::new(Shared {
                store,
                config,
                state: AtomicU8::new(FetchState::Completed as u8),
                statement: AsyncRwLock::new(Statement::default()),
                results: RwLock::new(Arc::new(results)),
                fetch_lock: Mutex::new(()),
                refresh_callback: RwLock::new(None),
                refresh_epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Seed the fetcher with a freshly executed statement.
    ///
    /// Replaces the result set, keeping the current table/changelog mode,
    /// and stops any auto-refresh task of the previous statement.
    pub async fn init(&self, statement: Statement) {
        let _guard = self.shared.fetch_lock.lock().await;

        let table_mode = self.shared.results().is_table_mode();
        let results = MaterializedResultSet::new(statement.headers(), self.shared.config.capacity());
        results.set_mode(table_mode);
        if !results.append(statement.rows().iter().cloned()) {
            warn!(
                statement = %statement.name,
                "Dropped initial rows that do not match the result schema"
            );
        }

        let state = if statement.has_more_pages() {
            FetchState::Paused
        } else {
            FetchState::Completed
        };
        debug!(
            statement = %statement.name,
            rows = statement.rows().len(),
            state = %state,
            "Initialized result fetcher"
        );

        self.shared.refresh_epoch.fetch_add(1, Ordering::SeqCst);
        *self.shared.results.write() = Arc::new(results);
        *self.shared.statement.write().await = statement;
        self.shared.set_state(state);
    }

    pub fn state(&self) -> FetchState {
        self.shared.state()
    }

    /// Snapshot of the current statement.
    pub async fn statement(&self) -> Statement {
        self.shared.statement.read().await.clone()
    }

    /// Result set of the current statement.
    pub fn results(&self) -> Arc<MaterializedResultSet> {
        self.shared.results()
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.shared.config
    }

    pub fn set_refresh_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.refresh_callback.write() = Some(Arc::new(callback));
    }

    /// Switch the result set between table and changelog mode; returns
    /// `true` if it is now in table mode.
    pub fn toggle_table_mode(&self) -> bool {
        self.results().toggle_mode()
    }

    pub fn is_table_mode(&self) -> bool {
        self.results().is_table_mode()
    }

    /// Stop auto-refresh if it is running, otherwise try to start it with
    /// the configured interval. Returns the resulting state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn toggle_auto_refresh(&self) -> FetchState {
        if self
            .shared
            .transition(&[FetchState::Running], FetchState::Paused)
        {
            info!("Auto-refresh paused");
            return FetchState::Paused;
        }
        self.start_auto_refresh(self.shared.config.refresh_interval());
        self.state()
    }

    /// Start the background refresh task if the fetcher is `Paused` or
    /// `Failed`. Returns `false` without side effects otherwise.
    pub fn start_auto_refresh(&self, interval: Duration) -> bool {
        if !self.shared.transition(
            &[FetchState::Paused, FetchState::Failed],
            FetchState::Running,
        ) {
            return false;
        }

        let epoch = self.shared.refresh_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.refresh_loop(epoch, interval).await });
        true
    }

    /// Fetch one page now. Returns the number of rows the page carried.
    ///
    /// Waits for any fetch already in flight and does nothing once the
    /// fetcher is `Completed`.
    pub async fn fetch_next_page(&self) -> usize {
        self.shared.fetch_next_page().await
    }

    /// Fetch pages back to back until a page comes back empty or the
    /// fetcher reaches `Completed` or `Failed`. Returns the rows fetched.
    pub async fn jump_to_last_page(&self) -> usize {
        let mut total = 0;
        loop {
            let rows = self.shared.fetch_next_page().await;
            total += rows;
            if rows == 0 || matches!(self.state(), FetchState::Completed | FetchState::Failed) {
                break;
            }
            tokio::time::sleep(self.shared.config.jump_delay()).await;
        }
        total
    }

    /// Stop refreshing and release the statement on the server.
    ///
    /// A `Running` or `Failed` fetcher is forced to `Paused`; `Completed`
    /// stays terminal. If the statement is still running server-side a
    /// deletion request is spawned; its handle is returned so callers may
    /// wait for it, but failure is only logged.
    pub async fn close(&self) -> Option<JoinHandle<bool>> {
        self.shared.refresh_epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.transition(
            &[FetchState::Running, FetchState::Failed],
            FetchState::Paused,
        );

        let statement = self.shared.statement.read().await;
        if statement.name.is_empty() || !statement.is_running() {
            return None;
        }

        let name = statement.name.clone();
        let store = Arc::clone(&self.shared.store);
        Some(tokio::spawn(async move {
            let deleted = store.delete_statement(&name).await;
            if deleted {
                debug!(statement = %name, "Deleted statement");
            } else {
                warn!(statement = %name, "Failed to delete statement");
            }
            deleted
        }))
    }
}

impl Drop for ResultFetcher {
    fn drop(&mut self) {
        self.shared.refresh_epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl Shared {
    fn state(&self) -> FetchState {
        FetchState::from(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: FetchState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Atomically move to `to` if the current state is one of `from`.
    fn transition(&self, from: &[FetchState], to: FetchState) -> bool {
        self.state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                from.contains(&FetchState::from(current)).then_some(to as u8)
            })
            .is_ok()
    }

    fn results(&self) -> Arc<MaterializedResultSet> {
        self.results.read().clone()
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.refresh_epoch.load(Ordering::SeqCst) == epoch
    }

    async fn fetch_next_page(&self) -> usize {
        let _guard = self.fetch_lock.lock().await;
        if self.state() == FetchState::Completed {
            return 0;
        }

        let response = {
            let statement = self.statement.read().await;
            self.store.fetch_statement_results(&statement).await
        };

        let mut next = match response {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, "Failed to fetch results page");
                self.set_state(FetchState::Failed);
                return 0;
            }
        };

        let rows = next.results.rows.len();
        if !self.results().append(next.results.rows.iter().cloned()) {
            warn!(
                statement = %next.name,
                rows,
                "Dropped rows that do not match the result schema"
            );
        }

        let more = next.has_more_pages();
        {
            let mut statement = self.statement.write().await;
            if next.columns.is_empty() {
                next.columns = std::mem::take(&mut statement.columns);
            }
            debug!(statement = %next.name, rows, more, "Fetched results page");
            if !more {
                info!(statement = %next.name, "Statement results complete");
            }
            *statement = next;
        }

        if more {
            self.transition(&[FetchState::Failed], FetchState::Paused);
        } else {
            self.set_state(FetchState::Completed);
        }
        rows
    }

    async fn refresh_loop(&self, epoch: u64, interval: Duration) {
        let name = self.statement.read().await.name.clone();
        info!(statement = %name, interval_ms = interval.as_millis() as u64, "Auto-refresh started");

        while self.state() == FetchState::Running && self.is_current(epoch) {
            self.fetch_next_page().await;
            if self.state() == FetchState::Paused || !self.is_current(epoch) {
                break;
            }

            let callback = self.refresh_callback.read().clone();
            if let Some(callback) = callback {
                callback();
            }
            if self.state() != FetchState::Running {
                break;
            }

            debug!(statement = %name, "Refresh tick");
            tokio::time::sleep(interval).await;
        }

        info!(statement = %name, state = %self.state(), "Auto-refresh stopped");
    }
}
