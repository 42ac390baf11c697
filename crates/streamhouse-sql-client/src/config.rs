//! Tunables for result fetching and the REST gateway.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Changelog capacity of each result set.
    pub max_results: usize,
    /// Sleep between auto-refresh polls.
    pub refresh_interval_ms: u64,
    /// Sleep between fetches while draining to the last page.
    pub jump_delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_results: 10_000,
            refresh_interval_ms: 1_000,
            jump_delay_ms: 100,
        }
    }
}

impl FetcherConfig {
    pub fn capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_results).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn jump_delay(&self) -> Duration {
        Duration::from_millis(self.jump_delay_ms)
    }
}

/// Settings for [`RestStore`](crate::RestStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestStoreConfig {
    /// Gateway root, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Sleep between status polls of a `PENDING` statement.
    pub poll_interval_ms: u64,
    /// Give up on a statement that stays `PENDING` this long.
    pub submit_timeout_ms: u64,
}

impl Default for RestStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            poll_interval_ms: 250,
            submit_timeout_ms: 30_000,
        }
    }
}

impl RestStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}
