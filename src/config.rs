//! Engine configuration.

use std::time::Duration;

/// Configuration options recognized by the storage core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes per page. The default should only be overridden in tests;
    /// every file written with one page size must be reopened with the same.
    pub page_size: usize,
    /// Maximum number of pages the buffer pool keeps in memory.
    pub max_cached_pages: usize,
    /// Upper bound on a single wait for a contended page lock.
    pub poll_interval: Duration,
    /// Number of waits before a lock request gives up with `LockTimeout`.
    pub max_lock_attempts: u32,
}

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_MAX_CACHED_PAGES: usize = 50;

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_cached_pages: DEFAULT_MAX_CACHED_PAGES,
            poll_interval: Duration::from_millis(10),
            max_lock_attempts: 5,
        }
    }
}

impl Config {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_cached_pages(mut self, max_cached_pages: usize) -> Self {
        self.max_cached_pages = max_cached_pages;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_lock_attempts(mut self, max_lock_attempts: u32) -> Self {
        self.max_lock_attempts = max_lock_attempts;
        self
    }
}
