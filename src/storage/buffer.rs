//! The buffer pool: a bounded transactional page cache.
//!
//! The pool mediates every page access. `acquire` takes the page lock for
//! the calling transaction before the page is looked up or loaded, so lock
//! state and the page table change under one mutex as a single atomic step.
//! Waiters for contended locks park on a condvar that every release
//! signals; each wait is bounded by the configured poll interval and the
//! attempt budget, after which the request fails with `LockTimeout` and the
//! caller must abort its transaction.
//!
//! Eviction is deliberately simple: any clean page will do. A dirty page is
//! never evicted — its bytes belong to an uncommitted transaction and only
//! the commit path may write them out (no-steal). When every cached page is
//! dirty the pool is exhausted and the current operation fails.

use crate::catalog::{Catalog, TableId};
use crate::concurrency::{Grant, LockMode, LockTable};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::page::{Page, PageId};
use crate::transaction::TransactionId;
use crate::tuple::Tuple;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct PoolState {
    pages: HashMap<PageId, Arc<Page>>,
    locks: LockTable,
}

pub struct BufferPool {
    catalog: Arc<Catalog>,
    state: Mutex<PoolState>,
    lock_released: Condvar,
    capacity: usize,
    poll_interval: Duration,
    max_lock_attempts: u32,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, config: &Config) -> Self {
        Self {
            catalog,
            state: Mutex::new(PoolState {
                pages: HashMap::with_capacity(config.max_cached_pages),
                locks: LockTable::new(),
            }),
            lock_released: Condvar::new(),
            capacity: config.max_cached_pages,
            poll_interval: config.poll_interval,
            max_lock_attempts: config.max_lock_attempts,
        }
    }

    /// Acquires the page lock for `tx` and returns the page, loading it
    /// from its heap file on a cache miss (evicting first when the pool is
    /// at capacity).
    pub fn acquire(
        &self,
        tx: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> Result<Arc<Page>> {
        let mut state = self.state.lock();
        self.lock_page(&mut state, tx, page_id, mode)?;

        if let Some(page) = state.pages.get(&page_id) {
            return Ok(Arc::clone(page));
        }

        if state.pages.len() >= self.capacity {
            Self::evict_one(&mut state, self.capacity)?;
        }
        let file = self.catalog.file(page_id.table_id)?;
        let page = Arc::new(file.read_page(page_id)?);
        state.pages.insert(page_id, Arc::clone(&page));
        Ok(page)
    }

    /// Inserts a tuple into the table, marking every affected page dirty
    /// with `tx` as owner and (re)inserting it into the cache so future
    /// reads see the update. Takes exclusive locks on the pages it touches.
    pub fn insert_tuple(
        &self,
        tx: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let file = self.catalog.file(table_id)?;
        let affected = file.insert_tuple(tx, tuple, self)?;
        self.adopt_dirty(tx, affected);
        Ok(())
    }

    /// Deletes a tuple from its recorded page, with the same dirtying and
    /// re-caching behavior as `insert_tuple`.
    pub fn delete_tuple(&self, tx: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id.ok_or(Error::MissingRecordId)?;
        let file = self.catalog.file(record_id.page_id.table_id)?;
        let affected = file.delete_tuple(tx, tuple, self)?;
        self.adopt_dirty(tx, affected);
        Ok(())
    }

    /// Commits `tx`: flushes each dirty page in its held set, then releases
    /// all of its locks.
    pub fn commit(&self, tx: TransactionId) -> Result<()> {
        let mut state = self.state.lock();
        for page_id in state.locks.pages_of(tx) {
            if let Some(page) = state.pages.get(&page_id).cloned() {
                self.flush_locked(&page)?;
            }
        }
        state.locks.release_all(tx);
        drop(state);
        self.lock_released.notify_all();
        log::debug!("{} committed", tx);
        Ok(())
    }

    /// Aborts `tx`: discards the cached copy of each page in its held set
    /// (forcing future reads to reload the committed bytes from disk), then
    /// releases all of its locks.
    pub fn abort(&self, tx: TransactionId) {
        let mut state = self.state.lock();
        for page_id in state.locks.pages_of(tx) {
            state.pages.remove(&page_id);
        }
        state.locks.release_all(tx);
        drop(state);
        self.lock_released.notify_all();
        log::debug!("{} aborted", tx);
    }

    /// True when `tx` holds a lock (in either mode) on the page.
    pub fn holds_lock(&self, tx: TransactionId, page_id: PageId) -> bool {
        self.state.lock().locks.holds(tx, page_id)
    }

    /// Releases a single page lock early. Risky for callers that have
    /// already read or written the page; two-phase callers should rely on
    /// commit/abort instead.
    pub fn release_page(&self, tx: TransactionId, page_id: PageId) {
        self.state.lock().locks.release(tx, page_id);
        self.lock_released.notify_all();
    }

    /// Force-removes a page from the cache without flushing.
    pub fn discard(&self, page_id: PageId) {
        self.state.lock().pages.remove(&page_id);
    }

    /// Writes every dirty cached page to its heap file.
    ///
    /// Shutdown and testing only: this bypasses transaction boundaries and
    /// persists uncommitted writes, so it must never be used to enforce
    /// durability during normal operation.
    pub fn flush_all(&self) -> Result<()> {
        let state = self.state.lock();
        for page in state.pages.values() {
            self.flush_locked(page)?;
        }
        Ok(())
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Registers a freshly appended page under an exclusive lock for `tx`.
    /// Used by the heap-file append path so the new page is visible to
    /// subsequent reads.
    pub(crate) fn register_page(&self, tx: TransactionId, page: Arc<Page>) -> Result<Arc<Page>> {
        let mut state = self.state.lock();
        let page_id = page.id();
        self.lock_page(&mut state, tx, page_id, LockMode::Exclusive)?;
        if state.pages.len() >= self.capacity {
            Self::evict_one(&mut state, self.capacity)?;
        }
        state.pages.insert(page_id, Arc::clone(&page));
        Ok(page)
    }

    /// Bounded lock wait: retry `try_acquire` after each condvar park,
    /// giving up once the attempt budget is spent.
    fn lock_page(
        &self,
        state: &mut MutexGuard<'_, PoolState>,
        tx: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> Result<()> {
        let mut attempts = 0;
        loop {
            match state.locks.try_acquire(tx, page_id, mode) {
                Grant::Granted => return Ok(()),
                Grant::Wait => {
                    if attempts >= self.max_lock_attempts {
                        log::debug!("{} timed out waiting for page {}", tx, page_id);
                        return Err(Error::LockTimeout {
                            tx: tx.value(),
                            page_id,
                        });
                    }
                    attempts += 1;
                    self.lock_released.wait_for(state, self.poll_interval);
                }
            }
        }
    }

    fn adopt_dirty(&self, tx: TransactionId, affected: Vec<Arc<Page>>) {
        let mut state = self.state.lock();
        for page in affected {
            page.mark_dirty(tx);
            state.pages.insert(page.id(), page);
        }
    }

    /// Only reachable from `commit` and the shutdown-only `flush_all`, so a
    /// dirty page cannot be stolen to disk mid-transaction.
    fn flush_locked(&self, page: &Page) -> Result<()> {
        if page.is_dirty() {
            let file = self.catalog.file(page.id().table_id)?;
            file.write_page(page)?;
            page.clear_dirty();
            log::debug!("flushed page {}", page.id());
        }
        Ok(())
    }

    fn evict_one(state: &mut MutexGuard<'_, PoolState>, capacity: usize) -> Result<()> {
        let victim = state
            .pages
            .iter()
            .find(|(_, page)| !page.is_dirty())
            .map(|(page_id, _)| *page_id);
        match victim {
            Some(page_id) => {
                state.pages.remove(&page_id);
                log::trace!("evicted clean page {}", page_id);
                Ok(())
            }
            None => Err(Error::CacheExhausted { capacity }),
        }
    }
}
