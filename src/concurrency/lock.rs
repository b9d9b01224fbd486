//! Page lock state machine.
//!
//! `LockTable` holds the per-page lock entries and the per-transaction
//! reverse index, but does no synchronization or waiting of its own: the
//! buffer pool keeps it inside its single mutex so that lock state and the
//! page table always change as one atomic step, and parks waiters on a
//! condvar signalled at every release.

use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::collections::{HashMap, HashSet};

/// Lock modes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for read access; any number of holders.
    Shared,
    /// Exclusive lock for write access; exactly one holder.
    Exclusive,
}

/// Outcome of a single, non-blocking acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// The lock is held by the requester when this is returned.
    Granted,
    /// Incompatible holders exist; the requester must wait and retry.
    Wait,
}

#[derive(Debug)]
struct LockEntry {
    mode: LockMode,
    holders: HashSet<TransactionId>,
}

/// Lock state for every page, plus the transaction -> pages reverse index
/// used for bulk release at commit/abort.
#[derive(Debug, Default)]
pub struct LockTable {
    entries: HashMap<PageId, LockEntry>,
    held: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to acquire `mode` on `page_id` for `tx` without blocking.
    ///
    /// Grants immediately when the page is unlocked, when the requester
    /// already holds an exclusive lock (re-entrant), when a shared lock is
    /// requested on a shared entry, or when the requester is the sole
    /// shared holder asking for exclusive (in-place upgrade). Everything
    /// else must wait.
    pub fn try_acquire(&mut self, tx: TransactionId, page_id: PageId, mode: LockMode) -> Grant {
        match self.entries.get_mut(&page_id) {
            None => {
                self.entries.insert(
                    page_id,
                    LockEntry {
                        mode,
                        holders: HashSet::from([tx]),
                    },
                );
                self.held.entry(tx).or_default().insert(page_id);
                log::debug!("{} acquired {:?} lock on page {}", tx, mode, page_id);
                Grant::Granted
            }
            Some(entry) => match entry.mode {
                LockMode::Exclusive => {
                    // An exclusive holder may re-acquire in either mode.
                    if entry.holders.contains(&tx) {
                        Grant::Granted
                    } else {
                        Grant::Wait
                    }
                }
                LockMode::Shared => match mode {
                    LockMode::Shared => {
                        entry.holders.insert(tx);
                        self.held.entry(tx).or_default().insert(page_id);
                        log::debug!("{} acquired Shared lock on page {}", tx, page_id);
                        Grant::Granted
                    }
                    LockMode::Exclusive => {
                        if entry.holders.len() == 1 && entry.holders.contains(&tx) {
                            entry.mode = LockMode::Exclusive;
                            log::debug!("{} upgraded lock on page {} to Exclusive", tx, page_id);
                            Grant::Granted
                        } else {
                            Grant::Wait
                        }
                    }
                },
            },
        }
    }

    /// Removes `tx` from the page's holder set; the entry disappears with
    /// its last holder.
    pub fn release(&mut self, tx: TransactionId, page_id: PageId) {
        if let Some(entry) = self.entries.get_mut(&page_id) {
            entry.holders.remove(&tx);
            if entry.holders.is_empty() {
                self.entries.remove(&page_id);
            }
        }
        if let Some(pages) = self.held.get_mut(&tx) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&tx);
            }
        }
    }

    /// Releases every lock `tx` holds and returns the pages it held.
    pub fn release_all(&mut self, tx: TransactionId) -> Vec<PageId> {
        let pages: Vec<PageId> = match self.held.remove(&tx) {
            Some(set) => set.into_iter().collect(),
            None => return Vec::new(),
        };
        for page_id in &pages {
            if let Some(entry) = self.entries.get_mut(page_id) {
                entry.holders.remove(&tx);
                if entry.holders.is_empty() {
                    self.entries.remove(page_id);
                }
            }
        }
        log::debug!("{} released {} locks", tx, pages.len());
        pages
    }

    pub fn holds(&self, tx: TransactionId, page_id: PageId) -> bool {
        self.held
            .get(&tx)
            .map(|pages| pages.contains(&page_id))
            .unwrap_or(false)
    }

    /// Pages currently locked by `tx`, in no particular order.
    pub fn pages_of(&self, tx: TransactionId) -> Vec<PageId> {
        self.held
            .get(&tx)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn mode_of(&self, page_id: PageId) -> Option<LockMode> {
        self.entries.get(&page_id).map(|e| e.mode)
    }
}
