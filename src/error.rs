//! Crate-wide error types.

use crate::storage::page::PageId;
use crate::tuple::RecordId;
use thiserror::Error;

/// Errors surfaced by the storage core.
#[derive(Error, Debug)]
pub enum Error {
    /// A transaction exhausted its bounded wait for a page lock. The caller
    /// must abort the transaction; the whole transaction may then be retried.
    #[error("transaction {tx} timed out waiting for a lock on page {page_id}")]
    LockTimeout { tx: u64, page_id: PageId },

    /// Every cached page is dirty, so nothing can be evicted. Signals a pool
    /// too small for the concurrent dirty working set.
    #[error("buffer pool exhausted: all {capacity} cached pages are dirty")]
    CacheExhausted { capacity: usize },

    /// The tuple or slot being deleted/located is not present.
    #[error("record not found at {record_id}")]
    RecordNotFound { record_id: RecordId },

    /// The tuple was never stored, so it has no on-disk location.
    #[error("tuple has no record id")]
    MissingRecordId,

    /// Slot index outside the page's slot count.
    #[error("invalid slot {slot} (slot count {slot_count})")]
    InvalidSlot { slot: u16, slot_count: usize },

    /// No heap file is registered for the table id.
    #[error("unknown table {0}")]
    UnknownTable(u32),

    /// Tuple values do not match the table schema.
    #[error("schema mismatch: expected {expected} fields, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// A text value exceeds the fixed field width.
    #[error("text value of {len} bytes exceeds the {max}-byte field limit")]
    ValueTooLarge { len: usize, max: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
