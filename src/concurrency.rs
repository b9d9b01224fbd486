//! Concurrency control: page-granularity shared/exclusive locking.

pub mod lock;

pub use lock::{Grant, LockMode, LockTable};
