//! Storage layer.
//!
//! Persistent data storage built on fixed-size pages:
//!
//! - **PageFile**: raw page I/O against one on-disk file
//! - **Page / PageId**: a cached page and its (table, page number) address
//! - **HeapPage**: occupancy-bitmap page format for fixed-width tuples
//! - **HeapFile**: per-table heap store, append-only in page count
//! - **BufferPool**: bounded transactional page cache with page-level locking

pub mod buffer;
pub mod disk;
pub mod heap;
pub mod page;

pub use buffer::BufferPool;
pub use disk::PageFile;
pub use heap::HeapFile;
pub use page::{Page, PageId};
