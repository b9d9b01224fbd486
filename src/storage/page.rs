pub mod heap_page;

use crate::transaction::TransactionId;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use heap_page::{HeapPage, HeapPageMut, PageLayout};

/// Logical address of one page: owning table plus 0-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: u32,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: u32, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table_id, self.page_no)
    }
}

/// One fixed-size unit of storage, shared between the buffer pool and the
/// transactions holding locks on it.
///
/// The raw buffer sits behind its own `RwLock`; page-level isolation is the
/// lock manager's job, this lock only keeps concurrent byte access sound.
/// The dirty state records which transaction performed the uncommitted
/// write, and is cleared only when that write reaches disk.
pub struct Page {
    id: PageId,
    data: RwLock<Box<[u8]>>,
    dirtier: Mutex<Option<TransactionId>>,
}

impl Page {
    pub fn new(id: PageId, data: Box<[u8]>) -> Self {
        Self {
            id,
            data: RwLock::new(data),
            dirtier: Mutex::new(None),
        }
    }

    /// A fresh all-zero page, as appended on tuple-insert overflow.
    pub fn zeroed(id: PageId, page_size: usize) -> Self {
        Self::new(id, vec![0u8; page_size].into_boxed_slice())
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    pub fn data_mut(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.lock().is_some()
    }

    /// The transaction whose uncommitted write dirtied this page, if any.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        *self.dirtier.lock()
    }

    pub fn mark_dirty(&self, tx: TransactionId) {
        *self.dirtier.lock() = Some(tx);
    }

    pub fn clear_dirty(&self) {
        *self.dirtier.lock() = None;
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("dirtier", &*self.dirtier.lock())
            .finish()
    }
}
