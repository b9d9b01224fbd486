//! Table registry: the table id -> heap file mapping the storage core
//! consumes. Schema management proper lives with the callers; the catalog
//! only keeps what the core needs to route a page id to its file.

use crate::error::{Error, Result};
use crate::storage::heap::HeapFile;
use crate::tuple::Schema;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub type TableId = u32;

pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<HeapFile>>>,
    next_table_id: AtomicU32,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_table_id: AtomicU32::new(1),
        }
    }

    /// Creates an empty heap file at `path` and registers it under a fresh
    /// table id.
    pub fn create_table(&self, path: &Path, schema: Schema, page_size: usize) -> Result<TableId> {
        let table_id = self.next_table_id.fetch_add(1, Ordering::SeqCst);
        let file = HeapFile::create(table_id, path, schema, page_size)?;
        self.tables.write().insert(table_id, Arc::new(file));
        Ok(table_id)
    }

    /// Registers an existing heap file under a fresh table id.
    pub fn open_table(&self, path: &Path, schema: Schema, page_size: usize) -> Result<TableId> {
        let table_id = self.next_table_id.fetch_add(1, Ordering::SeqCst);
        let file = HeapFile::open(table_id, path, schema, page_size)?;
        self.tables.write().insert(table_id, Arc::new(file));
        Ok(table_id)
    }

    /// The heap file backing a table.
    pub fn file(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(Error::UnknownTable(table_id))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
