//! The engine instance: one `Database` owns the catalog, the buffer pool
//! and the transaction id source. All state is scoped to this object;
//! nothing is ambient or process-global, so independent instances (and
//! tests) never leak into each other.

use crate::catalog::{Catalog, TableId};
use crate::config::Config;
use crate::error::Result;
use crate::storage::buffer::BufferPool;
use crate::storage::page::PageId;
use crate::transaction::{TransactionId, TransactionIdGenerator};
use crate::tuple::{Schema, Tuple};
use std::path::Path;
use std::sync::Arc;

pub struct Database {
    catalog: Arc<Catalog>,
    pool: BufferPool,
    tx_ids: TransactionIdGenerator,
    config: Config,
}

impl Database {
    pub fn new(config: Config) -> Self {
        let catalog = Arc::new(Catalog::new());
        let pool = BufferPool::new(Arc::clone(&catalog), &config);
        Self {
            catalog,
            pool,
            tx_ids: TransactionIdGenerator::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Creates a new heap file at `path` and registers it.
    pub fn create_table(&self, path: &Path, schema: Schema) -> Result<TableId> {
        self.catalog.create_table(path, schema, self.config.page_size)
    }

    /// Registers an existing heap file.
    pub fn open_table(&self, path: &Path, schema: Schema) -> Result<TableId> {
        self.catalog.open_table(path, schema, self.config.page_size)
    }

    /// Starts a new transaction.
    pub fn begin(&self) -> TransactionId {
        self.tx_ids.next()
    }

    pub fn insert_tuple(&self, tx: TransactionId, table_id: TableId, tuple: &mut Tuple) -> Result<()> {
        self.pool.insert_tuple(tx, table_id, tuple)
    }

    pub fn delete_tuple(&self, tx: TransactionId, tuple: &Tuple) -> Result<()> {
        self.pool.delete_tuple(tx, tuple)
    }

    /// Reads every tuple of the table under shared locks held by `tx`.
    pub fn scan(&self, tx: TransactionId, table_id: TableId) -> Result<Vec<Tuple>> {
        self.catalog.file(table_id)?.scan(tx, &self.pool)
    }

    pub fn commit(&self, tx: TransactionId) -> Result<()> {
        self.pool.commit(tx)
    }

    pub fn abort(&self, tx: TransactionId) {
        self.pool.abort(tx)
    }

    pub fn holds_lock(&self, tx: TransactionId, page_id: PageId) -> bool {
        self.pool.holds_lock(tx, page_id)
    }

    /// Shutdown/testing only; see `BufferPool::flush_all`.
    pub fn flush_all(&self) -> Result<()> {
        self.pool.flush_all()
    }
}
