//! Heap files: one unordered, append-only page file per table.
//!
//! A heap file never reclaims page-level space. Inserts scan pages in
//! ascending order for a free slot and append a fresh page only when every
//! existing page is full, so the page count grows monotonically; deletes
//! just clear an occupancy bit, leaving the slot for a later insert.
//!
//! All page access during tuple operations goes through the buffer pool so
//! that the owning transaction holds the proper page locks.

use crate::concurrency::LockMode;
use crate::error::{Error, Result};
use crate::storage::buffer::BufferPool;
use crate::storage::disk::PageFile;
use crate::storage::page::{HeapPage, HeapPageMut, Page, PageId, PageLayout};
use crate::transaction::TransactionId;
use crate::tuple::{RecordId, Schema, Tuple};
use std::path::Path;
use std::sync::Arc;

pub struct HeapFile {
    table_id: u32,
    schema: Schema,
    layout: PageLayout,
    file: PageFile,
}

impl HeapFile {
    pub fn create(table_id: u32, path: &Path, schema: Schema, page_size: usize) -> Result<Self> {
        let file = PageFile::create(path, page_size)?;
        Ok(Self::with_file(table_id, schema, file, page_size))
    }

    pub fn open(table_id: u32, path: &Path, schema: Schema, page_size: usize) -> Result<Self> {
        let file = PageFile::open(path, page_size)?;
        Ok(Self::with_file(table_id, schema, file, page_size))
    }

    fn with_file(table_id: u32, schema: Schema, file: PageFile, page_size: usize) -> Self {
        let layout = PageLayout::for_tuple(page_size, schema.tuple_bytes());
        Self {
            table_id,
            schema,
            layout,
            file,
        }
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    /// Number of pages currently in the file.
    pub fn num_pages(&self) -> Result<u32> {
        self.file.num_pages()
    }

    /// Reads a page from disk into a fresh in-memory `Page`.
    pub fn read_page(&self, page_id: PageId) -> Result<Page> {
        debug_assert_eq!(page_id.table_id, self.table_id);
        let mut buf = vec![0u8; self.file.page_size()];
        self.file.read_page(page_id.page_no, &mut buf)?;
        Ok(Page::new(page_id, buf.into_boxed_slice()))
    }

    /// Writes a page's full buffer back to its file offset.
    pub fn write_page(&self, page: &Page) -> Result<()> {
        debug_assert_eq!(page.id().table_id, self.table_id);
        let data = page.data();
        self.file.write_page(page.id().page_no, &data)
    }

    /// Inserts a tuple into the first page with a free slot, appending a new
    /// page when every existing page is full. The appended page is persisted
    /// immediately and registered with the cache under an exclusive lock.
    ///
    /// Sets the tuple's record id and returns the affected page.
    pub fn insert_tuple(
        &self,
        tx: TransactionId,
        tuple: &mut Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<Arc<Page>>> {
        let record = tuple.encode(&self.schema)?;

        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_no);
            let page = pool.acquire(tx, page_id, LockMode::Exclusive)?;
            let slot = {
                let mut data = page.data_mut();
                let mut view = HeapPageMut::new(&mut data, self.layout);
                view.insert(&record)?
            };
            if let Some(slot) = slot {
                // Dirty immediately, before the pool re-registers the page,
                // so the modified copy can never look evictable.
                page.mark_dirty(tx);
                tuple.record_id = Some(RecordId::new(page_id, slot));
                return Ok(vec![page]);
            }
        }

        // Every page is full: append a zero-filled page holding the tuple.
        let page_id = PageId::new(self.table_id, self.num_pages()?);
        let page = Page::zeroed(page_id, self.file.page_size());
        {
            let mut data = page.data_mut();
            let mut view = HeapPageMut::new(&mut data, self.layout);
            view.write_slot(0, &record)?;
        }
        self.write_page(&page)?;
        let page = pool.register_page(tx, Arc::new(page))?;
        tuple.record_id = Some(RecordId::new(page_id, 0));
        log::debug!("table {} grew to page {}", self.table_id, page_id.page_no);
        Ok(vec![page])
    }

    /// Clears the tuple's slot on its recorded page. Fails with
    /// `RecordNotFound` when the slot is already free.
    pub fn delete_tuple(
        &self,
        tx: TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<Arc<Page>>> {
        let record_id = tuple.record_id.ok_or(Error::MissingRecordId)?;
        debug_assert_eq!(record_id.page_id.table_id, self.table_id);

        let page = pool.acquire(tx, record_id.page_id, LockMode::Exclusive)?;
        {
            let mut data = page.data_mut();
            let mut view = HeapPageMut::new(&mut data, self.layout);
            if !view.slot_in_use(record_id.slot) {
                return Err(Error::RecordNotFound { record_id });
            }
            view.clear_slot(record_id.slot)?;
        }
        page.mark_dirty(tx);
        Ok(vec![page])
    }

    /// Reads every occupied slot in ascending (page, slot) order, under
    /// shared page locks held by `tx`.
    pub fn scan(&self, tx: TransactionId, pool: &BufferPool) -> Result<Vec<Tuple>> {
        let mut tuples = Vec::new();
        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_no);
            let page = pool.acquire(tx, page_id, LockMode::Shared)?;
            let data = page.data();
            let view = HeapPage::new(&data, self.layout);
            for slot in 0..self.layout.slot_count as u16 {
                if view.slot_in_use(slot) {
                    let mut tuple = Tuple::decode(&self.schema, view.slot_data(slot)?)?;
                    tuple.record_id = Some(RecordId::new(page_id, slot));
                    tuples.push(tuple);
                }
            }
        }
        Ok(tuples)
    }
}
