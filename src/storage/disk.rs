use crate::error::Result;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Raw fixed-size page I/O over one flat file. Page `n` occupies the byte
/// range `[n * page_size, (n + 1) * page_size)`; the file length is always
/// an exact multiple of the page size because pages are only ever written
/// whole.
pub struct PageFile {
    file: Mutex<File>,
    page_size: usize,
}

impl PageFile {
    pub fn create(path: &Path, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            page_size,
        })
    }

    pub fn open(path: &Path, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            page_size,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reads page `page_no` into `buf`. A file shorter than the requested
    /// range surfaces as an I/O error; valid page numbers never hit it.
    pub fn read_page(&self, page_no: u32, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset(page_no)))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Writes a full page and forces it to disk.
    pub fn write_page(&self, page_no: u32, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), self.page_size);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset(page_no)))?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn num_pages(&self) -> Result<u32> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    fn offset(&self, page_no: u32) -> u64 {
        page_no as u64 * self.page_size as u64
    }
}
