use std::path::Path;

use crate::common::{PageId, Result, StorageError, DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};

use super::file_io::FileIo;

/// Page-addressed view over a single file.
///
/// Page `pid` lives at byte offset `pid * page_size`. Writes extend the file
/// as needed; the file only ever grows by whole pages and is never shrunk by
/// this type.
pub struct DiskManager {
    file: FileIo,
    page_size: u32,
}

impl DiskManager {
    /// Opens (creating if missing) the backing file. A `page_size` below the
    /// floor falls back to the default.
    pub fn new<P: AsRef<Path>>(path: P, page_size: u32) -> Result<Self> {
        let page_size = if page_size < MIN_PAGE_SIZE {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        let file = FileIo::open(path, true)?;
        Ok(Self { file, page_size })
    }

    /// Reads page `pid` into `buf` (`buf.len()` must equal the page size).
    /// A page beyond the current file length reads as `NotFound`.
    pub fn read_page(&self, pid: PageId, buf: &mut [u8]) -> Result<()> {
        self.check_buf(buf.len())?;
        let off = pid.as_u32() as u64 * self.page_size as u64;
        self.file.read_at(buf, off)
    }

    /// Writes `buf` as page `pid`, growing the file first if necessary.
    pub fn write_page(&self, pid: PageId, buf: &[u8]) -> Result<()> {
        self.check_buf(buf.len())?;
        self.ensure_capacity_for(pid)?;
        let off = pid.as_u32() as u64 * self.page_size as u64;
        self.file.write_at(buf, off)
    }

    /// Number of whole pages the file currently holds.
    pub fn page_count(&self) -> u64 {
        self.file.size_bytes() / self.page_size as u64
    }

    /// Grows (or truncates) the file to exactly `new_page_count` pages.
    /// Newly extended pages are zero bytes until written.
    pub fn resize_to_pages(&self, new_page_count: u64) -> Result<()> {
        self.file.resize(new_page_count * self.page_size as u64)
    }

    /// Flushes file contents to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.sync()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    fn check_buf(&self, len: usize) -> Result<()> {
        if len != self.page_size as usize {
            return Err(StorageError::InvalidArgument(format!(
                "page buffer is {} bytes, page size is {}",
                len, self.page_size
            )));
        }
        Ok(())
    }

    fn ensure_capacity_for(&self, pid: PageId) -> Result<()> {
        let need = (pid.as_u32() as u64 + 1) * self.page_size as u64;
        if self.file.size_bytes() >= need {
            return Ok(());
        }
        self.file.resize(need)
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.file.sync();
    }
}
