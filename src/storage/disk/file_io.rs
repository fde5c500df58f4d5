use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::common::{Result, StorageError};

/// Thin positional-I/O wrapper around a file descriptor.
///
/// All reads and writes go through `pread`/`pwrite` (no shared cursor), so
/// concurrent access to non-overlapping ranges needs no extra serialization.
/// Short transfers loop until complete and interrupted system calls are
/// retried; errors surface as `StorageError`, never as panics.
pub struct FileIo {
    file: File,
    path: PathBuf,
}

impl FileIo {
    /// Opens the file read-write, optionally creating it.
    pub fn open<P: AsRef<Path>>(path: P, create_if_missing: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create_if_missing)
            .truncate(false)
            .open(&path)?;
        Ok(Self { file, path })
    }

    /// Current file size in bytes. A failed stat reads as zero so callers
    /// computing page counts get a total order rather than an error.
    pub fn size_bytes(&self) -> u64 {
        self.file.metadata().map(|m| m.len()).unwrap_or(0)
    }

    /// Grows or truncates the file to `new_size` bytes. Extended regions
    /// read back as zero bytes.
    pub fn resize(&self, new_size: u64) -> Result<()> {
        self.file.set_len(new_size)?;
        Ok(())
    }

    /// Writes the whole buffer at `offset`, looping over short writes.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            match self.file.write_at(&buf[written..], offset + written as u64) {
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Fills the whole buffer from `offset`.
    ///
    /// A request past end-of-file fails `NotFound` up front; a read that
    /// returns zero bytes mid-way is an unexpected EOF and fails
    /// `Corruption`.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        if offset + buf.len() as u64 > self.size_bytes() {
            return Err(StorageError::NotFound(format!(
                "read of {} bytes at offset {} is past end of '{}'",
                buf.len(),
                offset,
                self.path.display()
            )));
        }
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => {
                    return Err(StorageError::Corruption(format!(
                        "unexpected EOF at offset {} in '{}'",
                        offset + filled as u64,
                        self.path.display()
                    )));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Flushes file contents to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
