use super::error::{Result, StorageError};

/// Default page size in bytes (8 KiB).
pub const DEFAULT_PAGE_SIZE: u32 = 8192;

/// Smallest page size accepted before falling back to the default. A page
/// must at least hold the header plus a useful record payload.
pub const MIN_PAGE_SIZE: u32 = 1024;

/// Default number of frames in the buffer pool.
pub const DEFAULT_BUFFER_POOL_FRAMES: usize = 256;

/// Default K value for the LRU-K replacement policy.
pub const DEFAULT_LRUK_K: usize = 2;

/// Default free-space-manager bucket thresholds, in bytes.
pub const DEFAULT_FSM_BINS: [u32; 6] = [128, 512, 1024, 2048, 4096, 8192];

/// Runtime configuration for the storage engine.
///
/// All fields have workable defaults so embedders can start with
/// `StorageOptions::default()`. `io_direct` and `enable_checksum` are
/// reserved: accepted, stored, and currently unread.
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Page size in bytes.
    pub page_size: u32,

    /// Number of buffer pool frames.
    pub buffer_pool_frames: usize,

    /// Replacement policy selector, e.g. "clock" or "lruk:k=2".
    pub replacer: String,

    /// Free-space-manager bucket thresholds in bytes.
    pub fsm_bins: Vec<u32>,

    /// Direct I/O (reserved; requires alignment constraints).
    pub io_direct: bool,

    /// Page checksumming (reserved; the on-page field stays zero).
    pub enable_checksum: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_frames: DEFAULT_BUFFER_POOL_FRAMES,
            replacer: "clock".to_string(),
            fsm_bins: DEFAULT_FSM_BINS.to_vec(),
            io_direct: false,
            enable_checksum: true,
        }
    }
}

impl StorageOptions {
    /// Quick sanity check for obviously unusable configurations.
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(StorageError::InvalidArgument(format!(
                "page_size {} below minimum {}",
                self.page_size, MIN_PAGE_SIZE
            )));
        }
        if self.buffer_pool_frames == 0 {
            return Err(StorageError::InvalidArgument(
                "buffer_pool_frames must be nonzero".to_string(),
            ));
        }
        if self.fsm_bins.is_empty() {
            return Err(StorageError::InvalidArgument(
                "fsm_bins must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
