use thiserror::Error;

/// Storage error taxonomy.
///
/// Every fallible operation in the crate returns one of these; nothing on
/// the core paths unwinds.
///
/// - `InvalidArgument`: programming error (empty record, type mismatch,
///   unset column, unpin below zero). Reported, never retried.
/// - `NotFound`: absence (page beyond EOF, tombstoned slot, page not in the
///   buffer pool, NULL column). Usually handled locally by the caller.
/// - `OutOfRange`: a page cannot hold a record even after compaction; the
///   table heap reacts by relocating.
/// - `Io`: system call failure. Interrupted calls are retried internally.
/// - `Corruption`: structural invalidation (unexpected EOF mid-read, slot
///   offset outside the page, page-format version mismatch).
/// - `Unavailable`: no evictable frame, or an FSM rebuild without a probe.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corruption: {0}")]
    Corruption(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("unknown: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
