//! heapstore - the core of a disk-oriented row-store storage engine
//!
//! Pages are the unit of I/O; a fixed-capacity buffer pool caches them in
//! memory and writes them back through a pluggable replacement policy.
//! Records are variable-length byte rows stored in slotted pages and
//! addressed by stable `(page, slot)` record ids.
//!
//! # Architecture
//!
//! - **Storage** (`storage`): files, pages and placement
//!   - `FileIo` / `DiskManager`: positional I/O and the page-addressed file view
//!   - `SlottedPage`: variable-length records with in-page compaction
//!   - `SegmentManager`: one file per segment, page allocation and reuse
//!   - `FreeSpaceManager`: bucketed page → free-bytes index for insert placement
//!
//! - **Buffer pool** (`buffer`): memory management for pages
//!   - `BufferPool`: page table, pinning, dirty tracking, write-back, statistics
//!   - `ClockReplacer` / `LruKReplacer`: victim selection over unpinned frames
//!   - `ReadPageGuard` / `WritePageGuard`: RAII pins over frame bytes
//!
//! - **Records** (`tuple`): typed rows over a `Schema`, built with `TupleBuilder`
//!
//! - **Tables** (`table`): `TableHeap` composes the layers into
//!   insert/update/delete/get/scan over one segment
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use heapstore::buffer::BufferPool;
//! use heapstore::common::{SegmentId, StorageOptions};
//! use heapstore::storage::fsm::FreeSpaceManager;
//! use heapstore::storage::segment::SegmentManager;
//! use heapstore::table::TableHeap;
//! use heapstore::tuple::{DataType, Schema, TupleBuilder};
//!
//! let opts = StorageOptions::default();
//! let seg = SegmentId::new(1);
//!
//! let segments = Arc::new(SegmentManager::new(opts.page_size, "./dbdata"));
//! segments.ensure_segment(seg).unwrap();
//! let disk = segments.disk(seg).unwrap();
//!
//! let pool = Arc::new(BufferPool::with_options(&opts, disk));
//! let fsm = Arc::new(FreeSpaceManager::new(opts.page_size, opts.fsm_bins.clone()));
//! let heap = TableHeap::new(seg, opts.page_size, pool, fsm, Arc::clone(&segments));
//!
//! let schema = Schema::builder()
//!     .column("id", DataType::Int32)
//!     .column("name", DataType::VarChar(64))
//!     .build();
//! let mut tb = TupleBuilder::new(&schema);
//! tb.set_i32(0, 1).unwrap();
//! tb.set_varchar(1, "hello").unwrap();
//! let rid = heap.insert(&tb.build().unwrap()).unwrap();
//!
//! let row = heap.get(rid).unwrap();
//! assert_eq!(row.get_i32(&schema, 0).unwrap(), 1);
//! ```

pub mod buffer;
pub mod common;
pub mod storage;
pub mod table;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, RecordId, Result, SegmentId, SlotId, StorageError};
