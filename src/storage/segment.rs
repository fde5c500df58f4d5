use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{PageId, Result, SegmentId};
use crate::storage::page::{PageHeader, PAGE_FORMAT_VERSION};

use super::disk::DiskManager;

struct Segment {
    disk: Arc<DiskManager>,
    /// Previously freed pages, reused LIFO. The file itself never shrinks.
    free_stack: Vec<PageId>,
}

/// Maps segments to files and hands out pages within them.
///
/// One segment backs one logical object (a table heap, an index). Files live
/// at `<base_dir>/seg_<id>.dbseg`; the base directory must already exist.
/// Allocation pops the free-stack when possible and otherwise appends one
/// zeroed page to the file. All operations serialize behind one mutex.
pub struct SegmentManager {
    page_size: u32,
    base_dir: PathBuf,
    segments: Mutex<HashMap<SegmentId, Segment>>,
}

impl SegmentManager {
    pub fn new<P: AsRef<Path>>(page_size: u32, base_dir: P) -> Self {
        Self {
            page_size,
            base_dir: base_dir.as_ref().to_path_buf(),
            segments: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the segment's backing file.
    pub fn segment_path(&self, seg: SegmentId) -> PathBuf {
        self.base_dir.join(format!("seg_{}.dbseg", seg.as_u32()))
    }

    /// Opens (creating if missing) the segment's file. Idempotent.
    pub fn ensure_segment(&self, seg: SegmentId) -> Result<()> {
        let mut segments = self.segments.lock();
        if segments.contains_key(&seg) {
            return Ok(());
        }
        let disk = Arc::new(DiskManager::new(self.segment_path(seg), self.page_size)?);
        segments.insert(
            seg,
            Segment {
                disk,
                free_stack: Vec::new(),
            },
        );
        Ok(())
    }

    /// Hands out a page id in `seg`: a freed page if one is stacked,
    /// otherwise a fresh zeroed page appended to the file.
    pub fn allocate_page(&self, seg: SegmentId) -> Result<PageId> {
        {
            let mut segments = self.segments.lock();
            if let Some(s) = segments.get_mut(&seg) {
                if let Some(pid) = s.free_stack.pop() {
                    return Ok(pid);
                }
                let count = s.disk.page_count();
                s.disk.resize_to_pages(count + 1)?;
                return Ok(PageId::new(count as u32));
            }
        }
        self.ensure_segment(seg)?;
        self.allocate_page(seg)
    }

    /// Returns `pid` to the segment's free-stack for later reuse.
    pub fn free_page(&self, seg: SegmentId, pid: PageId) {
        let mut segments = self.segments.lock();
        if let Some(s) = segments.get_mut(&seg) {
            s.free_stack.push(pid);
        }
    }

    /// Number of addressable pages in the segment's file.
    pub fn page_count(&self, seg: SegmentId) -> u64 {
        let segments = self.segments.lock();
        segments.get(&seg).map(|s| s.disk.page_count()).unwrap_or(0)
    }

    /// Read-only probe of a page's recorded free size, for FSM rebuilds.
    /// Returns 0 when the page cannot be read or its format version does
    /// not match.
    pub fn probe_page_free(&self, seg: SegmentId, pid: PageId) -> u16 {
        let disk = {
            let segments = self.segments.lock();
            match segments.get(&seg) {
                Some(s) => Arc::clone(&s.disk),
                None => return 0,
            }
        };
        let mut buf = vec![0u8; self.page_size as usize];
        if disk.read_page(pid, &mut buf).is_err() {
            return 0;
        }
        let hdr = PageHeader::read_from(&buf);
        if hdr.format_version != PAGE_FORMAT_VERSION {
            return 0;
        }
        hdr.free_size
    }

    /// The disk manager backing `seg`, for wiring a buffer pool to it.
    pub fn disk(&self, seg: SegmentId) -> Option<Arc<DiskManager>> {
        let segments = self.segments.lock();
        segments.get(&seg).map(|s| Arc::clone(&s.disk))
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
