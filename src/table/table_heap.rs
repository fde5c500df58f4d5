use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{PageId, RecordId, Result, SegmentId, StorageError};
use crate::storage::fsm::FreeSpaceManager;
use crate::storage::page::{PageHeader, SlottedPage, SlottedPageRef};
use crate::storage::segment::SegmentManager;
use crate::tuple::Tuple;

use super::table_iterator::TableIter;

/// Row-store heap over one segment.
///
/// Records live in slotted pages; `RecordId = (page, slot)` stays stable
/// across in-page compaction. Page placement goes through the free-space
/// manager, page allocation through the segment manager, and every page
/// access through the buffer pool. After each page mutation the page's
/// `free_size` is re-reported to the FSM so its index tracks reality.
pub struct TableHeap {
    seg_id: SegmentId,
    page_size: u32,
    pool: Arc<BufferPool>,
    fsm: Arc<FreeSpaceManager>,
    segments: Arc<SegmentManager>,
}

impl TableHeap {
    pub fn new(
        seg_id: SegmentId,
        page_size: u32,
        pool: Arc<BufferPool>,
        fsm: Arc<FreeSpaceManager>,
        segments: Arc<SegmentManager>,
    ) -> Self {
        Self {
            seg_id,
            page_size,
            pool,
            fsm,
            segments,
        }
    }

    /// Inserts a tuple, returning its record id.
    ///
    /// Placement: ask the FSM for a page with room; failing that, allocate
    /// and format a fresh page. Because the FSM is advisory the chosen page
    /// may still reject the insert, in which case one fresh page is
    /// allocated and the insert retried once.
    pub fn insert(&self, tuple: &Tuple) -> Result<RecordId> {
        if tuple.is_empty() {
            return Err(StorageError::InvalidArgument(
                "insert: empty tuple".to_string(),
            ));
        }
        if tuple.len() > u16::MAX as usize {
            return Err(StorageError::OutOfRange(format!(
                "insert: tuple of {} bytes cannot fit any page",
                tuple.len()
            )));
        }

        let pid = match self.fsm.find(tuple.len() as u16) {
            Some(pid) => pid,
            None => self.allocate_fresh_page()?,
        };

        {
            let mut guard = self.pool.fetch_write(pid)?;
            let mut page = SlottedPage::new(guard.data_mut());
            match page.insert(tuple.bytes()) {
                Ok(slot) => {
                    let free = page.free_size();
                    guard.mark_dirty();
                    drop(guard);
                    self.fsm.update(pid, free);
                    return Ok(RecordId::new(pid, slot));
                }
                Err(_stale) => {
                    // Stale FSM hint or a page that filled up in between.
                    drop(guard);
                }
            }
        }

        let npid = self.allocate_fresh_page()?;
        let mut guard = self.pool.fetch_write(npid)?;
        let mut page = SlottedPage::new(guard.data_mut());
        let slot = page.insert(tuple.bytes())?;
        let free = page.free_size();
        guard.mark_dirty();
        drop(guard);
        self.fsm.update(npid, free);
        Ok(RecordId::new(npid, slot))
    }

    /// Updates the record at `rid`, returning its post-update id.
    ///
    /// In-page updates keep the id. When the page cannot hold the new
    /// version even after compaction, the new version is inserted elsewhere
    /// and the old slot tombstoned — the returned id differs and the caller
    /// must drop the stale one; no forwarding pointer is kept.
    pub fn update(&self, rid: RecordId, tuple: &Tuple) -> Result<RecordId> {
        let mut guard = self.pool.fetch_write(rid.page_id)?;
        let mut page = SlottedPage::new(guard.data_mut());
        match page.update(rid.slot, tuple.bytes()) {
            Ok(()) => {
                let free = page.free_size();
                guard.mark_dirty();
                drop(guard);
                self.fsm.update(rid.page_id, free);
                Ok(rid)
            }
            Err(StorageError::OutOfRange(_)) => {
                drop(guard);
                let new_rid = self.insert(tuple)?;

                let mut old = self.pool.fetch_write(rid.page_id)?;
                let mut old_page = SlottedPage::new(old.data_mut());
                let _ = old_page.erase(rid.slot);
                let free = old_page.free_size();
                old.mark_dirty();
                drop(old);
                self.fsm.update(rid.page_id, free);
                Ok(new_rid)
            }
            Err(e) => {
                drop(guard);
                Err(e)
            }
        }
    }

    /// Tombstones the record at `rid`.
    pub fn erase(&self, rid: RecordId) -> Result<()> {
        let mut guard = self.pool.fetch_write(rid.page_id)?;
        let mut page = SlottedPage::new(guard.data_mut());
        page.erase(rid.slot)?;
        let free = page.free_size();
        guard.mark_dirty();
        drop(guard);
        self.fsm.update(rid.page_id, free);
        Ok(())
    }

    /// Reads the record at `rid` into an owned tuple.
    pub fn get(&self, rid: RecordId) -> Result<Tuple> {
        let guard = self.pool.fetch_read(rid.page_id)?;
        let page = SlottedPageRef::new(guard.data());
        let bytes = page.get(rid.slot)?;
        Ok(Tuple::from_bytes(bytes.to_vec()))
    }

    /// Forward scan over all live records.
    pub fn iter(&self) -> TableIter<'_> {
        TableIter::new(self)
    }

    pub fn segment_id(&self) -> SegmentId {
        self.seg_id
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Allocates a page from the segment, formats it, and registers its
    /// initial free size with the FSM. The format happens under a write pin
    /// released dirty; the free size is then read back under a clean pin.
    fn allocate_fresh_page(&self) -> Result<PageId> {
        let pid = self.segments.allocate_page(self.seg_id)?;
        {
            let mut guard = self.pool.fetch_write(pid)?;
            SlottedPage::init_new(guard.data_mut(), pid);
            guard.mark_dirty();
        }
        {
            let guard = self.pool.fetch_read(pid)?;
            let free = PageHeader::read_from(guard.data()).free_size;
            drop(guard);
            self.fsm.update(pid, free);
        }
        Ok(pid)
    }

    pub(crate) fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub(crate) fn segments(&self) -> &SegmentManager {
        &self.segments
    }
}
