use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::common::{FrameId, Lsn, PageId, Result, StorageError, StorageOptions};
use crate::storage::disk::DiskManager;
use crate::storage::page::PageHeader;

use super::page_guard::{ReadPageGuard, WritePageGuard};
use super::replacer::{build_replacer, Replacer};

/// Callback invoked with `(page_id, page_lsn)` immediately before a page is
/// written back. This is the log-before-data integration point: a WAL
/// implementation forces its log up to `page_lsn` here. The hook must not
/// call back into the pool.
pub type FlushHook = Box<dyn Fn(PageId, Lsn) + Send + Sync>;

/// Counter snapshot taken under the pool lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flushes: u64,
}

#[derive(Debug)]
struct Frame {
    page_id: Option<PageId>,
    pin_count: u32,
    dirty: bool,
}

impl Frame {
    fn new() -> Self {
        Self {
            page_id: None,
            pin_count: 0,
            dirty: false,
        }
    }

    fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.dirty = false;
    }
}

/// One contiguous allocation backing every frame. The box is only held for
/// ownership; all access goes through the raw pointer so that guards can
/// reference their frame's bytes without touching the pool lock.
struct Arena {
    ptr: *mut u8,
    len: usize,
    _buf: Box<[u8]>,
}

unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    fn new(len: usize) -> Self {
        let mut buf = vec![0u8; len].into_boxed_slice();
        let ptr = buf.as_mut_ptr();
        Self { ptr, len, _buf: buf }
    }
}

struct PoolState {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: Box<dyn Replacer>,
    stats: BufferStats,
    flush_hook: Option<FlushHook>,
}

/// Shared pool internals. Guards hold an `Arc` to this so the arena and the
/// frame latches outlive every outstanding pin.
pub(crate) struct PoolShared {
    page_size: usize,
    num_frames: usize,
    disk: Arc<DiskManager>,
    arena: Arena,
    /// Page-content latches, one per frame, acquired outside the pool lock.
    pub(crate) latches: Vec<RwLock<()>>,
    state: Mutex<PoolState>,
}

impl PoolShared {
    /// # Safety
    /// The caller must either hold the frame's latch (shared for reads,
    /// exclusive for writes) under an active pin, or hold the pool lock on a
    /// frame with zero pins.
    pub(crate) unsafe fn frame_bytes(&self, fid: FrameId) -> &[u8] {
        let off = fid.as_usize() * self.page_size;
        debug_assert!(off + self.page_size <= self.arena.len);
        std::slice::from_raw_parts(self.arena.ptr.add(off), self.page_size)
    }

    /// # Safety
    /// Same contract as `frame_bytes`, with exclusive access.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn frame_bytes_mut(&self, fid: FrameId) -> &mut [u8] {
        let off = fid.as_usize() * self.page_size;
        debug_assert!(off + self.page_size <= self.arena.len);
        std::slice::from_raw_parts_mut(self.arena.ptr.add(off), self.page_size)
    }

    pub(crate) fn unpin(&self, pid: PageId, dirty: bool) -> Result<()> {
        let mut state = self.state.lock();
        let Some(&fid) = state.page_table.get(&pid) else {
            return Err(StorageError::NotFound(format!(
                "unpin: {pid} not in buffer pool"
            )));
        };
        let f = &mut state.frames[fid.as_usize()];
        if f.pin_count == 0 {
            return Err(StorageError::InvalidArgument(format!(
                "unpin: {pid} has zero pins"
            )));
        }
        f.pin_count -= 1;
        f.dirty |= dirty;
        if f.pin_count == 0 {
            state.replacer.unpin(fid);
        }
        Ok(())
    }
}

/// Fixed-capacity page cache over one `DiskManager`.
///
/// A coarse mutex guards the page table, free list, replacer, statistics and
/// flush hook; it is held across the disk read in a fetch miss and across
/// the disk writes of flush and eviction. Page content is additionally
/// protected by per-frame reader/writer latches that the page guards hold
/// for their lifetime.
///
/// Each `page_id` resides in at most one frame at any instant, and a frame
/// with a nonzero pin count is never a replacement candidate.
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    pub fn new(
        num_frames: usize,
        page_size: u32,
        disk: Arc<DiskManager>,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        let page_size = page_size as usize;
        let mut frames = Vec::with_capacity(num_frames);
        let mut free_list = VecDeque::with_capacity(num_frames);
        let mut latches = Vec::with_capacity(num_frames);
        for i in 0..num_frames {
            frames.push(Frame::new());
            free_list.push_back(FrameId::new(i as u32));
            latches.push(RwLock::new(()));
        }

        Self {
            shared: Arc::new(PoolShared {
                page_size,
                num_frames,
                disk,
                arena: Arena::new(num_frames * page_size),
                latches,
                state: Mutex::new(PoolState {
                    frames,
                    page_table: HashMap::new(),
                    free_list,
                    replacer,
                    stats: BufferStats::default(),
                    flush_hook: None,
                }),
            }),
        }
    }

    /// Builds the pool with the replacer named by `options.replacer`.
    pub fn with_options(options: &StorageOptions, disk: Arc<DiskManager>) -> Self {
        let replacer = build_replacer(&options.replacer, options.buffer_pool_frames);
        Self::new(
            options.buffer_pool_frames,
            options.page_size,
            disk,
            replacer,
        )
    }

    /// Pins `pid` for shared access, reading it from disk on a miss.
    pub fn fetch_read(&self, pid: PageId) -> Result<ReadPageGuard> {
        let fid = self.pin_page(pid)?;
        Ok(ReadPageGuard::new(Arc::clone(&self.shared), pid, fid))
    }

    /// Pins `pid` for exclusive access, reading it from disk on a miss.
    pub fn fetch_write(&self, pid: PageId) -> Result<WritePageGuard> {
        let fid = self.pin_page(pid)?;
        Ok(WritePageGuard::new(Arc::clone(&self.shared), pid, fid))
    }

    /// Allocates the next page id off the end of the file, zeroes a frame
    /// for it, and writes the zero page through so the file grows. The page
    /// comes back pinned for writing.
    pub fn new_page(&self) -> Result<WritePageGuard> {
        let shared = &self.shared;
        let (pid, fid) = {
            let mut state = shared.state.lock();
            let fid = Self::acquire_frame(shared, &mut state)?;
            let pid = PageId::new(shared.disk.page_count() as u32);

            // No pins, no latch holders: the frame is exclusively ours.
            let buf = unsafe { shared.frame_bytes_mut(fid) };
            buf.fill(0);
            if let Err(e) = shared.disk.write_page(pid, buf) {
                state.frames[fid.as_usize()].reset();
                state.free_list.push_front(fid);
                return Err(e);
            }

            let f = &mut state.frames[fid.as_usize()];
            f.page_id = Some(pid);
            f.pin_count = 1;
            f.dirty = false;
            state.page_table.insert(pid, fid);
            state.replacer.pin(fid);
            (pid, fid)
        };
        Ok(WritePageGuard::new(Arc::clone(shared), pid, fid))
    }

    /// Drops one pin on `pid`; `dirty` is OR-accumulated into the frame.
    /// Prefer the guards — they call this on drop.
    pub fn unpin(&self, pid: PageId, dirty: bool) -> Result<()> {
        self.shared.unpin(pid, dirty)
    }

    /// Writes `pid` back if it is resident and dirty (no-op when clean).
    /// The pre-flush hook runs before the write. Do not call while holding a
    /// write guard on the same page; release the guard first.
    pub fn flush_page(&self, pid: PageId) -> Result<()> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        let Some(&fid) = state.page_table.get(&pid) else {
            return Err(StorageError::NotFound(format!(
                "flush: {pid} not in buffer pool"
            )));
        };
        if Self::flush_frame(shared, &mut state, fid)? {
            state.stats.flushes += 1;
        }
        Ok(())
    }

    /// Flushes every dirty resident page. Pins are left untouched and no
    /// inter-page ordering is guaranteed; call `DiskManager::sync` for a
    /// durability barrier.
    pub fn flush_all(&self) -> Result<()> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        let mut first_err = None;
        for i in 0..shared.num_frames {
            let fid = FrameId::new(i as u32);
            match Self::flush_frame(shared, &mut state, fid) {
                Ok(true) => state.stats.flushes += 1,
                Ok(false) => {}
                Err(e) => first_err = first_err.or(Some(e)),
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    pub fn stats(&self) -> BufferStats {
        self.shared.state.lock().stats
    }

    /// Replaces the pre-flush hook.
    pub fn register_flush_hook(&self, hook: FlushHook) {
        self.shared.state.lock().flush_hook = Some(hook);
    }

    /// Pin count of a resident page, `None` when not resident.
    pub fn pin_count(&self, pid: PageId) -> Option<u32> {
        let state = self.shared.state.lock();
        state
            .page_table
            .get(&pid)
            .map(|fid| state.frames[fid.as_usize()].pin_count)
    }

    pub fn free_frame_count(&self) -> usize {
        self.shared.state.lock().free_list.len()
    }

    pub fn page_size(&self) -> usize {
        self.shared.page_size
    }

    pub fn num_frames(&self) -> usize {
        self.shared.num_frames
    }

    /// Looks `pid` up, pinning on a hit or loading into a fresh frame on a
    /// miss. A failed disk read returns the frame to the free list.
    fn pin_page(&self, pid: PageId) -> Result<FrameId> {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        if let Some(&fid) = state.page_table.get(&pid) {
            state.frames[fid.as_usize()].pin_count += 1;
            state.replacer.pin(fid);
            state.stats.hits += 1;
            return Ok(fid);
        }

        let fid = Self::acquire_frame(shared, &mut state)?;
        let buf = unsafe { shared.frame_bytes_mut(fid) };
        if let Err(e) = shared.disk.read_page(pid, buf) {
            state.frames[fid.as_usize()].reset();
            state.free_list.push_front(fid);
            return Err(e);
        }

        let f = &mut state.frames[fid.as_usize()];
        f.page_id = Some(pid);
        f.pin_count = 1;
        f.dirty = false;
        state.page_table.insert(pid, fid);
        state.replacer.pin(fid);
        state.stats.misses += 1;
        Ok(fid)
    }

    /// Takes a frame from the free list, or evicts a victim. A dirty victim
    /// is written back first; if that write fails the eviction is aborted,
    /// the victim rejoins the candidate set, and the error surfaces.
    fn acquire_frame(shared: &PoolShared, state: &mut PoolState) -> Result<FrameId> {
        if let Some(fid) = state.free_list.pop_front() {
            return Ok(fid);
        }

        // A clock sweep may spend its whole revolution granting grace
        // passes; ask once more before declaring the pool full.
        let victim = state.replacer.victim().or_else(|| state.replacer.victim());
        let Some(fid) = victim else {
            return Err(StorageError::Unavailable(
                "no evictable frame in buffer pool".to_string(),
            ));
        };

        if let Some(old_pid) = state.frames[fid.as_usize()].page_id {
            if state.frames[fid.as_usize()].dirty {
                match Self::flush_frame(shared, state, fid) {
                    Ok(true) => state.stats.flushes += 1,
                    Ok(false) => {}
                    Err(e) => {
                        state.replacer.unpin(fid);
                        return Err(e);
                    }
                }
            }
            state.page_table.remove(&old_pid);
            state.stats.evictions += 1;
            debug!(page = %old_pid, frame = %fid, "evicted page");
        }
        state.frames[fid.as_usize()].reset();
        Ok(fid)
    }

    /// Writes one frame back if it holds a dirty page. Returns whether bytes
    /// reached the disk manager. The flush hook sees `(page_id, page_lsn)`
    /// before the write.
    fn flush_frame(shared: &PoolShared, state: &mut PoolState, fid: FrameId) -> Result<bool> {
        let (pid, dirty) = {
            let f = &state.frames[fid.as_usize()];
            (f.page_id, f.dirty)
        };
        let Some(pid) = pid else { return Ok(false) };
        if !dirty {
            return Ok(false);
        }

        let _latch = shared.latches[fid.as_usize()].read();
        let buf = unsafe { shared.frame_bytes(fid) };
        if let Some(hook) = &state.flush_hook {
            let lsn = PageHeader::read_lsn(buf);
            debug!(page = %pid, lsn, "pre-flush hook");
            hook(pid, lsn);
        }
        shared.disk.write_page(pid, buf)?;
        state.frames[fid.as_usize()].dirty = false;
        Ok(true)
    }
}
