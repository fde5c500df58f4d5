use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};

use super::buffer_pool::PoolShared;

/// RAII pin for shared access to a page.
///
/// Holds the frame's latch in shared mode for its lifetime and unpins the
/// page (clean) on drop. The byte view stays valid exactly as long as the
/// guard: the pin blocks eviction, the latch blocks writers.
pub struct ReadPageGuard {
    shared: Arc<PoolShared>,
    pid: PageId,
    fid: FrameId,
    latch: Option<RwLockReadGuard<'static, ()>>,
}

impl ReadPageGuard {
    pub(crate) fn new(shared: Arc<PoolShared>, pid: PageId, fid: FrameId) -> Self {
        // Safety: the transmute only erases the borrow of `shared`, which
        // the guard keeps alive through its own Arc.
        let latch = unsafe {
            std::mem::transmute::<RwLockReadGuard<'_, ()>, RwLockReadGuard<'static, ()>>(
                shared.latches[fid.as_usize()].read(),
            )
        };
        Self {
            shared,
            pid,
            fid,
            latch: Some(latch),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.pid
    }

    pub fn data(&self) -> &[u8] {
        // Safety: pinned and share-latched for the guard's lifetime.
        unsafe { self.shared.frame_bytes(self.fid) }
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Release the latch before unpin takes the pool lock.
        self.latch.take();
        let _ = self.shared.unpin(self.pid, false);
    }
}

/// RAII pin for exclusive access to a page.
///
/// Holds the frame's latch in exclusive mode. Mutating the bytes does not by
/// itself mark the page dirty: call `mark_dirty` once the mutation has
/// succeeded, so that a failed in-page operation can still release the page
/// clean. Dropping the guard unpins with the accumulated dirty flag.
pub struct WritePageGuard {
    shared: Arc<PoolShared>,
    pid: PageId,
    fid: FrameId,
    dirty: bool,
    latch: Option<RwLockWriteGuard<'static, ()>>,
}

impl WritePageGuard {
    pub(crate) fn new(shared: Arc<PoolShared>, pid: PageId, fid: FrameId) -> Self {
        // Safety: as for ReadPageGuard.
        let latch = unsafe {
            std::mem::transmute::<RwLockWriteGuard<'_, ()>, RwLockWriteGuard<'static, ()>>(
                shared.latches[fid.as_usize()].write(),
            )
        };
        Self {
            shared,
            pid,
            fid,
            dirty: false,
            latch: Some(latch),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.pid
    }

    pub fn data(&self) -> &[u8] {
        // Safety: pinned and exclusively latched for the guard's lifetime.
        unsafe { self.shared.frame_bytes(self.fid) }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        // Safety: as for `data`, and the exclusive latch rules out readers.
        unsafe { self.shared.frame_bytes_mut(self.fid) }
    }

    /// Records that the page content changed; the drop-time unpin will
    /// carry the dirty flag.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Release the latch before unpin takes the pool lock.
        self.latch.take();
        let _ = self.shared.unpin(self.pid, self.dirty);
    }
}
