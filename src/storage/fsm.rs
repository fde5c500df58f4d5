use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;

use crate::common::{PageId, Result, SegmentId, StorageError};

/// Probe returning a page's on-disk recorded free size.
pub type FreeProbeFn = Box<dyn Fn(SegmentId, PageId) -> u16 + Send + Sync>;

/// Probe returning a segment's addressable page count.
pub type PageCountFn = Box<dyn Fn(SegmentId) -> u64 + Send + Sync>;

struct FsmState {
    /// Strictly increasing bucket thresholds.
    thresholds: Vec<u32>,
    /// Per-bucket page sets. Ordered so `find` iterates deterministically.
    bins: Vec<BTreeSet<PageId>>,
    page_bin: HashMap<PageId, usize>,
    page_free: HashMap<PageId, u16>,
    probe_free: Option<FreeProbeFn>,
    probe_count: Option<PageCountFn>,
}

impl FsmState {
    /// Bucket for a free size: bin `i` covers `[t_{i-1}, t_i)` with
    /// `t_{-1} = 0` and `t_N = ∞`.
    fn bin_index(&self, free_bytes: u32) -> usize {
        self.thresholds.partition_point(|&t| t <= free_bytes)
    }
}

/// Bucketed page → free-bytes index.
///
/// The recorded free size is whatever the caller last reported, so it is
/// advisory: `find` re-checks the stored value against the request, and the
/// table heap re-reports after every page mutation. Thresholds are
/// normalized (sorted, deduplicated) at construction; the number of bins is
/// one more than the number of thresholds.
pub struct FreeSpaceManager {
    page_size: u32,
    state: Mutex<FsmState>,
}

impl FreeSpaceManager {
    pub fn new(page_size: u32, thresholds: Vec<u32>) -> Self {
        let mut thresholds = thresholds;
        thresholds.sort_unstable();
        thresholds.dedup();
        let bins = vec![BTreeSet::new(); thresholds.len() + 1];
        Self {
            page_size,
            state: Mutex::new(FsmState {
                thresholds,
                bins,
                page_bin: HashMap::new(),
                page_free: HashMap::new(),
                probe_free: None,
                probe_count: None,
            }),
        }
    }

    /// Finds any page whose recorded free size can hold `need_bytes`,
    /// searching from the bucket that could contain an exact fit upward.
    pub fn find(&self, need_bytes: u16) -> Option<PageId> {
        let state = self.state.lock();
        let start = state.bin_index(need_bytes as u32);
        for bin in &state.bins[start..] {
            for &pid in bin {
                if let Some(&free) = state.page_free.get(&pid) {
                    if free >= need_bytes {
                        return Some(pid);
                    }
                }
            }
        }
        None
    }

    /// Records `free_bytes` for `pid`, migrating it between buckets when
    /// the new value crosses a threshold.
    pub fn update(&self, pid: PageId, free_bytes: u16) {
        let mut state = self.state.lock();
        let new_bin = state.bin_index(free_bytes as u32);
        if let Some(&old_bin) = state.page_bin.get(&pid) {
            if old_bin != new_bin {
                state.bins[old_bin].remove(&pid);
                state.bins[new_bin].insert(pid);
                state.page_bin.insert(pid, new_bin);
            }
            state.page_free.insert(pid, free_bytes);
            return;
        }
        state.bins[new_bin].insert(pid);
        state.page_bin.insert(pid, new_bin);
        state.page_free.insert(pid, free_bytes);
    }

    /// Forgets `pid` entirely.
    pub fn remove(&self, pid: PageId) {
        let mut state = self.state.lock();
        let Some(bin) = state.page_bin.remove(&pid) else {
            return;
        };
        state.bins[bin].remove(&pid);
        state.page_free.remove(&pid);
    }

    /// Installs the segment probes used by `rebuild_from_segment`. The
    /// segment layer injects these after startup so the FSM stays decoupled
    /// from file management.
    pub fn register_segment_probe(&self, probe_free: FreeProbeFn, probe_count: PageCountFn) {
        let mut state = self.state.lock();
        state.probe_free = Some(probe_free);
        state.probe_count = Some(probe_count);
    }

    /// Drops all state and re-inserts every page of `seg` from the probe.
    pub fn rebuild_from_segment(&self, seg: SegmentId) -> Result<()> {
        let mut state = self.state.lock();
        if state.probe_free.is_none() || state.probe_count.is_none() {
            return Err(StorageError::Unavailable(
                "fsm rebuild: no segment probe registered".to_string(),
            ));
        }

        for bin in &mut state.bins {
            bin.clear();
        }
        state.page_bin.clear();
        state.page_free.clear();

        let pages = state.probe_count.as_ref().map(|f| f(seg)).unwrap_or(0);
        for i in 0..pages {
            let pid = PageId::new(i as u32);
            let free = state.probe_free.as_ref().map(|f| f(seg, pid)).unwrap_or(0);
            let bin = state.bin_index(free as u32);
            state.bins[bin].insert(pid);
            state.page_bin.insert(pid, bin);
            state.page_free.insert(pid, free);
        }
        Ok(())
    }

    /// Bucket a given free size falls into, for rebuild verification.
    pub fn bin_index(&self, free_bytes: u32) -> usize {
        self.state.lock().bin_index(free_bytes)
    }

    /// Recorded free size for `pid`, if tracked.
    pub fn recorded_free(&self, pid: PageId) -> Option<u16> {
        self.state.lock().page_free.get(&pid).copied()
    }

    pub fn bin_sizes(&self) -> Vec<usize> {
        self.state.lock().bins.iter().map(|b| b.len()).collect()
    }

    pub fn bin_thresholds(&self) -> Vec<u32> {
        self.state.lock().thresholds.clone()
    }

    pub fn total_tracked(&self) -> usize {
        self.state.lock().page_bin.len()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}
