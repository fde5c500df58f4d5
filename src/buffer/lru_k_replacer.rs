use crate::common::FrameId;

use super::replacer::Replacer;

#[derive(Debug, Default, Clone, Copy)]
struct Entry {
    present: bool,
    /// Most recent access.
    t1: u64,
    /// Second most recent access; 0 while the frame has been touched once.
    t2: u64,
}

/// LRU-K replacement policy (history depth two, the K=2 classic).
///
/// Each `unpin` counts as an access and shifts the newest timestamp into the
/// second slot. `victim` picks the present frame with the smallest
/// second-newest timestamp, falling back to the newest when the frame has
/// fewer than two accesses; ties go to the lowest frame id. Timestamps come
/// from a monotonic counter starting at 1 so that 0 always means "unset".
pub struct LruKReplacer {
    entries: Vec<Entry>,
    clock: u64,
    k: usize,
    capacity: usize,
}

impl LruKReplacer {
    pub fn new(capacity: usize, k: usize) -> Self {
        Self {
            entries: vec![Entry::default(); capacity],
            clock: 0,
            k: k.max(2),
            capacity,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn touch(&mut self, i: usize) {
        self.clock += 1;
        let e = &mut self.entries[i];
        e.t2 = e.t1;
        e.t1 = self.clock;
    }
}

impl Replacer for LruKReplacer {
    fn pin(&mut self, fid: FrameId) {
        let i = fid.as_usize();
        if i >= self.capacity {
            return;
        }
        self.entries[i].present = false;
    }

    fn unpin(&mut self, fid: FrameId) {
        let i = fid.as_usize();
        if i >= self.capacity {
            return;
        }
        self.entries[i].present = true;
        self.touch(i);
    }

    fn victim(&mut self) -> Option<FrameId> {
        let mut selected: Option<(usize, u64)> = None;
        for (i, e) in self.entries.iter().enumerate() {
            if !e.present {
                continue;
            }
            let key = if e.t2 != 0 { e.t2 } else { e.t1 };
            match selected {
                Some((_, best)) if key >= best => {}
                _ => selected = Some((i, key)),
            }
        }
        let (i, _) = selected?;
        self.entries[i].present = false;
        Some(FrameId::new(i as u32))
    }

    fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.present).count()
    }
}
