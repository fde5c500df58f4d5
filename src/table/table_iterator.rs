use crate::common::{PageId, RecordId, SlotId};
use crate::storage::page::SlottedPageRef;
use crate::tuple::Tuple;

use super::table_heap::TableHeap;

/// Forward scan over a table heap.
///
/// Walks pages from id 0 and slots from 0, skipping tombstones and pages
/// that fail to load. Every yielded tuple is a deep copy and the page pin is
/// released before the item is returned, so the iterator never holds a pin
/// across yields. Once exhausted it stays exhausted, even if the segment
/// grows afterwards.
pub struct TableIter<'a> {
    heap: &'a TableHeap,
    next_pid: u32,
    next_slot: u16,
    done: bool,
}

impl<'a> TableIter<'a> {
    pub(crate) fn new(heap: &'a TableHeap) -> Self {
        Self {
            heap,
            next_pid: 0,
            next_slot: 0,
            done: false,
        }
    }
}

impl Iterator for TableIter<'_> {
    type Item = (RecordId, Tuple);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let pages = self.heap.segments().page_count(self.heap.segment_id());
        let mut pid = self.next_pid;
        let mut slot = self.next_slot;

        while (pid as u64) < pages {
            if let Ok(guard) = self.heap.pool().fetch_read(PageId::new(pid)) {
                let page = SlottedPageRef::new(guard.data());
                let slot_count = page.slot_count();
                while slot < slot_count {
                    if let Ok(bytes) = page.get(SlotId::new(slot)) {
                        let rid = RecordId::new(PageId::new(pid), SlotId::new(slot));
                        let tuple = Tuple::from_bytes(bytes.to_vec());
                        self.next_pid = pid;
                        self.next_slot = slot + 1;
                        return Some((rid, tuple));
                    }
                    slot += 1;
                }
            }
            pid += 1;
            slot = 0;
        }

        self.done = true;
        None
    }
}
