//! Integration tests for the slotted page format

use heapstore::storage::page::{SlottedPage, SlottedPageRef, PAGE_HEADER_SIZE, SLOT_SIZE};
use heapstore::{PageId, SlotId, StorageError};

const PAGE_SIZE: usize = 4096;

fn check_space_invariant(buf: &[u8]) {
    let view = SlottedPageRef::new(buf);
    let hdr = view.header();
    assert_eq!(
        hdr.free_off as usize + hdr.free_size as usize + hdr.slot_count as usize * SLOT_SIZE,
        buf.len(),
        "free_off + free_size + directory bytes must cover the page"
    );
}

#[test]
fn test_variable_length_records() {
    let mut buf = [0u8; PAGE_SIZE];
    SlottedPage::init_new(&mut buf, PageId::new(0));
    let mut page = SlottedPage::new(&mut buf);

    let records = [
        vec![1u8; 10],
        vec![2u8; 100],
        vec![3u8; 500],
        vec![4u8; 1000],
    ];
    let mut slots = Vec::new();
    for rec in &records {
        slots.push(page.insert(rec).unwrap());
    }

    for (slot, rec) in slots.iter().zip(&records) {
        assert_eq!(page.get(*slot).unwrap(), rec.as_slice());
    }
    check_space_invariant(&buf);
}

#[test]
fn test_tombstone_reuse_with_compaction() {
    // Ten ~300-byte records, four tombstones, then one record that only
    // fits once the holes are compacted away.
    let mut buf = [0u8; PAGE_SIZE];
    SlottedPage::init_new(&mut buf, PageId::new(0));
    let mut page = SlottedPage::new(&mut buf);

    let mut slots = Vec::new();
    for i in 0..10u8 {
        slots.push(page.insert(&[i; 300]).unwrap());
    }
    for &i in &[1usize, 3, 5, 7] {
        page.erase(slots[i]).unwrap();
    }
    assert!((page.free_size() as usize) < 1100);

    let slot = page.insert(&[0xEE; 1100]).unwrap();
    // Lowest tombstone reused, so the directory did not grow.
    assert_eq!(slot, SlotId::new(1));
    assert_eq!(page.slot_count(), 10);
    assert_eq!(page.get(slot).unwrap().len(), 1100);

    // Surviving records are byte-identical after the compaction.
    for &i in &[0usize, 2, 4, 6, 8, 9] {
        assert_eq!(page.get(slots[i]).unwrap(), &[i as u8; 300]);
    }
    check_space_invariant(&buf);
}

#[test]
fn test_fragmentation_reclaimed_only_by_compact() {
    let mut buf = [0u8; PAGE_SIZE];
    SlottedPage::init_new(&mut buf, PageId::new(0));
    let mut page = SlottedPage::new(&mut buf);

    let s0 = page.insert(&[1u8; 100]).unwrap();
    let s1 = page.insert(&[2u8; 100]).unwrap();
    let s2 = page.insert(&[3u8; 100]).unwrap();

    let free_before = page.free_size();
    page.erase(s1).unwrap();
    assert_eq!(page.free_size(), free_before);

    page.compact();
    assert!(page.free_size() > free_before);
    assert_eq!(page.get(s0).unwrap(), &[1u8; 100]);
    assert_eq!(page.get(s2).unwrap(), &[3u8; 100]);
    check_space_invariant(&buf);
}

#[test]
fn test_compact_preserves_slot_ids() {
    let mut buf = [0u8; PAGE_SIZE];
    SlottedPage::init_new(&mut buf, PageId::new(0));
    let mut page = SlottedPage::new(&mut buf);

    let s0 = page.insert(b"record zero").unwrap();
    let s1 = page.insert(b"record one").unwrap();
    let s2 = page.insert(b"record two").unwrap();
    page.erase(s1).unwrap();
    page.compact();

    assert_eq!(page.get(s0).unwrap(), b"record zero");
    assert!(matches!(page.get(s1), Err(StorageError::NotFound(_))));
    assert_eq!(page.get(s2).unwrap(), b"record two");
}

#[test]
fn test_update_in_place_then_grow_then_overflow() {
    let mut buf = [0u8; PAGE_SIZE];
    SlottedPage::init_new(&mut buf, PageId::new(0));
    let mut page = SlottedPage::new(&mut buf);

    let s = page.insert(&[7u8; 64]).unwrap();

    // Shrink in place.
    page.update(s, &[8u8; 32]).unwrap();
    assert_eq!(page.get(s).unwrap(), &[8u8; 32]);

    // Grow within the page.
    page.update(s, &[9u8; 256]).unwrap();
    assert_eq!(page.get(s).unwrap(), &[9u8; 256]);

    // Grow past what the page can ever hold.
    let too_big = vec![1u8; PAGE_SIZE - PAGE_HEADER_SIZE];
    assert!(matches!(
        page.update(s, &too_big),
        Err(StorageError::OutOfRange(_))
    ));
    assert_eq!(page.get(s).unwrap(), &[9u8; 256]);
    check_space_invariant(&buf);
}

#[test]
fn test_single_byte_record() {
    let mut buf = [0u8; PAGE_SIZE];
    SlottedPage::init_new(&mut buf, PageId::new(0));
    let mut page = SlottedPage::new(&mut buf);

    let s = page.insert(&[42]).unwrap();
    assert_eq!(page.get(s).unwrap(), &[42]);
}

#[test]
fn test_largest_possible_record() {
    let mut buf = [0u8; PAGE_SIZE];
    SlottedPage::init_new(&mut buf, PageId::new(0));
    let mut page = SlottedPage::new(&mut buf);

    let max = PAGE_SIZE - PAGE_HEADER_SIZE - SLOT_SIZE;
    let s = page.insert(&vec![0xAB; max]).unwrap();
    assert_eq!(page.get(s).unwrap().len(), max);
    assert_eq!(page.free_size(), 0);
    check_space_invariant(&buf);
}

#[test]
fn test_live_slots_readable_through_ref_view() {
    let mut buf = [0u8; PAGE_SIZE];
    SlottedPage::init_new(&mut buf, PageId::new(0));
    {
        let mut page = SlottedPage::new(&mut buf);
        page.insert(b"one").unwrap();
        let s = page.insert(b"two").unwrap();
        page.insert(b"three").unwrap();
        page.erase(s).unwrap();
    }

    let view = SlottedPageRef::new(&buf);
    assert_eq!(view.slot_count(), 3);
    assert_eq!(view.live_count(), 2);
    assert_eq!(view.get(SlotId::new(0)).unwrap(), b"one");
    assert!(view.get(SlotId::new(1)).is_err());
    assert_eq!(view.get(SlotId::new(2)).unwrap(), b"three");
}
