//! Disk manager durability and layout tests

use heapstore::storage::disk::DiskManager;
use heapstore::{PageId, StorageError};

const PAGE_SIZE: u32 = 4096;

#[test]
fn test_pages_land_at_fixed_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.dbseg");
    let dm = DiskManager::new(&path, PAGE_SIZE).unwrap();

    let mut page = vec![0u8; PAGE_SIZE as usize];
    page[0] = 0xEE;
    dm.write_page(PageId::new(3), &page).unwrap();

    // Raw file check: page 3 starts at byte 3 * page_size.
    let raw = std::fs::read(&path).unwrap();
    assert_eq!(raw.len(), 4 * PAGE_SIZE as usize);
    assert_eq!(raw[3 * PAGE_SIZE as usize], 0xEE);
    // Skipped pages 0..3 are zero.
    assert!(raw[..3 * PAGE_SIZE as usize].iter().all(|&b| b == 0));
}

#[test]
fn test_persistence_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persist.dbseg");

    let mut page = vec![0u8; PAGE_SIZE as usize];
    for (i, b) in page.iter_mut().enumerate() {
        *b = (i % 253) as u8;
    }

    {
        let dm = DiskManager::new(&path, PAGE_SIZE).unwrap();
        dm.write_page(PageId::new(1), &page).unwrap();
        dm.sync().unwrap();
    }

    let dm = DiskManager::new(&path, PAGE_SIZE).unwrap();
    assert_eq!(dm.page_count(), 2);
    let mut back = vec![0u8; PAGE_SIZE as usize];
    dm.read_page(PageId::new(1), &mut back).unwrap();
    assert_eq!(back, page);
}

#[test]
fn test_page_count_floors_partial_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("floor.dbseg");
    std::fs::write(&path, vec![0u8; PAGE_SIZE as usize + 100]).unwrap();

    let dm = DiskManager::new(&path, PAGE_SIZE).unwrap();
    assert_eq!(dm.page_count(), 1);
}

#[test]
fn test_read_past_end_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let dm = DiskManager::new(dir.path().join("eof.dbseg"), PAGE_SIZE).unwrap();

    let mut buf = vec![0u8; PAGE_SIZE as usize];
    dm.write_page(PageId::new(0), &buf).unwrap();
    assert!(dm.read_page(PageId::new(0), &mut buf).is_ok());
    assert!(matches!(
        dm.read_page(PageId::new(1), &mut buf),
        Err(StorageError::NotFound(_))
    ));
}
