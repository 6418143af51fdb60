//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;

use strata::buffer::BufferPoolManager;
use strata::common::{PageId, StrataError, PAGE_SIZE};
use strata::storage::disk::DiskManager;
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = BufferPoolManager::new(pool_size, dm);
    (bpm, temp_file)
}

#[test]
fn test_buffer_pool_basic_read_write() {
    let (bpm, _temp) = create_bpm(10);

    let frame = bpm.new_page().unwrap();
    let page_id = frame.page_id();
    // Page 0 is the header page, data pages start at 1
    assert_eq!(page_id, PageId::new(1));

    frame.write_data()[0] = 0xDE;
    frame.write_data()[1] = 0xAD;
    assert!(bpm.unpin_page(page_id, true));

    let frame = bpm.fetch_page(page_id).unwrap();
    assert_eq!(frame.read_data()[0], 0xDE);
    assert_eq!(frame.read_data()[1], 0xAD);
    assert!(bpm.unpin_page(page_id, false));
}

#[test]
fn test_buffer_pool_pin_semantics() {
    let (bpm, _temp) = create_bpm(10);

    let frame = bpm.new_page().unwrap();
    let page_id = frame.page_id();
    assert_eq!(bpm.get_pin_count(page_id), Some(1));

    let _again = bpm.fetch_page(page_id).unwrap();
    assert_eq!(bpm.get_pin_count(page_id), Some(2));

    assert!(bpm.unpin_page(page_id, false));
    assert!(bpm.unpin_page(page_id, false));
    assert_eq!(bpm.get_pin_count(page_id), Some(0));

    // A third unpin has nothing left to release
    assert!(!bpm.unpin_page(page_id, false));
}

#[test]
fn test_buffer_pool_dirty_flag_is_sticky() {
    let (bpm, _temp) = create_bpm(10);

    let frame = bpm.new_page().unwrap();
    let page_id = frame.page_id();
    frame.write_data()[0] = 1;
    assert!(bpm.unpin_page(page_id, true));

    // A later clean unpin must not wash out the dirty flag
    let frame = bpm.fetch_page(page_id).unwrap();
    assert!(bpm.unpin_page(page_id, false));
    assert!(frame.is_dirty());
}

#[test]
fn test_buffer_pool_eviction_writes_back_dirty_pages() {
    let (bpm, _temp) = create_bpm(3);

    let mut page_ids = Vec::new();
    for i in 0..3u8 {
        let frame = bpm.new_page().unwrap();
        frame.write_data()[0] = i + 1;
        page_ids.push(frame.page_id());
        bpm.unpin_page(frame.page_id(), true);
    }
    assert_eq!(bpm.free_frame_count(), 0);

    // Cycle three more pages through the pool, evicting the first three
    for _ in 0..3 {
        let frame = bpm.new_page().unwrap();
        bpm.unpin_page(frame.page_id(), false);
    }

    // The evicted pages must have been written back
    for (i, &page_id) in page_ids.iter().enumerate() {
        let frame = bpm.fetch_page(page_id).unwrap();
        assert_eq!(frame.read_data()[0], i as u8 + 1);
        bpm.unpin_page(page_id, false);
    }
}

#[test]
fn test_buffer_pool_exhaustion_and_recovery() {
    let (bpm, _temp) = create_bpm(3);

    let frames: Vec<_> = (0..3).map(|_| bpm.new_page().unwrap()).collect();
    assert!(matches!(bpm.new_page(), Err(StrataError::PoolExhausted)));

    bpm.unpin_page(frames[1].page_id(), false);
    let frame = bpm.new_page().unwrap();
    assert!(bpm.unpin_page(frame.page_id(), false));

    for f in [&frames[0], &frames[2]] {
        bpm.unpin_page(f.page_id(), false);
    }
}

#[test]
fn test_buffer_pool_flush_page_persists() {
    let (bpm, temp) = create_bpm(10);

    let frame = bpm.new_page().unwrap();
    let page_id = frame.page_id();
    frame.write_data()[100] = 0x5A;
    bpm.unpin_page(page_id, true);

    assert!(bpm.flush_page(page_id).unwrap());
    assert!(!bpm.flush_page(PageId::new(404)).unwrap());

    drop(bpm);

    let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
    let mut data = [0u8; PAGE_SIZE];
    dm.read_page(page_id, &mut data).unwrap();
    assert_eq!(data[100], 0x5A);
}

#[test]
fn test_buffer_pool_flush_all_pages() {
    let (bpm, temp) = create_bpm(10);

    let mut page_ids = Vec::new();
    for i in 0..5u8 {
        let frame = bpm.new_page().unwrap();
        frame.write_data()[0] = i + 10;
        page_ids.push(frame.page_id());
        bpm.unpin_page(frame.page_id(), true);
    }

    bpm.flush_all_pages().unwrap();
    drop(bpm);

    let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
    for (i, &page_id) in page_ids.iter().enumerate() {
        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut data).unwrap();
        assert_eq!(data[0], i as u8 + 10);
    }
}

#[test]
fn test_buffer_pool_delete_page() {
    let (bpm, _temp) = create_bpm(10);

    let frame = bpm.new_page().unwrap();
    let page_id = frame.page_id();

    // Pinned pages cannot be deleted
    assert!(!bpm.delete_page(page_id).unwrap());
    bpm.unpin_page(page_id, false);

    assert!(bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.get_pin_count(page_id), None);
    assert_eq!(bpm.free_frame_count(), 10);

    // Deleting a page that is not resident reports success
    assert!(bpm.delete_page(PageId::new(77)).unwrap());

    // The deallocated page id is recycled by the next allocation
    let frame = bpm.new_page().unwrap();
    assert_eq!(frame.page_id(), page_id);
    bpm.unpin_page(frame.page_id(), false);
}

#[test]
fn test_buffer_pool_frame_partition_invariant() {
    let (bpm, _temp) = create_bpm(5);

    let frames: Vec<_> = (0..3).map(|_| bpm.new_page().unwrap()).collect();
    // 3 pinned, 2 free, 0 evictable
    assert_eq!(bpm.free_frame_count(), 2);
    assert_eq!(bpm.evictable_frame_count(), 0);

    bpm.unpin_page(frames[0].page_id(), false);
    assert_eq!(bpm.free_frame_count(), 2);
    assert_eq!(bpm.evictable_frame_count(), 1);

    for f in &frames[1..] {
        bpm.unpin_page(f.page_id(), false);
    }
    assert_eq!(
        bpm.free_frame_count() + bpm.evictable_frame_count(),
        bpm.pool_size()
    );
}

#[test]
fn test_buffer_pool_concurrent_access() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(20, dm));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let bpm = Arc::clone(&bpm);
        handles.push(thread::spawn(move || {
            let mut page_ids = Vec::new();
            for _ in 0..10 {
                let frame = bpm.new_page().unwrap();
                let page_id = frame.page_id();
                let tag = (page_id.as_i32() % 251) as u8;
                frame.write_data()[0] = tag;
                bpm.unpin_page(page_id, true);
                page_ids.push(page_id);
            }
            for page_id in page_ids {
                let frame = bpm.fetch_page(page_id).unwrap();
                assert_eq!(frame.read_data()[0], (page_id.as_i32() % 251) as u8);
                bpm.unpin_page(page_id, false);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        bpm.free_frame_count() + bpm.evictable_frame_count(),
        bpm.pool_size()
    );
}
