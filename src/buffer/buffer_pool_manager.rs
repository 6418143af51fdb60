use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{FrameId, PageId, Result, StrataError, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{Frame, LruReplacer};

/// Residency bookkeeping, guarded by a single mutex.
struct PoolInner {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that have never held a page, or were returned by delete_page
    free_list: VecDeque<FrameId>,
}

/// BufferPoolManager mediates access to the paged backing store through a
/// fixed array of in-memory frames. Pages are pinned while in use, written
/// back when dirty and evicted, and replaced under an LRU policy.
///
/// Every successful `fetch_page`/`new_page` must be balanced by exactly one
/// `unpin_page` on that page id.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// The buffer pool frames
    frames: Vec<Arc<Frame>>,
    /// Page table and free list
    inner: Mutex<PoolInner>,
    /// Evictable frames in LRU order; carries its own lock
    replacer: LruReplacer,
    /// Disk I/O queue
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Fetches a page into the buffer pool, pinning it.
    ///
    /// On a hit the pin count is incremented; on a miss a frame is taken
    /// from the free list or evicted (writing back its dirty contents), the
    /// page is read from disk and the frame re-homed with a pin count of 1.
    /// Fails with `PoolExhausted` when every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<Frame>> {
        if !page_id.is_valid() {
            return Err(StrataError::InvalidPageId(page_id));
        }

        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            if frame.pin() == 1 {
                self.replacer.pin(frame_id);
            }
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        if let Err(e) = self.disk_scheduler.schedule_read_sync(page_id, &mut data) {
            inner.free_list.push_front(frame_id);
            return Err(e);
        }

        frame.copy_from(&data);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(Arc::clone(frame))
    }

    /// Allocates a fresh page on disk and homes it in a zeroed frame with a
    /// pin count of 1. Fails with `PoolExhausted` when every frame is
    /// pinned.
    pub fn new_page(&self) -> Result<Arc<Frame>> {
        let mut inner = self.inner.lock();

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.frames[frame_id.as_usize()];

        let page_id = match self.disk_scheduler.disk_manager().allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                inner.free_list.push_front(frame_id);
                return Err(e);
            }
        };

        frame.set_page_id(page_id);
        frame.pin();

        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(Arc::clone(frame))
    }

    /// Releases one pin on a page, folding the caller's dirty flag into the
    /// frame. When the count reaches zero the frame becomes evictable.
    /// Returns false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];

        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if let Some(0) = frame.unpin() {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Writes a resident page back to disk if it is dirty, clearing the
    /// flag. Pin count and residency are unchanged. Returns false if the
    /// page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let inner = self.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.as_usize()];

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(page_id, &data)?;
            frame.set_dirty(false);
        }
        Ok(true)
    }

    /// Best-effort write-back of every resident dirty page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let inner = self.inner.lock();

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                self.disk_scheduler.schedule_write_sync(page_id, &data)?;
                frame.set_dirty(false);
            }
        }
        Ok(())
    }

    /// Drops a page from the pool and deallocates it on disk.
    /// Returns true when the page is absent (nothing to do) or deleted,
    /// false when the page is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Ok(false);
        }

        debug!(page_id = page_id.as_i32(), "buffer.delete_page");

        self.disk_scheduler.disk_manager().deallocate_page(page_id);
        self.replacer.pin(frame_id);
        inner.page_table.remove(&page_id);
        frame.reset();
        inner.free_list.push_back(frame_id);

        Ok(true)
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.inner.lock().free_list.len()
    }

    pub fn evictable_frame_count(&self) -> usize {
        self.replacer.size()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Obtains a reusable frame: the free list first, then an LRU victim.
    /// A dirty victim is written back before its frame is reset.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(StrataError::PoolExhausted)?;
        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            trace!(
                page_id = old_page_id.as_i32(),
                frame_id = frame_id.0,
                "buffer.evict_writeback"
            );
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            if let Err(e) = self.disk_scheduler.schedule_write_sync(old_page_id, &data) {
                // Put the victim back rather than losing the frame
                self.replacer.unpin(frame_id);
                return Err(e);
            }
        }

        inner.page_table.remove(&old_page_id);
        frame.reset();
        Ok(frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_buffer_pool_manager_new() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_buffer_pool_manager_new_page_pins() {
        let (bpm, _temp) = create_bpm(10);

        let frame = bpm.new_page().unwrap();
        let page_id = frame.page_id();

        assert_eq!(page_id, PageId::new(1)); // page 0 is the header page
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        assert_eq!(bpm.free_frame_count(), 9);

        assert!(bpm.unpin_page(page_id, false));
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_buffer_pool_manager_fetch_hit() {
        let (bpm, _temp) = create_bpm(10);

        let frame = bpm.new_page().unwrap();
        let page_id = frame.page_id();

        let again = bpm.fetch_page(page_id).unwrap();
        assert_eq!(again.page_id(), page_id);
        assert_eq!(bpm.get_pin_count(page_id), Some(2));

        assert!(bpm.unpin_page(page_id, false));
        assert!(bpm.unpin_page(page_id, false));
        assert!(!bpm.unpin_page(page_id, false));
    }

    #[test]
    fn test_buffer_pool_manager_write_survives_eviction() {
        let (bpm, _temp) = create_bpm(3);

        let frame = bpm.new_page().unwrap();
        let page_id = frame.page_id();
        frame.write_data()[0] = 42;
        bpm.unpin_page(page_id, true);

        // Force the page out by cycling more pages than frames
        for _ in 0..3 {
            let f = bpm.new_page().unwrap();
            let id = f.page_id();
            bpm.unpin_page(id, false);
        }

        let frame = bpm.fetch_page(page_id).unwrap();
        assert_eq!(frame.read_data()[0], 42);
        bpm.unpin_page(page_id, false);
    }

    #[test]
    fn test_buffer_pool_manager_pool_exhausted() {
        let (bpm, _temp) = create_bpm(2);

        let f1 = bpm.new_page().unwrap();
        let f2 = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(StrataError::PoolExhausted)));
        assert!(matches!(
            bpm.fetch_page(PageId::new(50)),
            Err(StrataError::PoolExhausted)
        ));

        bpm.unpin_page(f1.page_id(), false);
        bpm.unpin_page(f2.page_id(), false);
        assert!(bpm.new_page().is_ok());
    }

    #[test]
    fn test_buffer_pool_manager_flush_page() {
        let (bpm, temp) = create_bpm(10);

        let frame = bpm.new_page().unwrap();
        let page_id = frame.page_id();
        frame.write_data()[0] = 42;
        bpm.unpin_page(page_id, true);

        assert!(bpm.flush_page(page_id).unwrap());
        assert!(!frame.is_dirty());
        assert!(!bpm.flush_page(PageId::new(99)).unwrap());

        drop(bpm);

        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let bpm2 = BufferPoolManager::new(10, dm);
        let frame = bpm2.fetch_page(page_id).unwrap();
        assert_eq!(frame.read_data()[0], 42);
        bpm2.unpin_page(page_id, false);
    }

    #[test]
    fn test_buffer_pool_manager_delete_page() {
        let (bpm, _temp) = create_bpm(10);

        let frame = bpm.new_page().unwrap();
        let page_id = frame.page_id();

        // Pinned: refuse
        assert!(!bpm.delete_page(page_id).unwrap());

        bpm.unpin_page(page_id, false);
        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 10);

        // Not resident: nothing to do
        assert!(bpm.delete_page(page_id).unwrap());
    }

    #[test]
    fn test_buffer_pool_manager_unpin_absent() {
        let (bpm, _temp) = create_bpm(10);
        assert!(!bpm.unpin_page(PageId::new(3), false));
    }

    #[test]
    fn test_buffer_pool_manager_frame_accounting() {
        let (bpm, _temp) = create_bpm(4);

        let mut ids = Vec::new();
        for _ in 0..4 {
            let f = bpm.new_page().unwrap();
            ids.push(f.page_id());
        }
        assert_eq!(bpm.free_frame_count(), 0);
        assert_eq!(bpm.evictable_frame_count(), 0);

        for &id in &ids {
            bpm.unpin_page(id, false);
        }
        assert_eq!(bpm.evictable_frame_count(), 4);

        // free + evictable + pinned must cover the pool
        let f = bpm.fetch_page(ids[0]).unwrap();
        assert_eq!(bpm.evictable_frame_count(), 3);
        assert_eq!(bpm.free_frame_count(), 0);
        bpm.unpin_page(f.page_id(), false);
    }
}
