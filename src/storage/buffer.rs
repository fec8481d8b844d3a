use super::{FrameID, PageID, StorageError};
use crate::storage::disk::DiskManager;
use crate::storage::lruk::{AccessType, LruKReplacer};
use crate::storage::page::{Page, PageRef};
use crate::storage::scheduler::{DiskFuture, DiskRequest, DiskScheduler};
use itertools::Itertools;
use log::{debug, error, info};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

pub struct BufferPoolManager {
    latch: Mutex<PoolInner>,
}

struct PoolInner {
    buf: Vec<PageRef>,
    page_table: HashMap<PageID, FrameID>,
    free_list: VecDeque<FrameID>,
    replacer: LruKReplacer,
    scheduler: DiskScheduler,
    disk: Arc<Mutex<DiskManager>>,
    next_page_id: PageID,
}

pub type BufferPoolManagerRef = Arc<BufferPoolManager>;

impl BufferPoolManager {
    pub fn new(size: usize, k: usize) -> Self {
        Self::new_with_disk(size, k, DiskManager::new().unwrap())
    }
    pub fn new_random(size: usize, k: usize) -> Self {
        Self::new_with_disk(size, k, DiskManager::new_random().unwrap())
    }
    pub fn new_with_name(size: usize, k: usize, name: String) -> Self {
        Self::new_with_disk(size, k, DiskManager::new_with_name(name).unwrap())
    }
    pub fn new_with_disk(size: usize, k: usize, disk: DiskManager) -> Self {
        let disk = Arc::new(Mutex::new(disk));
        let buf = (0..size)
            .map(|_| Arc::new(RwLock::new(Page::new())))
            .collect_vec();
        Self {
            latch: Mutex::new(PoolInner {
                buf,
                page_table: HashMap::new(),
                free_list: (0..size).collect(),
                replacer: LruKReplacer::new(size, k),
                scheduler: DiskScheduler::new(disk.clone()),
                disk,
                next_page_id: 0,
            }),
        }
    }
    pub fn new_shared(size: usize, k: usize) -> Arc<Self> {
        Arc::new(Self::new(size, k))
    }
    pub fn new_random_shared(size: usize, k: usize) -> Arc<Self> {
        Arc::new(Self::new_random(size, k))
    }

    pub fn filename(&self) -> String {
        self.latch.lock().unwrap().disk.lock().unwrap().filename()
    }

    pub fn new_page(&self) -> Result<Option<PageRef>, StorageError> {
        let mut guard = self.latch.lock().unwrap();
        let inner = &mut *guard;
        let frame_id = match Self::acquire_frame(inner)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let page_id = inner.next_page_id;
        inner.next_page_id += 1;
        let page = inner.buf[frame_id].clone();
        {
            let mut page = page.write().unwrap();
            page.page_id = Some(page_id);
            page.pin_count = 1;
            page.is_dirty = false;
        }
        inner.replacer.record_access(frame_id, AccessType::Unknown)?;
        inner.replacer.set_evictable(frame_id, false);
        inner.page_table.insert(page_id, frame_id);
        info!("allocate page {} in frame {}", page_id, frame_id);
        Ok(Some(page))
    }

    pub fn fetch_page(
        &self,
        page_id: PageID,
        access_type: AccessType,
    ) -> Result<Option<PageRef>, StorageError> {
        let mut guard = self.latch.lock().unwrap();
        let inner = &mut *guard;
        // if we can find this page in buffer
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let page = inner.buf[frame_id].clone();
            page.write().unwrap().pin_count += 1;
            inner.replacer.record_access(frame_id, access_type)?;
            inner.replacer.set_evictable(frame_id, false);
            return Ok(Some(page));
        }
        // fetch from disk and put in buffer pool
        let frame_id = match Self::acquire_frame(inner)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let page = inner.buf[frame_id].clone();
        if !Self::wait(Self::schedule_read(inner, page.clone(), page_id)) {
            // the frame is clean and unmapped, give it back
            inner.free_list.push_back(frame_id);
            return Err(StorageError::DiskRequestFailed(page_id));
        }
        {
            let mut page = page.write().unwrap();
            page.page_id = Some(page_id);
            page.pin_count = 1;
            page.is_dirty = false;
        }
        inner.replacer.record_access(frame_id, access_type)?;
        inner.replacer.set_evictable(frame_id, false);
        inner.page_table.insert(page_id, frame_id);
        debug!("fetch page {} into frame {}", page_id, frame_id);
        Ok(Some(page))
    }

    pub fn unpin_page(&self, page_id: PageID, is_dirty: bool, _access_type: AccessType) -> bool {
        let mut guard = self.latch.lock().unwrap();
        let inner = &mut *guard;
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };
        let page = inner.buf[frame_id].clone();
        let mut page = page.write().unwrap();
        if is_dirty {
            page.is_dirty = true;
        }
        if page.pin_count > 0 {
            page.pin_count -= 1;
        }
        // ok to dump in replacer
        if page.pin_count == 0 {
            inner.replacer.set_evictable(frame_id, true);
        }
        true
    }

    pub fn flush_page(&self, page_id: PageID) -> Result<bool, StorageError> {
        let mut guard = self.latch.lock().unwrap();
        let inner = &mut *guard;
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        let page = inner.buf[frame_id].clone();
        if !Self::wait(Self::schedule_write(inner, page.clone(), page_id)) {
            return Err(StorageError::DiskRequestFailed(page_id));
        }
        page.write().unwrap().is_dirty = false;
        debug!("flush page {}", page_id);
        Ok(true)
    }

    pub fn flush_all_pages(&self) -> Result<(), StorageError> {
        let mut guard = self.latch.lock().unwrap();
        let inner = &mut *guard;
        let entries = inner
            .page_table
            .iter()
            .map(|(&page_id, &frame_id)| (page_id, frame_id))
            .collect_vec();
        for (page_id, frame_id) in entries {
            let page = inner.buf[frame_id].clone();
            if !Self::wait(Self::schedule_write(inner, page.clone(), page_id)) {
                return Err(StorageError::DiskRequestFailed(page_id));
            }
            page.write().unwrap().is_dirty = false;
        }
        Ok(())
    }

    pub fn delete_page(&self, page_id: PageID) -> Result<bool, StorageError> {
        let mut guard = self.latch.lock().unwrap();
        let inner = &mut *guard;
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(true),
        };
        let page = inner.buf[frame_id].clone();
        if page.read().unwrap().pin_count > 0 {
            return Ok(false);
        }
        inner.page_table.remove(&page_id);
        inner.replacer.remove(frame_id)?;
        page.write().unwrap().reset();
        inner.free_list.push_back(frame_id);
        inner.disk.lock().unwrap().deallocate(page_id);
        info!("delete page {}", page_id);
        Ok(true)
    }

    /// pull a frame from the free list, falling back to eviction; a dirty
    /// victim is written back before its frame is handed out
    fn acquire_frame(inner: &mut PoolInner) -> Result<Option<FrameID>, StorageError> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(Some(frame_id));
        }
        let frame_id = match inner.replacer.evict() {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let page = inner.buf[frame_id].clone();
        let (old_page_id, is_dirty) = {
            let page = page.read().unwrap();
            (page.page_id, page.is_dirty)
        };
        if let Some(old_page_id) = old_page_id {
            if is_dirty {
                // write back
                if !Self::wait(Self::schedule_write(inner, page.clone(), old_page_id)) {
                    // leave the mapping untouched, the frame stays resident
                    inner.replacer.record_access(frame_id, AccessType::Unknown)?;
                    inner.replacer.set_evictable(frame_id, true);
                    return Err(StorageError::DiskRequestFailed(old_page_id));
                }
            }
            // erase from page_table
            inner.page_table.remove(&old_page_id);
            debug!("evict page {} from frame {}", old_page_id, frame_id);
        }
        page.write().unwrap().reset();
        Ok(Some(frame_id))
    }

    fn schedule_write(inner: &PoolInner, page: PageRef, page_id: PageID) -> DiskFuture {
        let (promise, future) = DiskScheduler::create_promise();
        inner.scheduler.schedule(DiskRequest {
            is_write: true,
            page,
            page_id,
            promise,
        });
        future
    }

    fn schedule_read(inner: &PoolInner, page: PageRef, page_id: PageID) -> DiskFuture {
        let (promise, future) = DiskScheduler::create_promise();
        inner.scheduler.schedule(DiskRequest {
            is_write: false,
            page,
            page_id,
            promise,
        });
        future
    }

    fn wait(future: DiskFuture) -> bool {
        future.recv().unwrap_or(false)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        let mut guard = self.latch.lock().unwrap();
        let inner = &mut *guard;
        let entries = inner
            .page_table
            .iter()
            .map(|(&page_id, &frame_id)| (page_id, frame_id))
            .collect_vec();
        for (page_id, frame_id) in entries {
            let page = inner.buf[frame_id].clone();
            let is_dirty = page.read().unwrap().is_dirty;
            if is_dirty && !Self::wait(Self::schedule_write(inner, page, page_id)) {
                error!("write back page {} failed", page_id);
            }
        }
    }
}
