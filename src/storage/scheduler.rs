use super::*;
use crate::storage::disk::DiskManager;
use crate::storage::page::PageRef;
use log::error;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// a single page-sized I/O operation, the promise is fulfilled with
/// true iff the operation reached the disk
pub struct DiskRequest {
    pub is_write: bool,
    pub page: PageRef,
    pub page_id: PageID,
    pub promise: DiskPromise,
}

pub type DiskPromise = Sender<bool>;
pub type DiskFuture = Receiver<bool>;

pub struct DiskScheduler {
    queue: Option<Sender<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk: Arc<Mutex<DiskManager>>) -> Self {
        let (queue, requests) = channel();
        let worker = std::thread::spawn(move || Self::run_worker(disk, requests));
        DiskScheduler {
            queue: Some(queue),
            worker: Some(worker),
        }
    }

    pub fn create_promise() -> (DiskPromise, DiskFuture) {
        channel()
    }

    pub fn schedule(&self, request: DiskRequest) {
        // the queue only closes on drop, the worker outlives every issuer
        self.queue.as_ref().unwrap().send(request).unwrap();
    }

    fn run_worker(disk: Arc<Mutex<DiskManager>>, requests: Receiver<DiskRequest>) {
        for request in requests {
            let result = if request.is_write {
                let page = request.page.read().unwrap();
                disk.lock().unwrap().write(request.page_id, &page.buffer)
            } else {
                let mut page = request.page.write().unwrap();
                disk.lock().unwrap().read(request.page_id, &mut page.buffer)
            };
            let done = match result {
                Ok(()) => true,
                Err(err) => {
                    error!("disk request for page {} failed: {}", request.page_id, err);
                    false
                }
            };
            // the issuer may have given up waiting
            let _ = request.promise.send(done);
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // close the queue, then let the worker drain it
        self.queue.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::Page;
    use std::fs::remove_file;
    use std::sync::RwLock;

    #[test]
    fn schedule_write_read_test() {
        let disk = Arc::new(Mutex::new(DiskManager::new_random().unwrap()));
        let filename = disk.lock().unwrap().filename();
        let scheduler = DiskScheduler::new(disk);
        // write one page through the scheduler
        let page = Arc::new(RwLock::new(Page::new()));
        page.write().unwrap().buffer[..5].copy_from_slice(b"hello");
        let (promise, future) = DiskScheduler::create_promise();
        scheduler.schedule(DiskRequest {
            is_write: true,
            page: page.clone(),
            page_id: 0,
            promise,
        });
        assert!(future.recv().unwrap());
        // read it back into a fresh page
        let readback = Arc::new(RwLock::new(Page::new()));
        let (promise, future) = DiskScheduler::create_promise();
        scheduler.schedule(DiskRequest {
            is_write: false,
            page: readback.clone(),
            page_id: 0,
            promise,
        });
        assert!(future.recv().unwrap());
        assert_eq!(&readback.read().unwrap().buffer[..5], b"hello");
        drop(scheduler);
        remove_file(filename).unwrap();
    }

    #[test]
    fn schedule_many_test() {
        let disk = Arc::new(Mutex::new(DiskManager::new_random().unwrap()));
        let filename = disk.lock().unwrap().filename();
        let scheduler = DiskScheduler::new(disk);
        // several outstanding requests complete in arrival order
        let mut futures = vec![];
        for page_id in 0..16u64 {
            let page = Arc::new(RwLock::new(Page::new()));
            page.write().unwrap().buffer[0] = page_id as u8;
            let (promise, future) = DiskScheduler::create_promise();
            scheduler.schedule(DiskRequest {
                is_write: true,
                page,
                page_id,
                promise,
            });
            futures.push(future);
        }
        for future in futures {
            assert!(future.recv().unwrap());
        }
        for page_id in 0..16u64 {
            let page = Arc::new(RwLock::new(Page::new()));
            let (promise, future) = DiskScheduler::create_promise();
            scheduler.schedule(DiskRequest {
                is_write: false,
                page: page.clone(),
                page_id,
                promise,
            });
            assert!(future.recv().unwrap());
            assert_eq!(page.read().unwrap().buffer[0], page_id as u8);
        }
        drop(scheduler);
        remove_file(filename).unwrap();
    }
}
