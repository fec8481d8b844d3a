use thiserror::Error;

mod buffer;
mod disk;
mod lruk;
mod page;
mod scheduler;

pub use buffer::{BufferPoolManager, BufferPoolManagerRef};
pub use disk::DiskManager;
pub use lruk::{AccessType, LruKReplacer};
pub use page::{Page, PageRef};
pub use scheduler::{DiskFuture, DiskPromise, DiskRequest, DiskScheduler};

pub const PAGE_SIZE: usize = 4096;
const DEFAULT_DB_FILE: &str = "naivebuf.db";

pub type PageID = u64;
pub type FrameID = usize;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IOError: {0}")]
    IOError(#[from] std::io::Error),
    #[error("DiskRequestFailed: page {0}")]
    DiskRequestFailed(PageID),
    #[error("FrameOutOfRange: frame {0}")]
    FrameOutOfRange(FrameID),
    #[error("RemoveNonEvictable: frame {0}")]
    RemoveNonEvictable(FrameID),
}
