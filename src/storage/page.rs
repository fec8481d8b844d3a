use super::*;
use std::sync::{Arc, RwLock};

pub struct Page {
    pub page_id: Option<PageID>,
    pub pin_count: usize,
    pub is_dirty: bool,
    pub buffer: [u8; PAGE_SIZE],
}

pub type PageRef = Arc<RwLock<Page>>;

impl Page {
    pub fn new() -> Self {
        Page {
            page_id: None,
            pin_count: 0,
            is_dirty: false,
            buffer: [0; PAGE_SIZE],
        }
    }

    /// reset the metadata and zero the buffer
    pub fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.is_dirty = false;
        self.buffer.fill(0);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
