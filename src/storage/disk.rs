use super::*;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

pub struct DiskManager {
    file: File,
    filename: String,
}

impl DiskManager {
    pub fn new() -> Result<Self, StorageError> {
        Self::new_with_name(DEFAULT_DB_FILE.to_string())
    }
    pub fn new_random() -> Result<Self, StorageError> {
        Self::new_with_name(format!("naivebuf-{}.db", rand::random::<u32>()))
    }
    pub fn new_with_name(filename: String) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&filename)?;
        Ok(DiskManager { file, filename })
    }
    pub fn filename(&self) -> String {
        self.filename.clone()
    }
    pub fn read(&mut self, page_id: PageID, buffer: &mut [u8; PAGE_SIZE]) -> Result<(), StorageError> {
        let offset = page_id * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = self.file.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        // pages past the end of file have never been written, they read as zeros
        buffer[filled..].fill(0);
        Ok(())
    }
    pub fn write(&mut self, page_id: PageID, buffer: &[u8; PAGE_SIZE]) -> Result<(), StorageError> {
        let offset = page_id * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        Ok(())
    }
    pub fn deallocate(&mut self, page_id: PageID) {
        // best-effort notification, the file is not shrunk
        debug!("deallocate page {}", page_id);
    }
    pub fn num_pages(&self) -> Result<usize, StorageError> {
        let meta = self.file.metadata()?;
        let len = meta.len();
        assert_eq!(len % (PAGE_SIZE as u64), 0);
        Ok((len / (PAGE_SIZE as u64)) as usize)
    }
}
