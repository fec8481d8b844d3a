use super::*;
use log::debug;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    Unknown,
    Lookup,
    Scan,
    Index,
}

struct LruKNode {
    /// most recent accesses, oldest first, at most k entries
    history: VecDeque<u64>,
    evictable: bool,
}

impl LruKNode {
    /// the oldest retained timestamp doubles as the node's bucket key: it is
    /// the first-access time while the node has fewer than k accesses, and
    /// the k-th most recent access time once the history is full
    fn bucket_key(&self) -> u64 {
        *self.history.front().unwrap()
    }
}

struct ReplacerInner {
    node_store: HashMap<FrameID, LruKNode>,
    /// frames with fewer than k recorded accesses, keyed by first-access time
    history_bucket: BTreeMap<u64, FrameID>,
    /// frames with at least k recorded accesses, keyed by k-th most recent access time
    buffer_bucket: BTreeMap<u64, FrameID>,
    current_timestamp: u64,
    curr_size: usize,
}

pub struct LruKReplacer {
    inner: Mutex<ReplacerInner>,
    replacer_size: usize,
    k: usize,
}

impl LruKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0);
        LruKReplacer {
            inner: Mutex::new(ReplacerInner {
                node_store: HashMap::new(),
                history_bucket: BTreeMap::new(),
                buffer_bucket: BTreeMap::new(),
                current_timestamp: 0,
                curr_size: 0,
            }),
            replacer_size: num_frames,
            k,
        }
    }

    pub fn record_access(
        &self,
        frame_id: FrameID,
        _access_type: AccessType,
    ) -> Result<(), StorageError> {
        if frame_id >= self.replacer_size {
            return Err(StorageError::FrameOutOfRange(frame_id));
        }
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        inner.current_timestamp += 1;
        let timestamp = inner.current_timestamp;
        if !inner.node_store.contains_key(&frame_id) {
            let mut history = VecDeque::with_capacity(self.k);
            history.push_back(timestamp);
            inner.node_store.insert(
                frame_id,
                LruKNode {
                    history,
                    evictable: false,
                },
            );
            if self.k == 1 {
                inner.buffer_bucket.insert(timestamp, frame_id);
            } else {
                inner.history_bucket.insert(timestamp, frame_id);
            }
            return Ok(());
        }
        let node = inner.node_store.get_mut(&frame_id).unwrap();
        if node.history.len() < self.k {
            node.history.push_back(timestamp);
            // the first-access key is unchanged until the history fills up,
            // at which point the node moves to the buffer bucket
            if node.history.len() == self.k {
                let key = node.bucket_key();
                inner.history_bucket.remove(&key);
                inner.buffer_bucket.insert(key, frame_id);
            }
        } else {
            let old_key = node.history.pop_front().unwrap();
            node.history.push_back(timestamp);
            inner.buffer_bucket.remove(&old_key);
            inner.buffer_bucket.insert(node.bucket_key(), frame_id);
        }
        Ok(())
    }

    pub fn set_evictable(&self, frame_id: FrameID, evictable: bool) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        if let Some(node) = inner.node_store.get_mut(&frame_id) {
            if node.evictable != evictable {
                node.evictable = evictable;
                if evictable {
                    inner.curr_size += 1;
                } else {
                    inner.curr_size -= 1;
                }
            }
        }
    }

    /// victim with the largest backward k-distance: any frame still short of
    /// k accesses counts as infinitely distant, ties fall to the oldest key
    pub fn evict(&self) -> Option<FrameID> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        if inner.curr_size == 0 {
            return None;
        }
        let victim = inner
            .history_bucket
            .iter()
            .chain(inner.buffer_bucket.iter())
            .find(|entry| inner.node_store[entry.1].evictable)
            .map(|(&key, &frame_id)| (key, frame_id));
        let (key, frame_id) = victim?;
        let node = inner.node_store.remove(&frame_id).unwrap();
        if node.history.len() < self.k {
            inner.history_bucket.remove(&key);
        } else {
            inner.buffer_bucket.remove(&key);
        }
        inner.curr_size -= 1;
        debug!("evict frame {}", frame_id);
        Some(frame_id)
    }

    pub fn remove(&self, frame_id: FrameID) -> Result<(), StorageError> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        match inner.node_store.get(&frame_id) {
            None => return Ok(()),
            Some(node) if !node.evictable => {
                return Err(StorageError::RemoveNonEvictable(frame_id))
            }
            Some(_) => {}
        }
        let node = inner.node_store.remove(&frame_id).unwrap();
        let key = node.bucket_key();
        if node.history.len() < self.k {
            inner.history_bucket.remove(&key);
        } else {
            inner.buffer_bucket.remove(&key);
        }
        inner.curr_size -= 1;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().curr_size
    }
}
