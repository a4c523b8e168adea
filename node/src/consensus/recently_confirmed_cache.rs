use rslat_core::{BlockHash, QualifiedRoot};
use rslat_core::utils::ContainerInfo;
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

/// Remembers the last N confirmed roots so that replayed votes and
/// re-published blocks for finished contests can be told apart from
/// genuinely unknown hashes
pub struct RecentlyConfirmedCache {
    max_len: usize,
    data: Mutex<RecentlyConfirmedData>,
}

#[derive(Default)]
struct RecentlyConfirmedData {
    sequenced: VecDeque<(QualifiedRoot, BlockHash)>,
    by_root: HashMap<QualifiedRoot, BlockHash>,
    by_hash: HashMap<BlockHash, QualifiedRoot>,
}

impl RecentlyConfirmedCache {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            data: Mutex::new(Default::default()),
        }
    }

    pub fn put(&self, root: QualifiedRoot, hash: BlockHash) {
        let mut guard = self.data.lock().unwrap();
        if guard.by_root.contains_key(&root) {
            return;
        }
        guard.sequenced.push_back((root.clone(), hash));
        guard.by_hash.insert(hash, root.clone());
        guard.by_root.insert(root, hash);
        while guard.sequenced.len() > self.max_len {
            if let Some((old_root, old_hash)) = guard.sequenced.pop_front() {
                guard.by_root.remove(&old_root);
                guard.by_hash.remove(&old_hash);
            }
        }
    }

    pub fn root_exists(&self, root: &QualifiedRoot) -> bool {
        self.data.lock().unwrap().by_root.contains_key(root)
    }

    pub fn hash_exists(&self, hash: &BlockHash) -> bool {
        self.data.lock().unwrap().by_hash.contains_key(hash)
    }

    pub fn erase(&self, hash: &BlockHash) -> bool {
        let mut guard = self.data.lock().unwrap();
        if let Some(root) = guard.by_hash.remove(hash) {
            guard.by_root.remove(&root);
            guard.sequenced.retain(|(_, h)| h != hash);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().sequenced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut guard = self.data.lock().unwrap();
        guard.sequenced.clear();
        guard.by_root.clear();
        guard.by_hash.clear();
    }

    pub fn container_info(&self) -> ContainerInfo {
        [(
            "confirmed",
            self.len(),
            std::mem::size_of::<QualifiedRoot>() + std::mem::size_of::<BlockHash>(),
        )]
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rslat_core::Block;

    #[test]
    fn put_and_lookup() {
        let cache = RecentlyConfirmedCache::new(10);
        let block = Block::new_test_instance();
        cache.put(block.qualified_root(), block.hash());
        assert!(cache.root_exists(&block.qualified_root()));
        assert!(cache.hash_exists(&block.hash()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn oldest_evicted_at_capacity() {
        let cache = RecentlyConfirmedCache::new(2);
        let hashes: Vec<BlockHash> = (1..=3u64).map(BlockHash::from).collect();
        for (i, hash) in hashes.iter().enumerate() {
            let root = QualifiedRoot {
                root: rslat_core::Root::from(i as u64 + 1),
                previous: BlockHash::zero(),
            };
            cache.put(root, *hash);
        }
        assert_eq!(cache.len(), 2);
        assert!(!cache.hash_exists(&hashes[0]));
        assert!(cache.hash_exists(&hashes[1]));
        assert!(cache.hash_exists(&hashes[2]));
    }

    #[test]
    fn erase_removes_both_indexes() {
        let cache = RecentlyConfirmedCache::new(10);
        let block = Block::new_test_instance();
        cache.put(block.qualified_root(), block.hash());
        assert!(cache.erase(&block.hash()));
        assert!(!cache.root_exists(&block.qualified_root()));
        assert!(!cache.erase(&block.hash()));
    }
}
