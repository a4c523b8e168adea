use crate::{
    config::VoteCacheConfig,
    stats::{DetailType, StatType, Stats},
};
use rslat_core::{utils::ContainerInfo, Amount, BlockHash, PublicKey, Vote};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

#[cfg(test)]
use mock_instant::Instant;
#[cfg(not(test))]
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoterEntry {
    pub representative: PublicKey,
    pub timestamp: u64,
    pub weight: Amount,
}

impl VoterEntry {
    fn is_final(&self) -> bool {
        self.timestamp == Vote::FINAL_TIMESTAMP
    }
}

/// Votes observed for one hash that had no live election at the time
#[derive(Clone)]
pub struct CacheEntry {
    id: usize,
    pub hash: BlockHash,
    pub voters: Vec<VoterEntry>,
    pub tally: Amount,
    pub final_tally: Amount,
    pub last_vote: Instant,
}

impl CacheEntry {
    fn new(id: usize, hash: BlockHash) -> Self {
        Self {
            id,
            hash,
            voters: Vec::new(),
            tally: Amount::zero(),
            final_tally: Amount::zero(),
            last_vote: Instant::now(),
        }
    }

    /// Returns whether the entry changed. The same monotonicity rule as
    /// live elections: a representative's newer timestamp supersedes,
    /// the final sentinel supersedes everything and is itself immutable.
    fn vote(&mut self, representative: &PublicKey, timestamp: u64, weight: Amount, max_voters: usize) -> bool {
        if let Some(existing) = self
            .voters
            .iter_mut()
            .find(|voter| voter.representative == *representative)
        {
            if existing.is_final() {
                return false;
            }
            if timestamp != Vote::FINAL_TIMESTAMP && timestamp <= existing.timestamp {
                return false;
            }
            existing.timestamp = timestamp;
            if timestamp == Vote::FINAL_TIMESTAMP {
                self.final_tally = self.final_tally.wrapping_add(weight);
            }
            self.last_vote = Instant::now();
            return true;
        }

        if self.voters.len() >= max_voters {
            // full voter list: the lightest voter makes room for a
            // heavier representative, otherwise the vote is dropped
            let lightest = self
                .voters
                .iter()
                .enumerate()
                .min_by_key(|(_, voter)| voter.weight)
                .map(|(index, voter)| (index, voter.weight))
                .expect("voters must not be empty");
            if weight <= lightest.1 {
                return false;
            }
            let removed = self.voters.swap_remove(lightest.0);
            self.tally = self.tally.saturating_sub(removed.weight);
            if removed.is_final() {
                self.final_tally = self.final_tally.saturating_sub(removed.weight);
            }
        }
        self.voters.push(VoterEntry {
            representative: *representative,
            timestamp,
            weight,
        });
        self.tally = self.tally.wrapping_add(weight);
        if timestamp == Vote::FINAL_TIMESTAMP {
            self.final_tally = self.final_tally.wrapping_add(weight);
        }
        self.last_vote = Instant::now();
        true
    }
}

/// A promotion candidate handed out by `pop`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopEntry {
    pub hash: BlockHash,
    pub tally: Amount,
    pub final_tally: Amount,
}

#[derive(Default)]
struct CacheCollection {
    sequenced: BTreeMap<usize, BlockHash>,
    by_hash: HashMap<BlockHash, CacheEntry>,
    by_tally: BTreeMap<Amount, Vec<BlockHash>>,
}

impl CacheCollection {
    fn insert(&mut self, entry: CacheEntry) {
        debug_assert!(!self.by_hash.contains_key(&entry.hash));
        self.sequenced.insert(entry.id, entry.hash);
        self.by_tally.entry(entry.tally).or_default().push(entry.hash);
        self.by_hash.insert(entry.hash, entry);
    }

    fn modify(&mut self, hash: &BlockHash, f: impl FnOnce(&mut CacheEntry) -> bool) -> bool {
        let Some(entry) = self.by_hash.get_mut(hash) else {
            return false;
        };
        let old_tally = entry.tally;
        let modified = f(entry);
        let new_tally = entry.tally;
        if modified && new_tally != old_tally {
            remove_tally_index(&mut self.by_tally, old_tally, hash);
            self.by_tally.entry(new_tally).or_default().push(*hash);
        }
        modified
    }

    fn pop_front(&mut self) -> Option<CacheEntry> {
        let (_, hash) = self.sequenced.pop_first()?;
        let entry = self.by_hash.remove(&hash).unwrap();
        remove_tally_index(&mut self.by_tally, entry.tally, &hash);
        Some(entry)
    }

    fn remove(&mut self, hash: &BlockHash) -> Option<CacheEntry> {
        let entry = self.by_hash.remove(hash)?;
        self.sequenced.remove(&entry.id);
        remove_tally_index(&mut self.by_tally, entry.tally, hash);
        Some(entry)
    }

    fn get(&self, hash: &BlockHash) -> Option<&CacheEntry> {
        self.by_hash.get(hash)
    }

    fn len(&self) -> usize {
        self.by_hash.len()
    }

    fn clear(&mut self) {
        self.sequenced.clear();
        self.by_hash.clear();
        self.by_tally.clear();
    }
}

#[derive(Clone, Copy)]
struct QueueEntry {
    id: usize,
    hash: BlockHash,
    tally: Amount,
}

#[derive(Default)]
struct QueueCollection {
    sequenced: BTreeMap<usize, BlockHash>,
    by_hash: HashMap<BlockHash, QueueEntry>,
    by_tally: BTreeMap<Amount, Vec<BlockHash>>,
}

impl QueueCollection {
    fn insert(&mut self, entry: QueueEntry) {
        debug_assert!(!self.by_hash.contains_key(&entry.hash));
        self.sequenced.insert(entry.id, entry.hash);
        self.by_tally.entry(entry.tally).or_default().push(entry.hash);
        self.by_hash.insert(entry.hash, entry);
    }

    fn contains(&self, hash: &BlockHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    fn update_tally(&mut self, hash: &BlockHash, tally: Amount) {
        let Some(entry) = self.by_hash.get_mut(hash) else {
            return;
        };
        if entry.tally == tally {
            return;
        }
        let old_tally = entry.tally;
        entry.tally = tally;
        remove_tally_index(&mut self.by_tally, old_tally, hash);
        self.by_tally.entry(tally).or_default().push(*hash);
    }

    /// Highest-tally entry at or above the threshold, without removing it
    fn peek_max(&self, min_tally: Amount) -> Option<&QueueEntry> {
        let (tally, hashes) = self.by_tally.last_key_value()?;
        if *tally < min_tally {
            return None;
        }
        hashes.last().map(|hash| &self.by_hash[hash])
    }

    fn pop_max(&mut self, min_tally: Amount) -> Option<QueueEntry> {
        let hash = self.peek_max(min_tally)?.hash;
        self.remove(&hash)
    }

    fn pop_front(&mut self) -> Option<QueueEntry> {
        let (_, hash) = self.sequenced.pop_first()?;
        let entry = self.by_hash.remove(&hash).unwrap();
        remove_tally_index(&mut self.by_tally, entry.tally, &hash);
        Some(entry)
    }

    fn remove(&mut self, hash: &BlockHash) -> Option<QueueEntry> {
        let entry = self.by_hash.remove(hash)?;
        self.sequenced.remove(&entry.id);
        remove_tally_index(&mut self.by_tally, entry.tally, hash);
        Some(entry)
    }

    fn len(&self) -> usize {
        self.by_hash.len()
    }

    fn clear(&mut self) {
        self.sequenced.clear();
        self.by_hash.clear();
        self.by_tally.clear();
    }
}

fn remove_tally_index(
    by_tally: &mut BTreeMap<Amount, Vec<BlockHash>>,
    tally: Amount,
    hash: &BlockHash,
) {
    let hashes = by_tally.get_mut(&tally).unwrap();
    if hashes.len() == 1 {
        debug_assert_eq!(hashes[0], *hash);
        by_tally.remove(&tally);
    } else {
        hashes.retain(|h| h != hash);
    }
}

/// Remembers votes that arrived before their election started. The cache
/// itself evicts in insertion order; the promotion queue hands the
/// highest-tally hashes to the scheduler independently of cache order.
pub struct VoteCache {
    config: VoteCacheConfig,
    cache: CacheCollection,
    queue: QueueCollection,
    next_id: usize,
    stats: Arc<Stats>,
}

impl VoteCache {
    pub fn new(config: VoteCacheConfig, stats: Arc<Stats>) -> Self {
        Self {
            config,
            cache: CacheCollection::default(),
            queue: QueueCollection::default(),
            next_id: 0,
            stats,
        }
    }

    /// Record one voted hash. `rep_weight` must be the representative's
    /// current voting weight; zero-weight votes are dropped upstream.
    pub fn insert(
        &mut self,
        hash: &BlockHash,
        representative: &PublicKey,
        timestamp: u64,
        rep_weight: Amount,
    ) {
        let max_voters = self.config.max_voters;
        if self.cache.get(hash).is_some() {
            let modified = self
                .cache
                .modify(hash, |entry| entry.vote(representative, timestamp, rep_weight, max_voters));
            if modified {
                self.stats.inc(StatType::VoteCache, DetailType::Update);
                let tally = self.cache.get(hash).unwrap().tally;
                self.queue.update_tally(hash, tally);
            }
            return;
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let mut entry = CacheEntry::new(id, *hash);
        entry.vote(representative, timestamp, rep_weight, max_voters);
        let tally = entry.tally;
        self.cache.insert(entry);
        self.queue.insert(QueueEntry {
            id,
            hash: *hash,
            tally,
        });
        self.stats.inc(StatType::VoteCache, DetailType::Insert);

        while self.cache.len() > self.config.max_size {
            self.cache.pop_front();
            self.stats.inc(StatType::VoteCache, DetailType::Overfill);
        }
        while self.queue.len() > self.config.max_size {
            self.queue.pop_front();
        }
    }

    /// Voters recorded for a hash, empty when unknown
    pub fn find(&self, hash: &BlockHash) -> Vec<VoterEntry> {
        self.cache
            .get(hash)
            .map(|entry| entry.voters.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.cache.get(hash).is_some()
    }

    pub fn tally(&self, hash: &BlockHash) -> Amount {
        self.cache
            .get(hash)
            .map(|entry| entry.tally)
            .unwrap_or_default()
    }

    /// Remove and return the best promotion candidate with tally at or
    /// above the threshold. The cached votes themselves stay behind so
    /// they can be replayed into the started election.
    pub fn pop(&mut self, min_tally: Amount) -> Option<TopEntry> {
        let entry = self.queue.pop_max(min_tally)?;
        self.stats.inc(StatType::VoteCache, DetailType::Pop);
        Some(self.top_entry(entry))
    }

    pub fn peek(&self, min_tally: Amount) -> Option<TopEntry> {
        self.queue.peek_max(min_tally).map(|e| self.top_entry(*e))
    }

    /// Requeue a hash for promotion, typically after its election was
    /// dropped without confirming
    pub fn trigger(&mut self, hash: &BlockHash) {
        let Some(entry) = self.cache.get(hash) else {
            return;
        };
        if self.queue.contains(hash) {
            return;
        }
        self.queue.insert(QueueEntry {
            id: entry.id,
            hash: *hash,
            tally: entry.tally,
        });
        self.stats.inc(StatType::VoteCache, DetailType::Trigger);
        while self.queue.len() > self.config.max_size {
            self.queue.pop_front();
        }
    }

    pub fn erase(&mut self, hash: &BlockHash) {
        self.cache.remove(hash);
        self.queue.remove(hash);
    }

    /// Drop entries that have not seen a vote within the age cutoff
    pub fn cleanup(&mut self) {
        let cutoff = self.config.age_cutoff;
        let stale: Vec<BlockHash> = self
            .cache
            .by_hash
            .values()
            .filter(|entry| entry.last_vote.elapsed() >= cutoff)
            .map(|entry| entry.hash)
            .collect();
        for hash in &stale {
            self.erase(hash);
            self.stats.inc(StatType::VoteCache, DetailType::Cleanup);
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.len() == 0
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn container_info(&self) -> ContainerInfo {
        [
            (
                "cache",
                self.cache.len(),
                std::mem::size_of::<CacheEntry>(),
            ),
            (
                "queue",
                self.queue.len(),
                std::mem::size_of::<QueueEntry>(),
            ),
        ]
        .into()
    }

    fn top_entry(&self, entry: QueueEntry) -> TopEntry {
        let final_tally = self
            .cache
            .get(&entry.hash)
            .map(|cached| cached.final_tally)
            .unwrap_or_default();
        TopEntry {
            hash: entry.hash,
            tally: entry.tally,
            final_tally,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_instant::MockClock;
    use std::time::Duration;

    fn test_config(max_size: usize) -> VoteCacheConfig {
        VoteCacheConfig {
            max_size,
            max_voters: 8,
            age_cutoff: Duration::from_secs(15 * 60),
        }
    }

    fn test_cache(max_size: usize) -> VoteCache {
        VoteCache::new(test_config(max_size), Arc::new(Stats::new()))
    }

    #[test]
    fn construction() {
        let cache = test_cache(10);
        assert!(cache.is_empty());
        assert_eq!(cache.queue_len(), 0);
        assert_eq!(cache.peek(Amount::zero()), None);
    }

    #[test]
    fn insert_one_hash() {
        let mut cache = test_cache(10);
        let hash = BlockHash::from(1);
        let rep = PublicKey::random();
        cache.insert(&hash, &rep, Vote::TIMESTAMP_MIN, Amount::raw(7));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.tally(&hash), Amount::raw(7));
        let voters = cache.find(&hash);
        assert_eq!(voters.len(), 1);
        assert_eq!(voters[0].representative, rep);
        let top = cache.peek(Amount::zero()).unwrap();
        assert_eq!(top.hash, hash);
        assert_eq!(top.tally, Amount::raw(7));
    }

    #[test]
    fn duplicate_vote_does_not_count_twice() {
        let mut cache = test_cache(10);
        let hash = BlockHash::from(1);
        let rep = PublicKey::random();
        cache.insert(&hash, &rep, Vote::TIMESTAMP_MIN, Amount::raw(7));
        cache.insert(&hash, &rep, Vote::TIMESTAMP_MIN, Amount::raw(7));

        assert_eq!(cache.tally(&hash), Amount::raw(7));
        assert_eq!(cache.find(&hash).len(), 1);
    }

    #[test]
    fn newer_timestamp_updates_voter() {
        let mut cache = test_cache(10);
        let hash = BlockHash::from(1);
        let rep = PublicKey::random();
        cache.insert(&hash, &rep, Vote::TIMESTAMP_MIN, Amount::raw(7));
        cache.insert(&hash, &rep, Vote::TIMESTAMP_MIN * 2, Amount::raw(7));

        let voters = cache.find(&hash);
        assert_eq!(voters.len(), 1);
        assert_eq!(voters[0].timestamp, Vote::TIMESTAMP_MIN * 2);
        assert_eq!(cache.tally(&hash), Amount::raw(7));
    }

    #[test]
    fn older_timestamp_ignored() {
        let mut cache = test_cache(10);
        let hash = BlockHash::from(1);
        let rep = PublicKey::random();
        cache.insert(&hash, &rep, Vote::TIMESTAMP_MIN * 2, Amount::raw(7));
        cache.insert(&hash, &rep, Vote::TIMESTAMP_MIN, Amount::raw(7));

        assert_eq!(cache.find(&hash)[0].timestamp, Vote::TIMESTAMP_MIN * 2);
    }

    #[test]
    fn final_vote_tracked_separately() {
        let mut cache = test_cache(10);
        let hash = BlockHash::from(1);
        let rep = PublicKey::random();
        cache.insert(&hash, &rep, Vote::TIMESTAMP_MIN, Amount::raw(9));
        assert_eq!(cache.peek(Amount::zero()).unwrap().final_tally, Amount::zero());

        cache.insert(&hash, &rep, Vote::FINAL_TIMESTAMP, Amount::raw(9));
        let top = cache.peek(Amount::zero()).unwrap();
        assert_eq!(top.tally, Amount::raw(9));
        assert_eq!(top.final_tally, Amount::raw(9));
    }

    #[test]
    fn voter_cap_enforced() {
        let mut cache = test_cache(10);
        let hash = BlockHash::from(1);
        for _ in 0..20 {
            cache.insert(&hash, &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(1));
        }
        assert_eq!(cache.find(&hash).len(), 8);
        assert_eq!(cache.tally(&hash), Amount::raw(8));
    }

    #[test]
    fn heavy_voter_displaces_lightest_at_cap() {
        let mut cache = VoteCache::new(
            VoteCacheConfig {
                max_size: 10,
                max_voters: 3,
                age_cutoff: Duration::from_secs(15 * 60),
            },
            Arc::new(Stats::new()),
        );
        let hash = BlockHash::from(1);
        for _ in 0..3 {
            cache.insert(&hash, &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(1));
        }
        let heavy = PublicKey::random();
        cache.insert(&hash, &heavy, Vote::TIMESTAMP_MIN, Amount::raw(1000));

        let voters = cache.find(&hash);
        assert_eq!(voters.len(), 3);
        assert!(voters.iter().any(|voter| voter.representative == heavy));
        assert_eq!(cache.tally(&hash), Amount::raw(1002));

        // an equally light rep still cannot push anyone out
        cache.insert(&hash, &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(1));
        assert_eq!(cache.find(&hash).len(), 3);
        assert_eq!(cache.tally(&hash), Amount::raw(1002));
    }

    #[test]
    fn overfill_evicts_in_insertion_order() {
        let mut cache = test_cache(3);
        let rep = PublicKey::random();
        // The first insert has the highest tally but is the oldest
        cache.insert(&BlockHash::from(1), &rep, Vote::TIMESTAMP_MIN, Amount::raw(100));
        cache.insert(&BlockHash::from(2), &rep, Vote::TIMESTAMP_MIN, Amount::raw(5));
        cache.insert(&BlockHash::from(3), &rep, Vote::TIMESTAMP_MIN, Amount::raw(6));
        cache.insert(&BlockHash::from(4), &rep, Vote::TIMESTAMP_MIN, Amount::raw(7));

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&BlockHash::from(1)));
        assert!(cache.contains(&BlockHash::from(4)));
    }

    #[test]
    fn pop_returns_highest_tally_first() {
        let mut cache = test_cache(10);
        let rep = PublicKey::random();
        cache.insert(&BlockHash::from(1), &rep, Vote::TIMESTAMP_MIN, Amount::raw(5));
        cache.insert(&BlockHash::from(2), &rep, Vote::TIMESTAMP_MIN, Amount::raw(9));
        cache.insert(&BlockHash::from(3), &rep, Vote::TIMESTAMP_MIN, Amount::raw(7));

        assert_eq!(cache.pop(Amount::zero()).unwrap().hash, BlockHash::from(2));
        assert_eq!(cache.pop(Amount::zero()).unwrap().hash, BlockHash::from(3));
        assert_eq!(cache.pop(Amount::zero()).unwrap().hash, BlockHash::from(1));
        assert_eq!(cache.pop(Amount::zero()), None);
    }

    #[test]
    fn pop_respects_min_tally() {
        let mut cache = test_cache(10);
        let rep = PublicKey::random();
        cache.insert(&BlockHash::from(1), &rep, Vote::TIMESTAMP_MIN, Amount::raw(5));

        assert_eq!(cache.pop(Amount::raw(6)), None);
        assert!(cache.pop(Amount::raw(5)).is_some());
    }

    #[test]
    fn pop_keeps_cached_votes() {
        let mut cache = test_cache(10);
        let hash = BlockHash::from(1);
        let rep = PublicKey::random();
        cache.insert(&hash, &rep, Vote::TIMESTAMP_MIN, Amount::raw(5));

        cache.pop(Amount::zero()).unwrap();
        assert!(cache.contains(&hash));
        assert_eq!(cache.find(&hash).len(), 1);
        // but the queue no longer offers it
        assert_eq!(cache.peek(Amount::zero()), None);
    }

    #[test]
    fn later_votes_requeue_popped_hash() {
        let mut cache = test_cache(10);
        let hash = BlockHash::from(1);
        cache.insert(&hash, &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(5));
        cache.pop(Amount::zero()).unwrap();

        cache.insert(&hash, &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(3));
        // tally update alone does not requeue, an explicit trigger does
        assert_eq!(cache.peek(Amount::zero()), None);
        cache.trigger(&hash);
        let top = cache.peek(Amount::zero()).unwrap();
        assert_eq!(top.hash, hash);
        assert_eq!(top.tally, Amount::raw(8));
    }

    #[test]
    fn trigger_unknown_hash_is_noop() {
        let mut cache = test_cache(10);
        cache.trigger(&BlockHash::from(42));
        assert_eq!(cache.queue_len(), 0);
    }

    #[test]
    fn tally_updates_reorder_queue() {
        let mut cache = test_cache(10);
        cache.insert(&BlockHash::from(1), &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(5));
        cache.insert(&BlockHash::from(2), &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(4));
        assert_eq!(cache.peek(Amount::zero()).unwrap().hash, BlockHash::from(1));

        cache.insert(&BlockHash::from(2), &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(3));
        assert_eq!(cache.peek(Amount::zero()).unwrap().hash, BlockHash::from(2));
        assert_eq!(cache.peek(Amount::zero()).unwrap().tally, Amount::raw(7));
    }

    #[test]
    fn erase_removes_cache_and_queue() {
        let mut cache = test_cache(10);
        let hash = BlockHash::from(1);
        cache.insert(&hash, &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(5));
        cache.erase(&hash);

        assert!(cache.is_empty());
        assert_eq!(cache.queue_len(), 0);
        cache.trigger(&hash);
        assert_eq!(cache.queue_len(), 0);
    }

    #[test]
    fn cleanup_drops_aged_entries() {
        let mut cache = test_cache(10);
        cache.insert(&BlockHash::from(1), &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(5));
        MockClock::advance(Duration::from_secs(10 * 60));
        cache.insert(&BlockHash::from(2), &PublicKey::random(), Vote::TIMESTAMP_MIN, Amount::raw(5));
        MockClock::advance(Duration::from_secs(5 * 60));

        cache.cleanup();
        assert!(!cache.contains(&BlockHash::from(1)));
        assert!(cache.contains(&BlockHash::from(2)));
    }
}
