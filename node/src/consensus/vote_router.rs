use super::{Election, RecentlyConfirmedCache};
use crate::stats::{DetailType, StatType, Stats};
use rslat_core::{utils::ContainerInfo, BlockHash, Vote, VoteCode, VoteSource};
use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex, Weak},
    thread::JoinHandle,
    time::Duration,
};

pub type VoteProcessedCallback =
    Box<dyn Fn(&Vote, VoteSource, &HashMap<BlockHash, VoteCode>) + Send + Sync>;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(15);

/// Routes incoming votes to the elections that are contesting the voted
/// hashes. Elections are held weakly; a periodic sweep drops entries
/// whose election has been erased.
pub struct VoteRouter {
    thread: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<(Condvar, Mutex<State>)>,
    recently_confirmed: Arc<RecentlyConfirmedCache>,
    stats: Arc<Stats>,
    vote_processed_observers: Mutex<Vec<VoteProcessedCallback>>,
}

struct State {
    stopped: bool,
    elections: HashMap<BlockHash, Weak<Election>>,
}

impl VoteRouter {
    pub fn new(recently_confirmed: Arc<RecentlyConfirmedCache>, stats: Arc<Stats>) -> Self {
        Self {
            thread: Mutex::new(None),
            shared: Arc::new((
                Condvar::new(),
                Mutex::new(State {
                    stopped: false,
                    elections: HashMap::new(),
                }),
            )),
            recently_confirmed,
            stats,
            vote_processed_observers: Mutex::new(Vec::new()),
        }
    }

    pub fn on_vote_processed(&self, observer: VoteProcessedCallback) {
        self.vote_processed_observers.lock().unwrap().push(observer);
    }

    pub fn stop(&self) {
        self.shared.1.lock().unwrap().stopped = true;
        self.shared.0.notify_all();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    pub fn connect(&self, hash: BlockHash, election: Weak<Election>) {
        self.shared.1.lock().unwrap().elections.insert(hash, election);
    }

    pub fn disconnect(&self, hash: &BlockHash) {
        self.shared.1.lock().unwrap().elections.remove(hash);
    }

    pub fn disconnect_election(&self, election: &Election) {
        let mut state = self.shared.1.lock().unwrap();
        let guard = election.mutex.lock().unwrap();
        for hash in guard.last_blocks.keys() {
            state.elections.remove(hash);
        }
    }

    /// Election currently contesting the given hash, if any
    pub fn election(&self, hash: &BlockHash) -> Option<Arc<Election>> {
        self.shared
            .1
            .lock()
            .unwrap()
            .elections
            .get(hash)
            .and_then(|weak| weak.upgrade())
    }

    pub fn active(&self, hash: &BlockHash) -> bool {
        self.election(hash).is_some()
    }

    pub fn len(&self) -> usize {
        self.shared.1.lock().unwrap().elections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vote(&self, vote: &Vote, source: VoteSource) -> HashMap<BlockHash, VoteCode> {
        self.vote_filter(vote, source, &BlockHash::zero())
    }

    /// Routes each hash of the vote to its election. A non-zero filter
    /// restricts processing to that hash alone. Hashes without a live
    /// election resolve to `Replay` when their root was recently
    /// confirmed, `Indeterminate` otherwise.
    pub fn vote_filter(
        &self,
        vote: &Vote,
        source: VoteSource,
        filter: &BlockHash,
    ) -> HashMap<BlockHash, VoteCode> {
        debug_assert!(!vote.voting_account.is_zero());

        let mut results = HashMap::new();
        for hash in &vote.hashes {
            if !filter.is_zero() && hash != filter {
                continue;
            }
            let election = self.election(hash);
            let code = match election {
                Some(election) => {
                    election.vote(&vote.voting_account, vote.timestamp(), hash, source)
                }
                None => {
                    if self.recently_confirmed.hash_exists(hash) {
                        self.stats
                            .inc(StatType::VoteRouter, DetailType::VoteReplay);
                        VoteCode::Replay
                    } else {
                        VoteCode::Indeterminate
                    }
                }
            };
            results.insert(*hash, code);
        }

        self.stats
            .inc(StatType::VoteRouter, DetailType::Processed);

        let observers = self.vote_processed_observers.lock().unwrap();
        for observer in observers.iter() {
            observer(vote, source, &results);
        }
        results
    }

    pub fn container_info(&self) -> ContainerInfo {
        let state = self.shared.1.lock().unwrap();
        [(
            "elections",
            state.elections.len(),
            std::mem::size_of::<(BlockHash, Weak<Election>)>(),
        )]
        .into()
    }
}

impl Drop for VoteRouter {
    fn drop(&mut self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

pub trait VoteRouterExt {
    fn start(&self);
}

impl VoteRouterExt for Arc<VoteRouter> {
    fn start(&self) {
        let shared = self.shared.clone();
        let mut thread = self.thread.lock().unwrap();
        debug_assert!(thread.is_none());
        *thread = Some(
            std::thread::Builder::new()
                .name("Vote router".to_owned())
                .spawn(move || {
                    let (condition, state) = &*shared;
                    let mut guard = state.lock().unwrap();
                    while !guard.stopped {
                        guard.elections.retain(|_, weak| weak.strong_count() > 0);
                        guard = condition
                            .wait_timeout_while(guard, CLEANUP_INTERVAL, |s| !s.stopped)
                            .unwrap()
                            .0;
                    }
                })
                .unwrap(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consensus::ElectionBehavior,
        representatives::{OnlineReps, RepWeights},
        stats::Direction,
    };
    use rslat_core::{Amount, Block, PrivateKey, QualifiedRoot, Root};

    fn test_router() -> (VoteRouter, Arc<RecentlyConfirmedCache>) {
        let recently_confirmed = Arc::new(RecentlyConfirmedCache::new(100));
        let router = VoteRouter::new(recently_confirmed.clone(), Arc::new(Stats::new()));
        (router, recently_confirmed)
    }

    fn test_election(weight: Amount) -> (Arc<Election>, PrivateKey) {
        let key = PrivateKey::new();
        let rep_weights = Arc::new(RepWeights::new());
        rep_weights.set_weight(key.public_key(), weight);
        let mut online_reps = OnlineReps::new(rep_weights);
        online_reps.set_quorum_percent(67);
        online_reps.set_online(weight);
        let election = Arc::new(Election::new(
            Block::new_test_instance(),
            ElectionBehavior::Priority,
            Arc::new(Mutex::new(online_reps)),
            Arc::new(RecentlyConfirmedCache::new(100)),
            Arc::new(Mutex::new(Vec::new())),
            Arc::new(Stats::new()),
        ));
        (election, key)
    }

    #[test]
    fn unknown_hash_is_indeterminate() {
        let (router, _) = test_router();
        let vote = Vote::new_test_instance();
        let results = router.vote(&vote, VoteSource::Live);
        assert_eq!(results.len(), 1);
        assert_eq!(results[&vote.hashes[0]], VoteCode::Indeterminate);
    }

    #[test]
    fn recently_confirmed_hash_is_replay() {
        let (router, recently_confirmed) = test_router();
        let vote = Vote::new_test_instance();
        recently_confirmed.put(
            QualifiedRoot::new(Root::from(1), BlockHash::zero()),
            vote.hashes[0],
        );
        let results = router.vote(&vote, VoteSource::Live);
        assert_eq!(results[&vote.hashes[0]], VoteCode::Replay);
        assert_eq!(
            router
                .stats
                .count(StatType::VoteRouter, DetailType::VoteReplay, Direction::In),
            1
        );
    }

    #[test]
    fn routes_vote_to_connected_election() {
        let (router, _) = test_router();
        let (election, key) = test_election(Amount::raw(100));
        let hash = election.winner().unwrap().hash();
        router.connect(hash, Arc::downgrade(&election));

        let vote = Vote::new(&key, Vote::TIMESTAMP_MIN, 0, vec![hash]);
        let results = router.vote(&vote, VoteSource::Live);
        assert_eq!(results[&hash], VoteCode::Vote);
        assert!(election.is_confirmed());
    }

    #[test]
    fn filter_restricts_to_one_hash() {
        let (router, _) = test_router();
        let (election, key) = test_election(Amount::raw(100));
        let hash = election.winner().unwrap().hash();
        let other = BlockHash::from(777);
        router.connect(hash, Arc::downgrade(&election));

        let vote = Vote::new(&key, Vote::TIMESTAMP_MIN, 0, vec![hash, other]);
        let results = router.vote_filter(&vote, VoteSource::Live, &other);
        assert_eq!(results.len(), 1);
        assert!(results.contains_key(&other));
        assert!(!election.is_confirmed());
    }

    #[test]
    fn disconnected_hash_no_longer_routes() {
        let (router, _) = test_router();
        let (election, key) = test_election(Amount::raw(100));
        let hash = election.winner().unwrap().hash();
        router.connect(hash, Arc::downgrade(&election));
        router.disconnect(&hash);

        let vote = Vote::new(&key, Vote::TIMESTAMP_MIN, 0, vec![hash]);
        let results = router.vote(&vote, VoteSource::Live);
        assert_eq!(results[&hash], VoteCode::Indeterminate);
    }

    #[test]
    fn observers_see_processed_votes() {
        let (router, _) = test_router();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        router.on_vote_processed(Box::new(move |vote, source, results| {
            seen2
                .lock()
                .unwrap()
                .push((vote.clone(), source, results.len()));
        }));

        let vote = Vote::new_test_instance();
        router.vote(&vote, VoteSource::Cache);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, VoteSource::Cache);
        assert_eq!(seen[0].2, 1);
    }

    #[test]
    fn dead_elections_swept() {
        let (router, _) = test_router();
        let (election, _) = test_election(Amount::raw(100));
        let hash = election.winner().unwrap().hash();
        router.connect(hash, Arc::downgrade(&election));
        drop(election);

        let router = Arc::new(router);
        router.start();
        router.stop();
        assert!(!router.active(&hash));
    }

    #[test]
    fn vote_with_zero_rep_weight_is_indeterminate() {
        let (router, _) = test_router();
        let (election, _) = test_election(Amount::raw(100));
        let hash = election.winner().unwrap().hash();
        router.connect(hash, Arc::downgrade(&election));

        let stranger = PrivateKey::new();
        let vote = Vote::new(&stranger, Vote::TIMESTAMP_MIN, 0, vec![hash]);
        let results = router.vote(&vote, VoteSource::Live);
        assert_eq!(results[&hash], VoteCode::Indeterminate);
    }
}
