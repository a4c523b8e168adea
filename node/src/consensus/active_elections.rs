use super::{
    election::ConfirmedCallback, BlockSource, ConfirmationSolicitor, Election, ElectionBehavior,
    ElectionState, RecentlyConfirmedCache, VoteCache, VoteCacheProcessor, VoteProcessedCallback,
    VoteRouter,
};
use crate::{
    config::{ActiveElectionsConfig, ConfirmationSolicitorConfig},
    representatives::OnlineReps,
    stats::{DetailType, StatType, Stats},
};
use rslat_core::{
    utils::ContainerInfo, Block, BlockHash, QualifiedRoot, Vote, VoteCode, VoteSource,
};
use rslat_network::Network;
use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread::JoinHandle,
    time::Duration,
};
use tracing::{debug, trace};

pub type AlreadyConfirmedCallback = Box<dyn Fn(&BlockHash) + Send + Sync>;

const BLOCK_BROADCAST_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub enum InsertOutcome {
    /// A new election was started
    Inserted(Arc<Election>),
    /// The root is already being contested, or was recently confirmed
    /// (`None`)
    AlreadyExists(Option<Arc<Election>>),
    /// No vacancy for the requested behavior
    RejectedCapacity,
}

impl InsertOutcome {
    pub fn inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }

    pub fn election(&self) -> Option<&Arc<Election>> {
        match self {
            InsertOutcome::Inserted(election) => Some(election),
            InsertOutcome::AlreadyExists(election) => election.as_ref(),
            InsertOutcome::RejectedCapacity => None,
        }
    }
}

#[derive(Default)]
struct OrderedRoots {
    by_root: HashMap<QualifiedRoot, Arc<Election>>,
    sequenced: Vec<QualifiedRoot>,
}

impl OrderedRoots {
    fn insert(&mut self, root: QualifiedRoot, election: Arc<Election>) {
        if self.by_root.insert(root, election).is_none() {
            self.sequenced.push(root);
        }
    }

    fn get(&self, root: &QualifiedRoot) -> Option<&Arc<Election>> {
        self.by_root.get(root)
    }

    fn erase(&mut self, root: &QualifiedRoot) -> Option<Arc<Election>> {
        let result = self.by_root.remove(root);
        if result.is_some() {
            self.sequenced.retain(|r| r != root);
        }
        result
    }

    fn oldest(&self) -> Option<&QualifiedRoot> {
        self.sequenced.first()
    }

    fn iter_sequenced(&self) -> impl Iterator<Item = &Arc<Election>> {
        self.sequenced.iter().map(|root| &self.by_root[root])
    }

    fn len(&self) -> usize {
        self.sequenced.len()
    }
}

struct State {
    roots: OrderedRoots,
    stopped: bool,
    priority_count: usize,
    hinted_count: usize,
    optimistic_count: usize,
}

impl State {
    fn count_by_behavior(&self, behavior: ElectionBehavior) -> usize {
        match behavior {
            ElectionBehavior::Priority => self.priority_count,
            ElectionBehavior::Hinted => self.hinted_count,
            ElectionBehavior::Optimistic => self.optimistic_count,
        }
    }

    fn count_by_behavior_mut(&mut self, behavior: ElectionBehavior) -> &mut usize {
        match behavior {
            ElectionBehavior::Priority => &mut self.priority_count,
            ElectionBehavior::Hinted => &mut self.hinted_count,
            ElectionBehavior::Optimistic => &mut self.optimistic_count,
        }
    }
}

/// The container of all live elections. Starts, solicits and retires
/// elections; feeds votes to them through the router and promotes
/// hinted elections out of the vote cache.
pub struct ActiveElections {
    pub config: ActiveElectionsConfig,
    mutex: Mutex<State>,
    condition: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
    network: Arc<Network>,
    online_reps: Arc<Mutex<OnlineReps>>,
    vote_router: Arc<VoteRouter>,
    vote_cache: Arc<Mutex<VoteCache>>,
    vote_cache_processor: Arc<VoteCacheProcessor>,
    pub recently_confirmed: Arc<RecentlyConfirmedCache>,
    block_source: Arc<dyn BlockSource>,
    solicitor_config: ConfirmationSolicitorConfig,
    loop_interval: Duration,
    confirmed_observers: Arc<Mutex<Vec<ConfirmedCallback>>>,
    already_confirmed_observers: Mutex<Vec<AlreadyConfirmedCallback>>,
    stats: Arc<Stats>,
}

impl ActiveElections {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ActiveElectionsConfig,
        solicitor_config: ConfirmationSolicitorConfig,
        loop_interval: Duration,
        network: Arc<Network>,
        online_reps: Arc<Mutex<OnlineReps>>,
        vote_router: Arc<VoteRouter>,
        vote_cache: Arc<Mutex<VoteCache>>,
        vote_cache_processor: Arc<VoteCacheProcessor>,
        recently_confirmed: Arc<RecentlyConfirmedCache>,
        block_source: Arc<dyn BlockSource>,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            config,
            mutex: Mutex::new(State {
                roots: OrderedRoots::default(),
                stopped: false,
                priority_count: 0,
                hinted_count: 0,
                optimistic_count: 0,
            }),
            condition: Condvar::new(),
            thread: Mutex::new(None),
            network,
            online_reps,
            vote_router,
            vote_cache,
            vote_cache_processor,
            recently_confirmed,
            block_source,
            solicitor_config,
            loop_interval,
            confirmed_observers: Arc::new(Mutex::new(Vec::new())),
            already_confirmed_observers: Mutex::new(Vec::new()),
            stats,
        }
    }

    pub fn on_block_confirmed(&self, callback: ConfirmedCallback) {
        self.confirmed_observers.lock().unwrap().push(callback);
    }

    pub fn on_block_already_confirmed(&self, callback: AlreadyConfirmedCallback) {
        self.already_confirmed_observers
            .lock()
            .unwrap()
            .push(callback);
    }

    pub fn on_vote_processed(&self, callback: VoteProcessedCallback) {
        self.vote_router.on_vote_processed(callback);
    }

    pub fn stop(&self) {
        self.mutex.lock().unwrap().stopped = true;
        self.condition.notify_all();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
        self.clear();
    }

    /// Start an election for the given block, or feed the block into an
    /// election already contesting its root
    pub fn insert(&self, block: &Block, behavior: ElectionBehavior) -> InsertOutcome {
        let qualified_root = block.qualified_root();
        let hash = block.hash();
        let mut state = self.mutex.lock().unwrap();
        if state.stopped {
            return InsertOutcome::RejectedCapacity;
        }

        if let Some(existing) = state.roots.get(&qualified_root).cloned() {
            drop(state);
            self.stats
                .inc(StatType::ActiveElections, DetailType::AlreadyExists);
            if !existing.publish(block) {
                self.vote_router.connect(hash, Arc::downgrade(&existing));
                self.vote_cache_processor.trigger(hash);
            }
            return InsertOutcome::AlreadyExists(Some(existing));
        }

        if self.recently_confirmed.root_exists(&qualified_root) {
            drop(state);
            self.stats
                .inc(StatType::ActiveElections, DetailType::AlreadyExists);
            let observers = self.already_confirmed_observers.lock().unwrap();
            for observer in observers.iter() {
                observer(&hash);
            }
            return InsertOutcome::AlreadyExists(None);
        }

        if self.vacancy_locked(&state, behavior) <= 0 {
            self.stats
                .inc(StatType::ActiveElections, DetailType::CapacityRejected);
            return InsertOutcome::RejectedCapacity;
        }

        let election = Arc::new(Election::new(
            block.clone(),
            behavior,
            self.online_reps.clone(),
            self.recently_confirmed.clone(),
            self.confirmed_observers.clone(),
            self.stats.clone(),
        ));
        state.roots.insert(qualified_root, election.clone());
        *state.count_by_behavior_mut(behavior) += 1;
        self.vote_router.connect(hash, Arc::downgrade(&election));
        drop(state);

        self.stats
            .inc(StatType::ActiveElections, DetailType::Started);
        self.stats.inc(StatType::ActiveElections, behavior.into());
        trace!(root = ?election.qualified_root, %hash, ?behavior, "election started");
        self.condition.notify_all();

        // replay any votes that arrived ahead of the election
        self.vote_cache_processor.trigger(hash);
        self.trim();
        InsertOutcome::Inserted(election)
    }

    /// Route a vote to live elections; hashes without one are remembered
    /// in the vote cache
    pub fn vote(&self, vote: &Vote, source: VoteSource) -> HashMap<BlockHash, VoteCode> {
        let results = self.vote_router.vote(vote, source);

        let weight = {
            let reps = self.online_reps.lock().unwrap();
            reps.weight(&vote.voting_account)
        };
        if !weight.is_zero() && source == VoteSource::Live {
            let mut cache = self.vote_cache.lock().unwrap();
            for (hash, code) in &results {
                if *code == VoteCode::Indeterminate {
                    cache.insert(hash, &vote.voting_account, vote.timestamp(), weight);
                    self.stats
                        .inc(StatType::ActiveElections, DetailType::VoteIndeterminate);
                }
            }
        }
        results
    }

    pub fn erase(&self, qualified_root: &QualifiedRoot) -> bool {
        let mut state = self.mutex.lock().unwrap();
        let Some(election) = state.roots.erase(qualified_root) else {
            return false;
        };
        self.cleanup_election(state, election);
        true
    }

    /// Erase the election contesting the given candidate hash, if any
    pub fn erase_hash(&self, hash: &BlockHash) -> bool {
        let Some(election) = self.vote_router.election(hash) else {
            return false;
        };
        self.erase(&election.qualified_root)
    }

    pub fn election(&self, qualified_root: &QualifiedRoot) -> Option<Arc<Election>> {
        self.mutex.lock().unwrap().roots.get(qualified_root).cloned()
    }

    pub fn active_root(&self, qualified_root: &QualifiedRoot) -> bool {
        self.mutex.lock().unwrap().roots.get(qualified_root).is_some()
    }

    pub fn active(&self, hash: &BlockHash) -> bool {
        self.vote_router.active(hash)
    }

    pub fn len(&self) -> usize {
        self.mutex.lock().unwrap().roots.len()
    }

    pub fn len_by_behavior(&self, behavior: ElectionBehavior) -> usize {
        self.mutex.lock().unwrap().count_by_behavior(behavior)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list_active(&self, max: usize) -> Vec<Arc<Election>> {
        let state = self.mutex.lock().unwrap();
        state.roots.iter_sequenced().take(max).cloned().collect()
    }

    pub fn limit(&self, behavior: ElectionBehavior) -> usize {
        match behavior {
            ElectionBehavior::Priority => self.config.size,
            ElectionBehavior::Hinted => {
                self.config.size * self.config.hinted_limit_percentage / 100
            }
            ElectionBehavior::Optimistic => {
                self.config.size * self.config.optimistic_limit_percentage / 100
            }
        }
    }

    /// Remaining capacity for the given behavior, negative when over
    pub fn vacancy(&self, behavior: ElectionBehavior) -> i64 {
        let state = self.mutex.lock().unwrap();
        self.vacancy_locked(&state, behavior)
    }

    fn vacancy_locked(&self, state: &State, behavior: ElectionBehavior) -> i64 {
        match behavior {
            ElectionBehavior::Priority => {
                self.limit(behavior) as i64 - state.roots.len() as i64
            }
            ElectionBehavior::Hinted | ElectionBehavior::Optimistic => {
                self.limit(behavior) as i64 - state.count_by_behavior(behavior) as i64
            }
        }
    }

    pub fn clear(&self) {
        let mut state = self.mutex.lock().unwrap();
        let elections: Vec<_> = state.roots.iter_sequenced().cloned().collect();
        state.roots = OrderedRoots::default();
        state.priority_count = 0;
        state.hinted_count = 0;
        state.optimistic_count = 0;
        drop(state);
        for election in elections {
            self.vote_router.disconnect_election(&election);
        }
    }

    pub fn container_info(&self) -> ContainerInfo {
        let state = self.mutex.lock().unwrap();
        ContainerInfo::builder()
            .leaf(
                "roots",
                state.roots.len(),
                std::mem::size_of::<(QualifiedRoot, Arc<Election>)>(),
            )
            .leaf("priority", state.priority_count, 0)
            .leaf("hinted", state.hinted_count, 0)
            .leaf("optimistic", state.optimistic_count, 0)
            .node("recently_confirmed", self.recently_confirmed.container_info())
            .finish()
    }

    /// Elections over the priority overfill threshold are dropped oldest
    /// first
    fn trim(&self) {
        let overfill_limit = self.limit(ElectionBehavior::Priority) as i64 / 4;
        loop {
            let oldest = {
                let state = self.mutex.lock().unwrap();
                if self.vacancy_locked(&state, ElectionBehavior::Priority) >= -overfill_limit {
                    break;
                }
                state.roots.oldest().copied()
            };
            let Some(oldest) = oldest else {
                break;
            };
            self.stats
                .inc(StatType::ActiveElections, DetailType::EraseOldest);
            self.erase(&oldest);
        }
    }

    fn cleanup_election(&self, mut state: MutexGuard<State>, election: Arc<Election>) {
        *state.count_by_behavior_mut(election.behavior) -= 1;
        drop(state);

        self.vote_router.disconnect_election(&election);

        let confirmed = election.is_confirmed();
        self.stats.inc(
            if confirmed {
                StatType::ActiveConfirmed
            } else {
                StatType::ActiveDropped
            },
            DetailType::Stopped,
        );
        debug!(root = ?election.qualified_root, confirmed, "election erased");

        if !confirmed {
            // keep the tally warm so the root can come back as hinted
            let hashes: Vec<BlockHash> = {
                let guard = election.mutex.lock().unwrap();
                guard.last_blocks.keys().copied().collect()
            };
            let mut cache = self.vote_cache.lock().unwrap();
            for hash in hashes {
                cache.trigger(&hash);
            }
        }
        self.condition.notify_all();
    }

    fn request_loop(&self) {
        let mut guard = self.mutex.lock().unwrap();
        while !guard.stopped {
            drop(guard);
            self.stats.inc(StatType::ActiveElections, DetailType::Loop);
            self.request_confirm();
            self.promote_hinted();
            self.vote_cache.lock().unwrap().cleanup();
            guard = self.mutex.lock().unwrap();
            guard = self
                .condition
                .wait_timeout_while(guard, self.loop_interval, |s| !s.stopped)
                .unwrap()
                .0;
        }
    }

    /// One solicitation pass over every active election
    pub fn request_confirm(&self) {
        let representatives = {
            let reps = self.online_reps.lock().unwrap();
            reps.peered_reps()
        };
        let elections = self.list_active(usize::MAX);

        let mut solicitor =
            ConfirmationSolicitor::new(&*self.network, &self.solicitor_config, self.stats.clone());
        solicitor.prepare(&representatives);

        for election in &elections {
            if self.transition_time(&mut solicitor, election) {
                self.erase(&election.qualified_root);
            }
        }
        solicitor.flush();
    }

    /// Returns true when the election is finished and should be erased
    fn transition_time(
        &self,
        solicitor: &mut ConfirmationSolicitor,
        election: &Arc<Election>,
    ) -> bool {
        let guard = election.mutex.lock().unwrap();
        match guard.state {
            ElectionState::Running => {
                if election.last_broadcast_elapsed() >= BLOCK_BROADCAST_INTERVAL
                    && solicitor.broadcast(&guard).is_ok()
                {
                    self.stats
                        .inc(StatType::ActiveElections, DetailType::BroadcastBlock);
                    election.set_last_broadcast();
                }
                if election.last_req_elapsed() >= confirm_req_interval(election.behavior)
                    && !solicitor.add(election, &guard)
                {
                    election.set_last_req();
                    election
                        .confirmation_request_count
                        .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
                drop(guard);

                if election.election_start.elapsed() > election.time_to_live() {
                    if election.transition_expired() {
                        self.stats
                            .inc(StatType::ActiveTimeout, DetailType::Expired);
                        return true;
                    }
                    // confirmed while we were checking, finish next pass
                }
                false
            }
            ElectionState::Confirmed => {
                // one last winner broadcast before retiring
                let _ = solicitor.broadcast(&guard);
                drop(guard);
                election.transition_expired_confirmed();
                true
            }
            ElectionState::ExpiredConfirmed | ElectionState::ExpiredUnconfirmed => true,
        }
    }

    /// Move the best vote cache candidates into hinted elections while
    /// there is vacancy
    pub fn promote_hinted(&self) {
        let min_tally = {
            let reps = self.online_reps.lock().unwrap();
            reps.delta()
                .percentage(self.config.hinted_threshold_percent as u8)
        };

        while self.vacancy(ElectionBehavior::Hinted) > 0 {
            let top = {
                let mut cache = self.vote_cache.lock().unwrap();
                cache.pop(min_tally)
            };
            let Some(top) = top else {
                break;
            };
            let Some(block) = self.block_source.block(&top.hash) else {
                continue;
            };
            self.stats
                .inc(StatType::ActiveElections, DetailType::Hinted);
            self.insert(&block, ElectionBehavior::Hinted);
        }
    }
}

fn confirm_req_interval(behavior: ElectionBehavior) -> Duration {
    match behavior {
        ElectionBehavior::Priority => Duration::from_secs(5),
        ElectionBehavior::Hinted | ElectionBehavior::Optimistic => Duration::from_secs(1),
    }
}

impl Drop for ActiveElections {
    fn drop(&mut self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

pub trait ActiveElectionsExt {
    fn start(&self);
}

impl ActiveElectionsExt for Arc<ActiveElections> {
    fn start(&self) {
        let self_l = Arc::clone(self);
        let mut thread = self.thread.lock().unwrap();
        debug_assert!(thread.is_none());
        *thread = Some(
            std::thread::Builder::new()
                .name("Election loop".to_owned())
                .spawn(move || {
                    debug!("election loop started");
                    self_l.request_loop();
                })
                .unwrap(),
        );
    }
}
