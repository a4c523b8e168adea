use super::{VoteCache, VoteRouter};
use crate::{
    config::VoteCacheProcessorConfig,
    stats::{DetailType, StatType, Stats},
};
use rslat_core::{utils::ContainerInfo, BlockHash, VoteSource};
use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Condvar, Mutex},
    thread::JoinHandle,
};
use tracing::debug;

/// Replays cached votes into freshly started elections. Requests are
/// queued by hash and drained by a dedicated thread so election
/// insertion never waits on vote replay.
pub struct VoteCacheProcessor {
    thread: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<(Condvar, Mutex<State>)>,
    vote_cache: Arc<Mutex<VoteCache>>,
    vote_router: Arc<VoteRouter>,
    stats: Arc<Stats>,
    config: VoteCacheProcessorConfig,
}

struct State {
    stopped: bool,
    triggered: VecDeque<BlockHash>,
}

impl VoteCacheProcessor {
    pub fn new(
        vote_cache: Arc<Mutex<VoteCache>>,
        vote_router: Arc<VoteRouter>,
        config: VoteCacheProcessorConfig,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            thread: Mutex::new(None),
            shared: Arc::new((
                Condvar::new(),
                Mutex::new(State {
                    stopped: false,
                    triggered: VecDeque::new(),
                }),
            )),
            vote_cache,
            vote_router,
            stats,
            config,
        }
    }

    pub fn stop(&self) {
        self.shared.1.lock().unwrap().stopped = true;
        self.shared.0.notify_all();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    /// Queue a hash for replay. Bounded; the oldest request is dropped
    /// when the queue overfills.
    pub fn trigger(&self, hash: BlockHash) {
        {
            let mut state = self.shared.1.lock().unwrap();
            while state.triggered.len() >= self.config.max_triggered {
                state.triggered.pop_front();
                self.stats
                    .inc(StatType::VoteCacheProcessor, DetailType::Overfill);
            }
            state.triggered.push_back(hash);
        }
        self.stats
            .inc(StatType::VoteCacheProcessor, DetailType::Triggered);
        self.shared.0.notify_all();
    }

    pub fn len(&self) -> usize {
        self.shared.1.lock().unwrap().triggered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain everything queued so far, synchronously
    pub fn run_batch(&self) {
        let batch: VecDeque<BlockHash> = {
            let mut state = self.shared.1.lock().unwrap();
            std::mem::take(&mut state.triggered)
        };
        if batch.is_empty() {
            return;
        }

        let hashes: HashSet<BlockHash> = batch.into_iter().collect();
        for hash in hashes {
            self.process(&hash);
        }
    }

    fn process(&self, hash: &BlockHash) {
        let Some(election) = self.vote_router.election(hash) else {
            return;
        };
        let voters = self.vote_cache.lock().unwrap().find(hash);
        for voter in voters {
            election.vote(
                &voter.representative,
                voter.timestamp,
                hash,
                VoteSource::Cache,
            );
        }
        self.stats
            .inc(StatType::VoteCacheProcessor, DetailType::Processed);
    }

    pub fn container_info(&self) -> ContainerInfo {
        let state = self.shared.1.lock().unwrap();
        [(
            "triggered",
            state.triggered.len(),
            std::mem::size_of::<BlockHash>(),
        )]
        .into()
    }
}

impl Drop for VoteCacheProcessor {
    fn drop(&mut self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

pub trait VoteCacheProcessorExt {
    fn start(&self);
}

impl VoteCacheProcessorExt for Arc<VoteCacheProcessor> {
    fn start(&self) {
        let self_l = Arc::clone(self);
        let mut thread = self.thread.lock().unwrap();
        debug_assert!(thread.is_none());
        *thread = Some(
            std::thread::Builder::new()
                .name("Vote cache proc".to_owned())
                .spawn(move || {
                    debug!("vote cache processor started");
                    loop {
                        {
                            let (condition, state) = &*self_l.shared;
                            let guard = state.lock().unwrap();
                            let guard = condition
                                .wait_while(guard, |s| !s.stopped && s.triggered.is_empty())
                                .unwrap();
                            if guard.stopped {
                                return;
                            }
                        }
                        self_l.run_batch();
                    }
                })
                .unwrap(),
        );
    }
}
