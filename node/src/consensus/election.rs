use super::{ElectionBehavior, RecentlyConfirmedCache};
use crate::{
    representatives::OnlineReps,
    stats::{DetailType, StatType, Stats},
};
use rslat_core::{Amount, Block, BlockHash, PublicKey, QualifiedRoot, Root, Vote, VoteCode,
    VoteSource};
use std::{
    collections::HashMap,
    sync::{atomic::AtomicU32, Arc, Mutex, MutexGuard},
    time::{Duration, SystemTime},
};
use tracing::trace;

#[cfg(test)]
use mock_instant::Instant;
#[cfg(not(test))]
use std::time::Instant;

/// Maximum number of fork candidates tracked per election
pub const ELECTION_MAX_BLOCKS: usize = 10;

pub type ConfirmedCallback = Box<dyn Fn(&Block) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionState {
    Running,
    Confirmed,
    ExpiredConfirmed,
    ExpiredUnconfirmed,
}

impl ElectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ElectionState::ExpiredConfirmed | ElectionState::ExpiredUnconfirmed
        )
    }
}

#[derive(Clone, Default)]
pub struct ElectionStatus {
    pub winner: Option<Block>,
    pub tally: Amount,
    pub final_tally: Amount,
    pub block_count: u32,
    pub voter_count: u32,
    pub election_end: Option<SystemTime>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteInfo {
    pub time: SystemTime,
    pub timestamp: u64,
    pub hash: BlockHash,
}

impl VoteInfo {
    pub fn new(timestamp: u64, hash: BlockHash) -> Self {
        Self {
            time: SystemTime::now(),
            timestamp,
            hash,
        }
    }

    pub fn is_final(&self) -> bool {
        self.timestamp == Vote::FINAL_TIMESTAMP
    }
}

pub struct ElectionData {
    pub state: ElectionState,
    pub status: ElectionStatus,
    pub last_blocks: HashMap<BlockHash, Block>,
    pub last_votes: HashMap<PublicKey, VoteInfo>,
    /// Always equal to the sum of `weight(rep)` over all reps whose
    /// `last_votes[rep].hash` is the given candidate
    pub tally: HashMap<BlockHash, Amount>,
}

impl ElectionData {
    pub fn winner_hash(&self) -> Option<BlockHash> {
        self.status.winner.as_ref().map(|b| b.hash())
    }

    fn tally_for(&self, hash: &BlockHash) -> Amount {
        self.tally.get(hash).copied().unwrap_or_default()
    }
}

/// State machine for one contested chain position. Confirmation happens
/// the instant some candidate's tally reaches the quorum delta; the
/// election is terminal afterwards, later votes are recorded for
/// observability only.
pub struct Election {
    pub mutex: Mutex<ElectionData>,
    pub behavior: ElectionBehavior,
    pub root: Root,
    pub qualified_root: QualifiedRoot,
    pub election_start: Instant,
    pub confirmation_request_count: AtomicU32,
    last_req: Mutex<Option<Instant>>,
    last_broadcast: Mutex<Option<Instant>>,
    online_reps: Arc<Mutex<OnlineReps>>,
    recently_confirmed: Arc<RecentlyConfirmedCache>,
    confirmed_observers: Arc<Mutex<Vec<ConfirmedCallback>>>,
    stats: Arc<Stats>,
}

impl Election {
    pub fn new(
        block: Block,
        behavior: ElectionBehavior,
        online_reps: Arc<Mutex<OnlineReps>>,
        recently_confirmed: Arc<RecentlyConfirmedCache>,
        confirmed_observers: Arc<Mutex<Vec<ConfirmedCallback>>>,
        stats: Arc<Stats>,
    ) -> Self {
        let root = block.root();
        let qualified_root = block.qualified_root();
        let hash = block.hash();

        let data = ElectionData {
            state: ElectionState::Running,
            status: ElectionStatus {
                winner: Some(block.clone()),
                block_count: 1,
                ..Default::default()
            },
            last_blocks: HashMap::from([(hash, block)]),
            last_votes: HashMap::new(),
            tally: HashMap::new(),
        };

        Self {
            mutex: Mutex::new(data),
            behavior,
            root,
            qualified_root,
            election_start: Instant::now(),
            confirmation_request_count: AtomicU32::new(0),
            last_req: Mutex::new(None),
            last_broadcast: Mutex::new(None),
            online_reps,
            recently_confirmed,
            confirmed_observers,
            stats,
        }
    }

    /// Apply a vote to this election. The replay rule is monotonic on
    /// timestamp per representative, with the final-vote sentinel always
    /// superseding non-final votes and itself never being superseded.
    pub fn vote(
        &self,
        rep: &PublicKey,
        timestamp: u64,
        hash: &BlockHash,
        source: VoteSource,
    ) -> VoteCode {
        // Snapshot the oracle before taking the data lock
        let (weight, delta) = {
            let reps = self.online_reps.lock().unwrap();
            (reps.weight(rep), reps.delta())
        };
        if weight.is_zero() {
            self.stats.inc(StatType::Election, DetailType::VoteIgnored);
            return VoteCode::Indeterminate;
        }

        let mut guard = self.mutex.lock().unwrap();

        if let Some(last_vote) = guard.last_votes.get(rep) {
            if last_vote.is_final()
                || (timestamp != Vote::FINAL_TIMESTAMP && timestamp <= last_vote.timestamp)
            {
                self.stats.inc(StatType::Election, DetailType::VoteReplay);
                return VoteCode::Replay;
            }
        }

        // Record the vote and move the rep's weight between candidates in one step
        let previous = guard
            .last_votes
            .insert(*rep, VoteInfo::new(timestamp, *hash));
        match previous {
            Some(previous) if previous.hash != *hash => {
                let remaining = guard.tally_for(&previous.hash).saturating_sub(weight);
                guard.tally.insert(previous.hash, remaining);
                *guard.tally.entry(*hash).or_default() += weight;
            }
            Some(_) => {}
            None => {
                *guard.tally.entry(*hash).or_default() += weight;
            }
        }

        self.stats.inc(
            StatType::Election,
            match source {
                VoteSource::Live => DetailType::VoteNew,
                VoteSource::Cache => DetailType::VoteCached,
            },
        );
        trace!(
            qualified_root = ?self.qualified_root,
            rep = %rep,
            %hash,
            timestamp,
            ?source,
            "vote processed"
        );

        if guard.state == ElectionState::Running {
            self.update_winner(&mut guard, hash);
            if guard.tally_for(hash) >= delta {
                self.confirm_once(guard, *hash);
            }
        }
        VoteCode::Vote
    }

    /// Add a fork candidate. Returns true if the block was rejected,
    /// false if it was added or refreshed.
    pub fn publish(&self, block: &Block) -> bool {
        let mut guard = self.mutex.lock().unwrap();

        if self.confirmed_locked(&guard) {
            return true;
        }
        let hash = block.hash();
        if guard.last_blocks.len() >= ELECTION_MAX_BLOCKS && !guard.last_blocks.contains_key(&hash)
        {
            return true;
        }
        guard.last_blocks.insert(hash, block.clone());
        guard.status.block_count = guard.last_blocks.len() as u32;
        false
    }

    pub fn is_confirmed(&self) -> bool {
        let guard = self.mutex.lock().unwrap();
        self.confirmed_locked(&guard)
    }

    pub fn confirmed_locked(&self, guard: &MutexGuard<ElectionData>) -> bool {
        matches!(
            guard.state,
            ElectionState::Confirmed | ElectionState::ExpiredConfirmed
        )
    }

    pub fn failed(&self) -> bool {
        self.mutex.lock().unwrap().state == ElectionState::ExpiredUnconfirmed
    }

    pub fn winner(&self) -> Option<Block> {
        self.mutex.lock().unwrap().status.winner.clone()
    }

    pub fn tally(&self) -> HashMap<BlockHash, Amount> {
        self.mutex.lock().unwrap().tally.clone()
    }

    pub fn votes(&self) -> HashMap<PublicKey, VoteInfo> {
        self.mutex.lock().unwrap().last_votes.clone()
    }

    pub fn blocks(&self) -> HashMap<BlockHash, Block> {
        self.mutex.lock().unwrap().last_blocks.clone()
    }

    pub fn behavior(&self) -> ElectionBehavior {
        self.behavior
    }

    pub fn state(&self) -> ElectionState {
        self.mutex.lock().unwrap().state
    }

    /// How long this contest is allowed to stay unconfirmed
    pub fn time_to_live(&self) -> Duration {
        match self.behavior {
            ElectionBehavior::Priority => Duration::from_secs(5 * 60),
            ElectionBehavior::Hinted | ElectionBehavior::Optimistic => Duration::from_secs(30),
        }
    }

    /// Transition to expired without confirmation. Returns false if the
    /// election confirmed while the caller was acquiring the lock.
    pub fn transition_expired(&self) -> bool {
        let mut guard = self.mutex.lock().unwrap();
        if self.confirmed_locked(&guard) {
            return false;
        }
        guard.state = ElectionState::ExpiredUnconfirmed;
        self.stats.inc(StatType::Election, DetailType::Expired);
        trace!(qualified_root = ?self.qualified_root, "election expired");
        true
    }

    /// Mark a confirmed election as fully processed
    pub fn transition_expired_confirmed(&self) {
        let mut guard = self.mutex.lock().unwrap();
        debug_assert_eq!(guard.state, ElectionState::Confirmed);
        guard.state = ElectionState::ExpiredConfirmed;
    }

    /// Confirm regardless of tally. Test-only shortcut through the state machine.
    pub fn force_confirm(&self) {
        let guard = self.mutex.lock().unwrap();
        let hash = guard
            .status
            .winner
            .as_ref()
            .map(|b| b.hash())
            .unwrap_or_default();
        self.confirm_once(guard, hash);
    }

    pub fn last_req_elapsed(&self) -> Duration {
        self.last_req
            .lock()
            .unwrap()
            .map(|i| i.elapsed())
            .unwrap_or(Duration::MAX)
    }

    pub fn set_last_req(&self) {
        *self.last_req.lock().unwrap() = Some(Instant::now());
    }

    pub fn last_broadcast_elapsed(&self) -> Duration {
        self.last_broadcast
            .lock()
            .unwrap()
            .map(|i| i.elapsed())
            .unwrap_or(Duration::MAX)
    }

    pub fn set_last_broadcast(&self) {
        *self.last_broadcast.lock().unwrap() = Some(Instant::now());
    }

    fn update_winner(&self, guard: &mut MutexGuard<ElectionData>, hash: &BlockHash) {
        let current = guard
            .winner_hash()
            .map(|winner| guard.tally_for(&winner))
            .unwrap_or_default();
        if guard.tally_for(hash) > current {
            if let Some(block) = guard.last_blocks.get(hash).cloned() {
                guard.status.winner = Some(block);
            }
        }
    }

    fn confirm_once(&self, mut guard: MutexGuard<ElectionData>, winner_hash: BlockHash) {
        if self.confirmed_locked(&guard) {
            return;
        }
        guard.state = ElectionState::Confirmed;
        debug_assert!(guard.last_blocks.contains_key(&winner_hash));
        if let Some(block) = guard.last_blocks.get(&winner_hash).cloned() {
            guard.status.winner = Some(block);
        }
        guard.status.tally = guard.tally_for(&winner_hash);
        let final_reps: Vec<PublicKey> = guard
            .last_votes
            .iter()
            .filter(|(_, info)| info.is_final() && info.hash == winner_hash)
            .map(|(rep, _)| *rep)
            .collect();
        guard.status.final_tally = {
            let reps = self.online_reps.lock().unwrap();
            final_reps.iter().map(|rep| reps.weight(rep)).sum()
        };
        guard.status.block_count = guard.last_blocks.len() as u32;
        guard.status.voter_count = guard.last_votes.len() as u32;
        guard.status.election_end = Some(SystemTime::now());
        let winner = guard.status.winner.clone();
        drop(guard);

        self.recently_confirmed
            .put(self.qualified_root, winner_hash);
        self.stats.inc(StatType::Election, DetailType::Confirmed);
        trace!(qualified_root = ?self.qualified_root, winner = %winner_hash, "election confirmed");

        if let Some(winner) = winner {
            let observers = self.confirmed_observers.lock().unwrap();
            for observer in observers.iter() {
                observer(&winner);
            }
        }
    }
}
