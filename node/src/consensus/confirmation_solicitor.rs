use super::election::{Election, ElectionData};
use crate::{
    config::ConfirmationSolicitorConfig,
    representatives::PeeredRep,
    stats::{DetailType, StatType, Stats},
};
use rslat_core::{BlockHash, Root};
use rslat_messages::{ConfirmReq, Message, Publish};
use rslat_network::{ChannelId, DropPolicy, Network, TrafficType};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, MutexGuard},
};

/// Batches outgoing confirmation requests and block rebroadcasts for one
/// pass over the active elections. prepare / add / flush per round; the
/// per-channel request budget and the per-round broadcast budget keep a
/// large election container from flooding the network.
pub struct ConfirmationSolicitor<'a> {
    network: &'a Network,
    representatives: Vec<PeeredRep>,
    requests: HashMap<ChannelId, Vec<(BlockHash, Root)>>,
    max_election_requests: usize,
    max_election_broadcasts: usize,
    flood_scale: f32,
    rebroadcasted: usize,
    prepared: bool,
    stats: Arc<Stats>,
}

impl<'a> ConfirmationSolicitor<'a> {
    pub fn new(
        network: &'a Network,
        config: &ConfirmationSolicitorConfig,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            network,
            representatives: Vec::new(),
            requests: HashMap::new(),
            max_election_requests: config.max_election_requests,
            max_election_broadcasts: config.max_election_broadcasts,
            flood_scale: config.flood_scale,
            rebroadcasted: 0,
            prepared: false,
            stats,
        }
    }

    /// Begin a new round. Representatives sharing a channel collapse to
    /// one entry so a channel is never solicited twice for the same root.
    pub fn prepare(&mut self, representatives: &[PeeredRep]) {
        debug_assert!(!self.prepared);
        debug_assert!(self.requests.is_empty());
        self.rebroadcasted = 0;
        let mut channels = HashSet::new();
        self.representatives = representatives
            .iter()
            .filter(|rep| channels.insert(rep.channel_id))
            .cloned()
            .collect();
        self.prepared = true;
    }

    /// Rebroadcast the election winner, directed to the representatives
    /// that have not yet voted for it plus a random flood. Errors once
    /// the per-round broadcast budget is spent.
    pub fn broadcast(&mut self, guard: &MutexGuard<ElectionData>) -> Result<(), ()> {
        debug_assert!(self.prepared);
        if self.rebroadcasted >= self.max_election_broadcasts {
            return Err(());
        }
        let Some(winner) = guard.status.winner.clone() else {
            return Err(());
        };
        self.rebroadcasted += 1;

        let winner_hash = winner.hash();
        let publish = Message::Publish(Publish::new_forward(winner));
        for rep in &self.representatives {
            let voted_for_winner = guard
                .last_votes
                .get(&rep.account)
                .is_some_and(|info| info.hash == winner_hash);
            if !voted_for_winner {
                self.network.try_send(
                    rep.channel_id,
                    &publish,
                    DropPolicy::CanDrop,
                    TrafficType::Generic,
                );
            }
        }
        self.network
            .flood(&publish, DropPolicy::CanDrop, self.flood_scale);
        self.stats
            .inc(StatType::ConfirmationSolicitor, DetailType::BroadcastBlock);
        Ok(())
    }

    /// Queue confirmation requests for the election winner towards every
    /// representative still worth asking. Returns true if no request was
    /// queued.
    pub fn add(&mut self, election: &Election, guard: &MutexGuard<ElectionData>) -> bool {
        debug_assert!(self.prepared);
        let Some(winner_hash) = guard.winner_hash() else {
            return true;
        };

        let mut count = 0;
        let representatives = self.representatives.clone();
        for rep in &representatives {
            if let Some(existing) = guard.last_votes.get(&rep.account) {
                // Already final for the winner, or backing another fork;
                // a request changes nothing either way
                if existing.hash != winner_hash || existing.is_final() {
                    continue;
                }
            }

            let queue = self.requests.entry(rep.channel_id).or_default();
            if queue.len() >= self.max_election_requests {
                // Channel budget spent, fall back to pushing the block itself
                if self.rebroadcasted < self.max_election_broadcasts {
                    if let Some(winner) = guard.status.winner.clone() {
                        self.rebroadcasted += 1;
                        let publish = Message::Publish(Publish::new_forward(winner));
                        self.network.try_send(
                            rep.channel_id,
                            &publish,
                            DropPolicy::CanDrop,
                            TrafficType::Generic,
                        );
                        self.stats
                            .inc(StatType::ConfirmationSolicitor, DetailType::BroadcastBlock);
                    }
                }
            } else {
                queue.push((winner_hash, election.root));
                count += 1;
            }
        }
        count == 0
    }

    /// Send out everything queued this round, batched per channel at the
    /// wire limit
    pub fn flush(&mut self) {
        debug_assert!(self.prepared);
        for (channel_id, roots_hashes) in std::mem::take(&mut self.requests) {
            for chunk in roots_hashes.chunks(ConfirmReq::ROOTS_MAX) {
                let message = Message::ConfirmReq(ConfirmReq::new(chunk.to_vec()));
                self.network.try_send(
                    channel_id,
                    &message,
                    DropPolicy::CanDrop,
                    TrafficType::Generic,
                );
                self.stats
                    .inc(StatType::ConfirmationSolicitor, DetailType::ConfirmReq);
            }
        }
        self.prepared = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consensus::{ElectionBehavior, RecentlyConfirmedCache},
        representatives::{OnlineReps, RepWeights},
    };
    use rslat_core::{Amount, Block, BlockHash, PrivateKey, PublicKey, Vote, VoteSource};
    use std::sync::Mutex;

    fn test_block(seed: u64) -> Block {
        let key = PrivateKey::from_bytes(&[9; 32]);
        Block::new(
            key.account(),
            BlockHash::from(seed),
            key.public_key(),
            Amount::raw(1),
            BlockHash::zero(),
            &key,
            0,
        )
    }

    fn test_election(block: Block, weight: Amount) -> (Arc<Election>, PrivateKey) {
        let key = PrivateKey::new();
        let rep_weights = Arc::new(RepWeights::new());
        rep_weights.set_weight(key.public_key(), weight);
        let mut online_reps = OnlineReps::new(rep_weights);
        online_reps.set_quorum_percent(67);
        online_reps.set_online(weight.wrapping_add(weight));
        let election = Arc::new(Election::new(
            block,
            ElectionBehavior::Priority,
            Arc::new(Mutex::new(online_reps)),
            Arc::new(RecentlyConfirmedCache::new(100)),
            Arc::new(Mutex::new(Vec::new())),
            Arc::new(Stats::new()),
        ));
        (election, key)
    }

    fn config(max_requests: usize) -> ConfirmationSolicitorConfig {
        ConfirmationSolicitorConfig {
            max_election_requests: max_requests,
            max_election_broadcasts: 30,
            flood_scale: 0.5,
        }
    }

    #[test]
    fn flush_sends_batched_requests() {
        let network = Network::new_test_instance();
        let channel = network.add_channel();
        let tracker = network.track_sends();
        let rep = PeeredRep::new(PublicKey::random(), channel.channel_id());

        let mut solicitor =
            ConfirmationSolicitor::new(&network, &config(50), Arc::new(Stats::new()));
        solicitor.prepare(&[rep]);

        let (election, _) = test_election(test_block(1), Amount::raw(10));
        let guard = election.mutex.lock().unwrap();
        assert!(!solicitor.add(&election, &guard));
        drop(guard);
        solicitor.flush();

        let sent = tracker.output();
        assert_eq!(sent.len(), 1);
        let Message::ConfirmReq(req) = &sent[0].message else {
            panic!("expected a confirm req");
        };
        assert_eq!(req.roots_hashes().len(), 1);
        assert_eq!(req.roots_hashes()[0].1, election.root);
    }

    #[test]
    fn requests_chunked_at_wire_limit() {
        let network = Network::new_test_instance();
        let channel = network.add_channel();
        let tracker = network.track_sends();
        let rep = PeeredRep::new(PublicKey::random(), channel.channel_id());

        let mut solicitor =
            ConfirmationSolicitor::new(&network, &config(50), Arc::new(Stats::new()));
        solicitor.prepare(&[rep]);

        let elections: Vec<_> = (0..ConfirmReq::ROOTS_MAX as u64 + 1)
            .map(|i| test_election(test_block(i + 1), Amount::raw(10)).0)
            .collect();
        for election in &elections {
            let guard = election.mutex.lock().unwrap();
            assert!(!solicitor.add(election, &guard));
        }
        solicitor.flush();

        let sent = tracker.output();
        assert_eq!(sent.len(), 2);
        let Message::ConfirmReq(first) = &sent[0].message else {
            panic!("expected a confirm req");
        };
        let Message::ConfirmReq(second) = &sent[1].message else {
            panic!("expected a confirm req");
        };
        assert_eq!(
            first.roots_hashes().len() + second.roots_hashes().len(),
            ConfirmReq::ROOTS_MAX + 1
        );
    }

    #[test]
    fn channel_budget_falls_back_to_broadcast() {
        let network = Network::new_test_instance();
        let channel = network.add_channel();
        let tracker = network.track_sends();
        let rep = PeeredRep::new(PublicKey::random(), channel.channel_id());

        let mut solicitor =
            ConfirmationSolicitor::new(&network, &config(2), Arc::new(Stats::new()));
        solicitor.prepare(&[rep]);

        let elections: Vec<_> = (0..3)
            .map(|i| test_election(test_block(i + 1), Amount::raw(10)).0)
            .collect();
        for election in &elections {
            let guard = election.mutex.lock().unwrap();
            solicitor.add(election, &guard);
        }
        // The third add overflowed the channel budget and published the block
        let sent = tracker.output();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].message, Message::Publish(_)));
        tracker.clear();

        solicitor.flush();
        let sent = tracker.output();
        assert_eq!(sent.len(), 1);
        let Message::ConfirmReq(req) = &sent[0].message else {
            panic!("expected a confirm req");
        };
        assert_eq!(req.roots_hashes().len(), 2);
    }

    #[test]
    fn reps_backing_another_fork_not_solicited() {
        let network = Network::new_test_instance();
        let channel = network.add_channel();
        let tracker = network.track_sends();

        let (election, key) = test_election(test_block(1), Amount::raw(10));
        let winner_hash = election.winner().unwrap().hash();
        let other_hash = BlockHash::from(4242);
        assert_ne!(winner_hash, other_hash);
        election.vote(
            &key.public_key(),
            Vote::TIMESTAMP_MIN,
            &other_hash,
            VoteSource::Live,
        );

        let rep = PeeredRep::new(key.public_key(), channel.channel_id());
        let mut solicitor =
            ConfirmationSolicitor::new(&network, &config(50), Arc::new(Stats::new()));
        solicitor.prepare(&[rep]);

        let guard = election.mutex.lock().unwrap();
        assert!(solicitor.add(&election, &guard));
        drop(guard);
        solicitor.flush();
        assert!(tracker.output().is_empty());
    }

    #[test]
    fn final_voters_not_solicited_again() {
        let network = Network::new_test_instance();
        let channel = network.add_channel();
        let tracker = network.track_sends();

        let (election, key) = test_election(test_block(1), Amount::raw(10));
        let winner_hash = election.winner().unwrap().hash();
        election.vote(
            &key.public_key(),
            Vote::FINAL_TIMESTAMP,
            &winner_hash,
            VoteSource::Live,
        );

        let rep = PeeredRep::new(key.public_key(), channel.channel_id());
        let mut solicitor =
            ConfirmationSolicitor::new(&network, &config(50), Arc::new(Stats::new()));
        solicitor.prepare(&[rep]);

        let guard = election.mutex.lock().unwrap();
        assert!(solicitor.add(&election, &guard));
        drop(guard);
        solicitor.flush();
        assert!(tracker.output().is_empty());
    }

    #[test]
    fn reps_sharing_a_channel_collapse() {
        let network = Network::new_test_instance();
        let channel = network.add_channel();
        let tracker = network.track_sends();
        let rep1 = PeeredRep::new(PublicKey::random(), channel.channel_id());
        let rep2 = PeeredRep::new(PublicKey::random(), channel.channel_id());

        let mut solicitor =
            ConfirmationSolicitor::new(&network, &config(50), Arc::new(Stats::new()));
        solicitor.prepare(&[rep1, rep2]);

        let (election, _) = test_election(test_block(1), Amount::raw(10));
        let guard = election.mutex.lock().unwrap();
        assert!(!solicitor.add(&election, &guard));
        drop(guard);
        solicitor.flush();

        let sent = tracker.output();
        assert_eq!(sent.len(), 1);
        let Message::ConfirmReq(req) = &sent[0].message else {
            panic!("expected a confirm req");
        };
        assert_eq!(req.roots_hashes().len(), 1);
    }

    #[test]
    fn broadcast_directed_and_flooded() {
        let network = Network::new_test_instance();
        let rep_channel = network.add_channel();
        for _ in 0..3 {
            network.add_channel();
        }
        let tracker = network.track_sends();
        let rep = PeeredRep::new(PublicKey::random(), rep_channel.channel_id());

        let mut solicitor =
            ConfirmationSolicitor::new(&network, &config(50), Arc::new(Stats::new()));
        solicitor.prepare(&[rep]);

        let (election, _) = test_election(test_block(1), Amount::raw(10));
        let guard = election.mutex.lock().unwrap();
        assert!(solicitor.broadcast(&guard).is_ok());
        drop(guard);

        let sent = tracker.output();
        // one directed publish to the non-voting rep plus the flood
        assert!(sent.len() >= 2);
        assert!(sent
            .iter()
            .all(|s| matches!(s.message, Message::Publish(_))));
        assert!(sent
            .iter()
            .any(|s| s.channel_id == rep_channel.channel_id()));
        solicitor.flush();
    }

    #[test]
    fn broadcast_budget_is_bounded() {
        let network = Network::new_test_instance();
        network.add_channel();
        let mut config = config(50);
        config.max_election_broadcasts = 1;

        let mut solicitor =
            ConfirmationSolicitor::new(&network, &config, Arc::new(Stats::new()));
        solicitor.prepare(&[]);

        let (election, _) = test_election(test_block(1), Amount::raw(10));
        let guard = election.mutex.lock().unwrap();
        assert!(solicitor.broadcast(&guard).is_ok());
        assert!(solicitor.broadcast(&guard).is_err());
        drop(guard);
        solicitor.flush();
    }
}
