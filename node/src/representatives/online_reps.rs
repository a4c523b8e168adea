use super::RepWeights;
use rslat_core::{Amount, PublicKey};
use rslat_network::ChannelId;
use std::{cmp::max, collections::HashMap, sync::Arc, time::Duration};

#[cfg(test)]
use mock_instant::Instant;
#[cfg(not(test))]
use std::time::Instant;

pub const ONLINE_WEIGHT_QUORUM: u8 = 67;

/// A representative that is reachable through a live channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeeredRep {
    pub account: PublicKey,
    pub channel_id: ChannelId,
}

impl PeeredRep {
    pub fn new(account: PublicKey, channel_id: ChannelId) -> Self {
        Self {
            account,
            channel_id,
        }
    }
}

/// Tracks which representatives are currently online and derives the
/// quorum delta from their combined stake
pub struct OnlineReps {
    rep_weights: Arc<RepWeights>,
    observed: HashMap<PublicKey, Instant>,
    peered: HashMap<PublicKey, ChannelId>,
    trended: Amount,
    online: Amount,
    weight_period: Duration,
    online_weight_minimum: Amount,
    quorum_percent: u8,
}

impl OnlineReps {
    pub fn new(rep_weights: Arc<RepWeights>) -> Self {
        Self {
            rep_weights,
            observed: HashMap::new(),
            peered: HashMap::new(),
            trended: Amount::zero(),
            online: Amount::zero(),
            weight_period: Duration::from_secs(5 * 60),
            online_weight_minimum: Amount::zero(),
            quorum_percent: ONLINE_WEIGHT_QUORUM,
        }
    }

    pub fn set_weight_period(&mut self, period: Duration) {
        self.weight_period = period;
    }

    pub fn set_online_weight_minimum(&mut self, minimum: Amount) {
        self.online_weight_minimum = minimum;
    }

    pub fn set_quorum_percent(&mut self, percent: u8) {
        debug_assert!(percent <= 100);
        self.quorum_percent = percent;
    }

    pub fn weight(&self, account: &PublicKey) -> Amount {
        self.rep_weights.weight(account)
    }

    /// Add a voting account to the set of online representatives
    pub fn observe(&mut self, rep_account: PublicKey) {
        if self.rep_weights.weight(&rep_account) > Amount::zero() {
            let new_insert = self
                .observed
                .insert(rep_account, Instant::now())
                .is_none();
            let cutoff = self.weight_period;
            let len_before = self.observed.len();
            self.observed.retain(|_, time| time.elapsed() < cutoff);
            if new_insert || self.observed.len() != len_before {
                self.calculate_online();
            }
        }
    }

    /// Register a representative as reachable through the given channel
    pub fn peer(&mut self, rep_account: PublicKey, channel_id: ChannelId) {
        self.peered.insert(rep_account, channel_id);
        self.observe(rep_account);
    }

    pub fn unpeer(&mut self, rep_account: &PublicKey) {
        self.peered.remove(rep_account);
    }

    pub fn peered_reps(&self) -> Vec<PeeredRep> {
        self.peered
            .iter()
            .map(|(account, channel_id)| PeeredRep::new(*account, *channel_id))
            .collect()
    }

    pub fn is_peered(&self, channel_id: ChannelId) -> bool {
        self.peered.values().any(|id| *id == channel_id)
    }

    /// Returns the current online stake
    pub fn online(&self) -> Amount {
        self.online
    }

    pub fn set_online(&mut self, amount: Amount) {
        self.online = amount;
    }

    /// Returns the trended online stake
    pub fn trended(&self) -> Amount {
        self.trended
    }

    pub fn set_trended(&mut self, trended: Amount) {
        self.trended = trended;
    }

    /// Returns the quorum required for confirmation
    pub fn delta(&self) -> Amount {
        let weight = max(
            max(self.online, self.trended),
            self.online_weight_minimum,
        );
        weight.percentage(self.quorum_percent)
    }

    pub fn list(&self) -> Vec<PublicKey> {
        self.observed.keys().copied().collect()
    }

    pub fn count(&self) -> usize {
        self.observed.len()
    }

    pub fn clear(&mut self) {
        self.observed.clear();
        self.online = Amount::zero();
    }

    fn calculate_online(&mut self) {
        let mut current = Amount::zero();
        for account in self.observed.keys() {
            current += self.rep_weights.weight(account);
        }
        self.online = current;
    }
}
