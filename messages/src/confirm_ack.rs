use rslat_core::Vote;
use std::fmt::Display;

/// Carries one vote. Incoming acks have been signature-checked by the
/// message pipeline before the consensus core sees them.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ConfirmAck {
    vote: Vote,
    is_rebroadcasted: bool,
}

impl ConfirmAck {
    pub const HASHES_MAX: usize = Vote::MAX_HASHES;

    pub fn new_with_own_vote(vote: Vote) -> Self {
        assert!(vote.hashes.len() <= Self::HASHES_MAX);
        Self {
            vote,
            is_rebroadcasted: false,
        }
    }

    pub fn new_with_rebroadcasted_vote(vote: Vote) -> Self {
        assert!(vote.hashes.len() <= Self::HASHES_MAX);
        Self {
            vote,
            is_rebroadcasted: true,
        }
    }

    pub fn vote(&self) -> &Vote {
        &self.vote
    }

    pub fn is_rebroadcasted(&self) -> bool {
        self.is_rebroadcasted
    }

    pub fn new_test_instance() -> Self {
        Self::new_with_own_vote(Vote::new_test_instance())
    }
}

impl PartialEq for ConfirmAck {
    fn eq(&self, other: &Self) -> bool {
        self.vote == other.vote
    }
}

impl Eq for ConfirmAck {}

impl Display for ConfirmAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\nvote from {} for {} hashes",
            self.vote.voting_account,
            self.vote.hashes.len()
        )
    }
}
