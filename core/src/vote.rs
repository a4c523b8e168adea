use crate::{keys::verify_signature, BlockHash, BlockHashBuilder, PrivateKey, PublicKey, Signature};
use serde::Serialize;

/// A signed statement by a representative backing one or more block
/// hashes. The low 4 bits of the raw timestamp encode a duration hint;
/// `timestamp()` masks them off. The all-ones raw value is the final
/// vote sentinel: an irrevocable commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Vote {
    pub voting_account: PublicKey,
    pub signature: Signature,
    /// Raw timestamp including duration bits
    pub timestamp: u64,
    pub hashes: Vec<BlockHash>,
}

impl Vote {
    pub const TIMESTAMP_MASK: u64 = 0xFFFF_FFFF_FFFF_FFF0;
    pub const TIMESTAMP_MAX: u64 = Self::TIMESTAMP_MASK;
    pub const TIMESTAMP_MIN: u64 = 0x0000_0000_0000_0010;
    pub const FINAL_TIMESTAMP: u64 = Self::TIMESTAMP_MASK;
    pub const DURATION_MAX: u8 = 0x0F;
    pub const MAX_HASHES: usize = 12;

    pub fn null() -> Self {
        Self {
            voting_account: PublicKey::zero(),
            signature: Signature::default(),
            timestamp: 0,
            hashes: Vec::new(),
        }
    }

    pub fn new(key: &PrivateKey, timestamp: u64, duration: u8, hashes: Vec<BlockHash>) -> Self {
        debug_assert!(hashes.len() <= Self::MAX_HASHES);
        let raw_timestamp = packed_timestamp(timestamp, duration);
        let mut result = Self {
            voting_account: key.public_key(),
            signature: Signature::default(),
            timestamp: raw_timestamp,
            hashes,
        };
        result.signature = key.sign(result.digest().as_bytes());
        result
    }

    /// A vote with the sentinel timestamp, never to be contradicted by
    /// its signer
    pub fn new_final(key: &PrivateKey, hashes: Vec<BlockHash>) -> Self {
        Self::new(key, Self::TIMESTAMP_MAX, Self::DURATION_MAX, hashes)
    }

    /// Timestamp with duration bits masked off. Final votes map to
    /// `FINAL_TIMESTAMP`.
    pub fn timestamp(&self) -> u64 {
        self.timestamp & Self::TIMESTAMP_MASK
    }

    pub fn duration_bits(&self) -> u8 {
        (self.timestamp & 0x0F) as u8
    }

    pub fn is_final(&self) -> bool {
        self.timestamp() == Self::FINAL_TIMESTAMP
    }

    pub fn is_final_timestamp(timestamp: u64) -> bool {
        timestamp == Self::FINAL_TIMESTAMP
    }

    /// Digest covered by the signature
    pub fn digest(&self) -> BlockHash {
        let mut builder = BlockHashBuilder::new();
        for hash in &self.hashes {
            builder = builder.update(hash.as_bytes());
        }
        builder.update(self.timestamp.to_le_bytes()).build()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hashes.is_empty() || self.hashes.len() > Self::MAX_HASHES {
            bail!("vote carries an invalid number of hashes");
        }
        verify_signature(
            &self.voting_account,
            self.digest().as_bytes(),
            &self.signature,
        )
    }

    pub fn new_test_instance() -> Self {
        let key = PrivateKey::from_bytes(&[7; 32]);
        Self::new(&key, 1024 * 1024, 0, vec![BlockHash::from(1)])
    }
}

fn packed_timestamp(timestamp: u64, duration: u8) -> u64 {
    debug_assert!(duration <= Vote::DURATION_MAX);
    debug_assert!(timestamp == Vote::TIMESTAMP_MAX || (timestamp & !Vote::TIMESTAMP_MASK) == 0);
    (timestamp & Vote::TIMESTAMP_MASK) | (duration as u64)
}

/// Outcome of routing one voted hash through the consensus core.
/// `Invalid` only originates from the external signature/structure
/// checks, never from within the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VoteCode {
    /// Vote was accepted for a live election and may have changed a tally
    Vote,
    /// Monotonicity violated, vote dropped
    Replay,
    /// No live election, recorded in the vote cache only
    Indeterminate,
    /// Rejected before reaching the core
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VoteSource {
    /// Freshly received over the wire
    Live,
    /// Replayed from the vote cache during promotion
    Cache,
}
