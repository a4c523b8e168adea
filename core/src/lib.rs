#[macro_use]
extern crate anyhow;

mod amount;
mod block;
mod keys;
mod numbers;
pub mod utils;
mod vote;

pub use amount::Amount;
pub use block::Block;
pub use keys::{verify_signature, PrivateKey};
pub use numbers::{
    Account, BlockHash, BlockHashBuilder, PublicKey, QualifiedRoot, Root, Signature,
};
pub use vote::{Vote, VoteCode, VoteSource};
