use rslat_core::{BlockHash, Root};
use std::fmt::Display;

/// Request for votes on up to `ROOTS_MAX` contested chain positions,
/// batched per destination channel by the confirmation solicitor
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ConfirmReq {
    roots_hashes: Vec<(BlockHash, Root)>,
}

impl ConfirmReq {
    pub const ROOTS_MAX: usize = 7;

    pub fn new(roots_hashes: Vec<(BlockHash, Root)>) -> Self {
        debug_assert!(!roots_hashes.is_empty());
        debug_assert!(roots_hashes.len() <= Self::ROOTS_MAX);
        Self { roots_hashes }
    }

    pub fn roots_hashes(&self) -> &[(BlockHash, Root)] {
        &self.roots_hashes
    }

    pub fn new_test_instance() -> Self {
        Self::new(vec![(BlockHash::from(1), Root::from(BlockHash::from(2)))])
    }
}

impl Display for ConfirmReq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (hash, root) in &self.roots_hashes {
            write!(f, "\n{}:{}", hash, root)?;
        }
        Ok(())
    }
}
