use rslat_core::Block;
use std::fmt::Display;

/// Unsolicited block broadcast, also used by the solicitor as the
/// fallback when a channel's targeted request budget is exhausted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publish {
    pub block: Block,
    pub is_originator: bool,
}

impl Publish {
    pub fn new_forward(block: Block) -> Self {
        Self {
            block,
            is_originator: false,
        }
    }

    pub fn new_from_originator(block: Block) -> Self {
        Self {
            block,
            is_originator: true,
        }
    }

    pub fn new_test_instance() -> Self {
        Self::new_forward(Block::new_test_instance())
    }
}

impl serde::Serialize for Publish {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.block.hash().encode_hex())
    }
}

impl Display for Publish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\nblock {}", self.block.hash())
    }
}
