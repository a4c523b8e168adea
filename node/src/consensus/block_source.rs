use rslat_core::{Block, BlockHash};

/// Where the scheduler fetches full blocks for hashes it only knows from
/// cached votes. Backed by the ledger in a running node.
pub trait BlockSource: Send + Sync {
    fn block(&self, hash: &BlockHash) -> Option<Block>;
}

/// Source that knows no blocks, for nodes that do not promote hinted
/// elections and for tests
pub struct NullBlockSource;

impl BlockSource for NullBlockSource {
    fn block(&self, _hash: &BlockHash) -> Option<Block> {
        None
    }
}
