use crate::stats::DetailType;

/// Affects capacity accounting and scheduling priority, not voting semantics
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionBehavior {
    /// Started by the priority scheduler from newly processed blocks
    Priority,
    /// Started from vote cache promotion, a sign the network is already voting on the block
    Hinted,
    /// Started speculatively for accounts far below their confirmed frontier
    Optimistic,
}

impl From<ElectionBehavior> for DetailType {
    fn from(value: ElectionBehavior) -> Self {
        match value {
            ElectionBehavior::Priority => DetailType::Priority,
            ElectionBehavior::Hinted => DetailType::Hinted,
            ElectionBehavior::Optimistic => DetailType::Optimistic,
        }
    }
}
