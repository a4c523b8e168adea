mod active_elections;
mod block_source;
mod confirmation_solicitor;
mod election;
mod election_behavior;
mod recently_confirmed_cache;
mod vote_cache;
mod vote_cache_processor;
mod vote_router;

pub use active_elections::{
    ActiveElections, ActiveElectionsExt, AlreadyConfirmedCallback, InsertOutcome,
};
pub use block_source::{BlockSource, NullBlockSource};
pub use confirmation_solicitor::ConfirmationSolicitor;
pub use election::{
    ConfirmedCallback, Election, ElectionData, ElectionState, ElectionStatus, VoteInfo,
    ELECTION_MAX_BLOCKS,
};
pub use election_behavior::ElectionBehavior;
pub use recently_confirmed_cache::RecentlyConfirmedCache;
pub use vote_cache::{CacheEntry, TopEntry, VoteCache, VoterEntry};
pub use vote_cache_processor::{VoteCacheProcessor, VoteCacheProcessorExt};
pub use vote_router::{VoteProcessedCallback, VoteRouter, VoteRouterExt};
