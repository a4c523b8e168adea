mod stats;

pub use stats::Stats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatType {
    Active,
    ActiveElections,
    ActiveConfirmed,
    ActiveDropped,
    ActiveTimeout,
    Election,
    VoteRouter,
    VoteCache,
    VoteCacheProcessor,
    ConfirmationSolicitor,
}

impl StatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatType::Active => "active",
            StatType::ActiveElections => "active_elections",
            StatType::ActiveConfirmed => "active_confirmed",
            StatType::ActiveDropped => "active_dropped",
            StatType::ActiveTimeout => "active_timeout",
            StatType::Election => "election",
            StatType::VoteRouter => "vote_router",
            StatType::VoteCache => "vote_cache",
            StatType::VoteCacheProcessor => "vote_cache_processor",
            StatType::ConfirmationSolicitor => "confirmation_solicitor",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetailType {
    All,
    Loop,
    Started,
    Stopped,
    Confirmed,
    Expired,
    AlreadyExists,
    CapacityRejected,
    EraseOldest,
    VoteNew,
    VoteCached,
    VoteReplay,
    VoteIndeterminate,
    VoteIgnored,
    Insert,
    Update,
    Cleanup,
    Pop,
    Trigger,
    Triggered,
    Processed,
    Overfill,
    Hinted,
    Optimistic,
    Priority,
    BroadcastBlock,
    ConfirmReq,
}

impl DetailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailType::All => "all",
            DetailType::Loop => "loop",
            DetailType::Started => "started",
            DetailType::Stopped => "stopped",
            DetailType::Confirmed => "confirmed",
            DetailType::Expired => "expired",
            DetailType::AlreadyExists => "already_exists",
            DetailType::CapacityRejected => "capacity_rejected",
            DetailType::EraseOldest => "erase_oldest",
            DetailType::VoteNew => "vote_new",
            DetailType::VoteCached => "vote_cached",
            DetailType::VoteReplay => "vote_replay",
            DetailType::VoteIndeterminate => "vote_indeterminate",
            DetailType::VoteIgnored => "vote_ignored",
            DetailType::Insert => "insert",
            DetailType::Update => "update",
            DetailType::Cleanup => "cleanup",
            DetailType::Pop => "pop",
            DetailType::Trigger => "trigger",
            DetailType::Triggered => "triggered",
            DetailType::Processed => "processed",
            DetailType::Overfill => "overfill",
            DetailType::Hinted => "hinted",
            DetailType::Optimistic => "optimistic",
            DetailType::Priority => "priority",
            DetailType::BroadcastBlock => "broadcast_block",
            DetailType::ConfirmReq => "confirm_req",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}
