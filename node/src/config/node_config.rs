use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct ActiveElectionsConfig {
    /// Maximum number of simultaneous elections (AEC size)
    pub size: usize,
    /// Limit of hinted elections as percentage of `size`
    pub hinted_limit_percentage: usize,
    /// Limit of optimistic elections as percentage of `size`
    pub optimistic_limit_percentage: usize,
    /// Maximum number of recently confirmed roots to remember
    pub confirmation_cache: usize,
    /// Minimum vote cache tally for promotion, as percentage of the quorum delta
    pub hinted_threshold_percent: usize,
}

impl Default for ActiveElectionsConfig {
    fn default() -> Self {
        Self {
            size: 5000,
            hinted_limit_percentage: 20,
            optimistic_limit_percentage: 10,
            confirmation_cache: 65536,
            hinted_threshold_percent: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VoteCacheConfig {
    /// Maximum number of block hashes to cache votes for
    pub max_size: usize,
    /// Maximum number of voters to cache per block hash
    pub max_voters: usize,
    /// Maximum age of votes to keep in cache
    pub age_cutoff: Duration,
}

impl Default for VoteCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1024 * 64,
            max_voters: 128,
            age_cutoff: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmationSolicitorConfig {
    /// Maximum targeted confirmation requests per channel per round
    pub max_election_requests: usize,
    /// Maximum directed block broadcasts per round
    pub max_election_broadcasts: usize,
    /// Fanout scale used when flooding the winner block
    pub flood_scale: f32,
}

impl Default for ConfirmationSolicitorConfig {
    fn default() -> Self {
        Self {
            max_election_requests: 50,
            max_election_broadcasts: 30,
            flood_scale: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VoteCacheProcessorConfig {
    /// Maximum number of queued trigger hashes before the oldest is dropped
    pub max_triggered: usize,
}

impl Default for VoteCacheProcessorConfig {
    fn default() -> Self {
        Self {
            max_triggered: 16384,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeConfig {
    pub active_elections: ActiveElectionsConfig,
    pub vote_cache: VoteCacheConfig,
    pub confirmation_solicitor: ConfirmationSolicitorConfig,
    pub vote_cache_processor: VoteCacheProcessorConfig,
    /// Interval between solicitation rounds
    pub aec_loop_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            active_elections: Default::default(),
            vote_cache: Default::default(),
            confirmation_solicitor: Default::default(),
            vote_cache_processor: Default::default(),
            aec_loop_interval: Duration::from_millis(500),
        }
    }
}

impl NodeConfig {
    pub fn load_toml_str(input: &str) -> anyhow::Result<Self> {
        let toml: crate::config::NodeToml = toml::from_str(input)?;
        Ok((&toml).into())
    }
}
