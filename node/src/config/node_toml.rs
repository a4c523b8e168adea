use super::{
    ActiveElectionsConfig, ConfirmationSolicitorConfig, NodeConfig, VoteCacheConfig,
    VoteCacheProcessorConfig,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize, Serialize, Default)]
pub struct NodeToml {
    pub active_elections: Option<ActiveElectionsToml>,
    pub vote_cache: Option<VoteCacheToml>,
    pub confirmation_solicitor: Option<ConfirmationSolicitorToml>,
    pub vote_cache_processor: Option<VoteCacheProcessorToml>,
    pub aec_loop_interval_ms: Option<u64>,
}

impl From<&NodeToml> for NodeConfig {
    fn from(toml: &NodeToml) -> Self {
        let mut config = NodeConfig::default();
        if let Some(active_elections) = &toml.active_elections {
            config.active_elections = active_elections.into();
        }
        if let Some(vote_cache) = &toml.vote_cache {
            config.vote_cache = vote_cache.into();
        }
        if let Some(solicitor) = &toml.confirmation_solicitor {
            config.confirmation_solicitor = solicitor.into();
        }
        if let Some(processor) = &toml.vote_cache_processor {
            config.vote_cache_processor = processor.into();
        }
        if let Some(interval) = toml.aec_loop_interval_ms {
            config.aec_loop_interval = Duration::from_millis(interval);
        }
        config
    }
}

impl From<&NodeConfig> for NodeToml {
    fn from(config: &NodeConfig) -> Self {
        Self {
            active_elections: Some((&config.active_elections).into()),
            vote_cache: Some((&config.vote_cache).into()),
            confirmation_solicitor: Some((&config.confirmation_solicitor).into()),
            vote_cache_processor: Some((&config.vote_cache_processor).into()),
            aec_loop_interval_ms: Some(config.aec_loop_interval.as_millis() as u64),
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct ActiveElectionsToml {
    pub size: Option<usize>,
    pub hinted_limit_percentage: Option<usize>,
    pub optimistic_limit_percentage: Option<usize>,
    pub confirmation_cache: Option<usize>,
    pub hinted_threshold_percent: Option<usize>,
}

impl Default for ActiveElectionsToml {
    fn default() -> Self {
        (&ActiveElectionsConfig::default()).into()
    }
}

impl From<&ActiveElectionsToml> for ActiveElectionsConfig {
    fn from(toml: &ActiveElectionsToml) -> Self {
        let mut config = ActiveElectionsConfig::default();
        if let Some(size) = toml.size {
            config.size = size
        };
        if let Some(hinted_limit_percentage) = toml.hinted_limit_percentage {
            config.hinted_limit_percentage = hinted_limit_percentage
        };
        if let Some(optimistic_limit_percentage) = toml.optimistic_limit_percentage {
            config.optimistic_limit_percentage = optimistic_limit_percentage
        };
        if let Some(confirmation_cache) = toml.confirmation_cache {
            config.confirmation_cache = confirmation_cache
        };
        if let Some(hinted_threshold_percent) = toml.hinted_threshold_percent {
            config.hinted_threshold_percent = hinted_threshold_percent
        };
        config
    }
}

impl From<&ActiveElectionsConfig> for ActiveElectionsToml {
    fn from(config: &ActiveElectionsConfig) -> Self {
        Self {
            size: Some(config.size),
            hinted_limit_percentage: Some(config.hinted_limit_percentage),
            optimistic_limit_percentage: Some(config.optimistic_limit_percentage),
            confirmation_cache: Some(config.confirmation_cache),
            hinted_threshold_percent: Some(config.hinted_threshold_percent),
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct VoteCacheToml {
    pub max_size: Option<usize>,
    pub max_voters: Option<usize>,
    pub age_cutoff_secs: Option<u64>,
}

impl Default for VoteCacheToml {
    fn default() -> Self {
        (&VoteCacheConfig::default()).into()
    }
}

impl From<&VoteCacheToml> for VoteCacheConfig {
    fn from(toml: &VoteCacheToml) -> Self {
        let mut config = VoteCacheConfig::default();
        if let Some(max_size) = toml.max_size {
            config.max_size = max_size
        };
        if let Some(max_voters) = toml.max_voters {
            config.max_voters = max_voters
        };
        if let Some(age_cutoff) = toml.age_cutoff_secs {
            config.age_cutoff = Duration::from_secs(age_cutoff)
        };
        config
    }
}

impl From<&VoteCacheConfig> for VoteCacheToml {
    fn from(config: &VoteCacheConfig) -> Self {
        Self {
            max_size: Some(config.max_size),
            max_voters: Some(config.max_voters),
            age_cutoff_secs: Some(config.age_cutoff.as_secs()),
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct ConfirmationSolicitorToml {
    pub max_election_requests: Option<usize>,
    pub max_election_broadcasts: Option<usize>,
    pub flood_scale: Option<f32>,
}

impl Default for ConfirmationSolicitorToml {
    fn default() -> Self {
        (&ConfirmationSolicitorConfig::default()).into()
    }
}

impl From<&ConfirmationSolicitorToml> for ConfirmationSolicitorConfig {
    fn from(toml: &ConfirmationSolicitorToml) -> Self {
        let mut config = ConfirmationSolicitorConfig::default();
        if let Some(max_election_requests) = toml.max_election_requests {
            config.max_election_requests = max_election_requests
        };
        if let Some(max_election_broadcasts) = toml.max_election_broadcasts {
            config.max_election_broadcasts = max_election_broadcasts
        };
        if let Some(flood_scale) = toml.flood_scale {
            config.flood_scale = flood_scale
        };
        config
    }
}

impl From<&ConfirmationSolicitorConfig> for ConfirmationSolicitorToml {
    fn from(config: &ConfirmationSolicitorConfig) -> Self {
        Self {
            max_election_requests: Some(config.max_election_requests),
            max_election_broadcasts: Some(config.max_election_broadcasts),
            flood_scale: Some(config.flood_scale),
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct VoteCacheProcessorToml {
    pub max_triggered: Option<usize>,
}

impl Default for VoteCacheProcessorToml {
    fn default() -> Self {
        (&VoteCacheProcessorConfig::default()).into()
    }
}

impl From<&VoteCacheProcessorToml> for VoteCacheProcessorConfig {
    fn from(toml: &VoteCacheProcessorToml) -> Self {
        let mut config = VoteCacheProcessorConfig::default();
        if let Some(max_triggered) = toml.max_triggered {
            config.max_triggered = max_triggered
        };
        config
    }
}

impl From<&VoteCacheProcessorConfig> for VoteCacheProcessorToml {
    fn from(config: &VoteCacheProcessorConfig) -> Self {
        Self {
            max_triggered: Some(config.max_triggered),
        }
    }
}
