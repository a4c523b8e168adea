mod node_config;
mod node_toml;

pub use node_config::{
    ActiveElectionsConfig, ConfirmationSolicitorConfig, NodeConfig, VoteCacheConfig,
    VoteCacheProcessorConfig,
};
pub use node_toml::{
    ActiveElectionsToml, ConfirmationSolicitorToml, NodeToml, VoteCacheProcessorToml,
    VoteCacheToml,
};
