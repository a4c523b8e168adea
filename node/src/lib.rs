pub mod config;
pub mod consensus;
pub mod representatives;
pub mod stats;
