mod channel;
mod network;
mod send_tracker;

pub use channel::{Channel, ChannelId, DropPolicy, TrafficType};
pub use network::Network;
pub use send_tracker::{SendListener, SendTracker, SentMessage};
