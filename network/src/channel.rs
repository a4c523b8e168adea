use rslat_messages::Message;
use std::{
    collections::VecDeque,
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(usize);

impl ChannelId {
    pub const LOOPBACK: Self = Self(0);

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl From<usize> for ChannelId {
    fn from(value: usize) -> Self {
        ChannelId(value)
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrafficType {
    Generic,
    /// Votes and confirmation requests, prioritized over block propagation
    Vote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropPolicy {
    /// Can be dropped when the write queue is full (default)
    CanDrop,
    /// Enqueue even when the write queue is full
    ShouldNotDrop,
}

/// Outbound side of a peer connection. Messages are queued up to
/// `max_queue` per traffic type and drained by the wire writer.
pub struct Channel {
    channel_id: ChannelId,
    alive: AtomicBool,
    max_queue: usize,
    queues: Mutex<[VecDeque<Message>; 2]>,
}

impl Channel {
    pub const DEFAULT_MAX_QUEUE: usize = 128;

    pub fn new(channel_id: ChannelId, max_queue: usize) -> Self {
        Self {
            channel_id,
            alive: AtomicBool::new(true),
            max_queue,
            queues: Mutex::new([VecDeque::new(), VecDeque::new()]),
        }
    }

    pub fn new_test_instance() -> Self {
        Self::new(ChannelId::from(42), Self::DEFAULT_MAX_QUEUE)
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_queue_full(&self, traffic_type: TrafficType) -> bool {
        self.queues.lock().unwrap()[traffic_type as usize].len() >= self.max_queue
    }

    /// Returns false if the message was dropped
    pub fn try_send(
        &self,
        message: &Message,
        drop_policy: DropPolicy,
        traffic_type: TrafficType,
    ) -> bool {
        if !self.is_alive() {
            return false;
        }

        let mut queues = self.queues.lock().unwrap();
        let queue = &mut queues[traffic_type as usize];
        if queue.len() >= self.max_queue && drop_policy == DropPolicy::CanDrop {
            return false;
        }

        queue.push_back(message.clone());
        true
    }

    pub fn queue_len(&self, traffic_type: TrafficType) -> usize {
        self.queues.lock().unwrap()[traffic_type as usize].len()
    }

    /// Takes the next queued message, vote traffic first
    pub fn pop(&self) -> Option<Message> {
        let mut queues = self.queues.lock().unwrap();
        queues[TrafficType::Vote as usize]
            .pop_front()
            .or_else(|| queues[TrafficType::Generic as usize].pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rslat_messages::Publish;

    fn publish() -> Message {
        Message::Publish(Publish::new_test_instance())
    }

    #[test]
    fn queue_bounded_when_droppable() {
        let channel = Channel::new(ChannelId::from(1), 2);
        assert!(channel.try_send(&publish(), DropPolicy::CanDrop, TrafficType::Generic));
        assert!(channel.try_send(&publish(), DropPolicy::CanDrop, TrafficType::Generic));
        assert!(!channel.try_send(&publish(), DropPolicy::CanDrop, TrafficType::Generic));
        assert_eq!(channel.queue_len(TrafficType::Generic), 2);
    }

    #[test]
    fn full_queue_accepts_non_droppable() {
        let channel = Channel::new(ChannelId::from(1), 1);
        assert!(channel.try_send(&publish(), DropPolicy::CanDrop, TrafficType::Generic));
        assert!(channel.is_queue_full(TrafficType::Generic));
        assert!(channel.try_send(&publish(), DropPolicy::ShouldNotDrop, TrafficType::Generic));
        assert_eq!(channel.queue_len(TrafficType::Generic), 2);
    }

    #[test]
    fn closed_channel_drops_everything() {
        let channel = Channel::new_test_instance();
        channel.close();
        assert!(!channel.try_send(&publish(), DropPolicy::ShouldNotDrop, TrafficType::Vote));
    }

    #[test]
    fn vote_traffic_popped_first() {
        let channel = Channel::new_test_instance();
        channel.try_send(&publish(), DropPolicy::CanDrop, TrafficType::Generic);
        channel.try_send(&publish(), DropPolicy::CanDrop, TrafficType::Vote);
        assert!(channel.pop().is_some());
        assert_eq!(channel.queue_len(TrafficType::Vote), 0);
        assert_eq!(channel.queue_len(TrafficType::Generic), 1);
    }
}
