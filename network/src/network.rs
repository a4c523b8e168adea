use crate::{
    send_tracker::{SendListener, SendTracker, SentMessage},
    Channel, ChannelId, DropPolicy, TrafficType,
};
use rand::{seq::SliceRandom, thread_rng};
use rslat_core::utils::ContainerInfo;
use rslat_messages::Message;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tracing::debug;

/// Registry of the outbound channels towards all connected peers
pub struct Network {
    channels: Mutex<HashMap<ChannelId, Arc<Channel>>>,
    next_channel_id: AtomicUsize,
    max_queue: usize,
    send_listener: SendListener,
}

impl Network {
    pub fn new(max_queue: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            next_channel_id: AtomicUsize::new(1),
            max_queue,
            send_listener: SendListener::new(),
        }
    }

    pub fn new_test_instance() -> Self {
        Self::new(Channel::DEFAULT_MAX_QUEUE)
    }

    pub fn add_channel(&self) -> Arc<Channel> {
        let channel_id = ChannelId::from(self.next_channel_id.fetch_add(1, Ordering::SeqCst));
        let channel = Arc::new(Channel::new(channel_id, self.max_queue));
        self.channels
            .lock()
            .unwrap()
            .insert(channel_id, channel.clone());
        debug!(%channel_id, "Channel added");
        channel
    }

    pub fn get(&self, channel_id: ChannelId) -> Option<Arc<Channel>> {
        self.channels.lock().unwrap().get(&channel_id).cloned()
    }

    pub fn remove(&self, channel_id: ChannelId) {
        if let Some(channel) = self.channels.lock().unwrap().remove(&channel_id) {
            channel.close();
            debug!(%channel_id, "Channel removed");
        }
    }

    pub fn len(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_alive(&self, channel_id: ChannelId) -> bool {
        self.get(channel_id).is_some_and(|c| c.is_alive())
    }

    pub fn is_queue_full(&self, channel_id: ChannelId, traffic_type: TrafficType) -> bool {
        match self.get(channel_id) {
            Some(channel) => channel.is_queue_full(traffic_type),
            None => true,
        }
    }

    /// Returns false if the message was dropped
    pub fn try_send(
        &self,
        channel_id: ChannelId,
        message: &Message,
        drop_policy: DropPolicy,
        traffic_type: TrafficType,
    ) -> bool {
        let Some(channel) = self.get(channel_id) else {
            return false;
        };
        let sent = channel.try_send(message, drop_policy, traffic_type);
        if sent {
            self.send_listener.emit(SentMessage {
                channel_id,
                message: message.clone(),
            });
        }
        sent
    }

    /// Broadcasting to sqrt(peers) random peers reaches everyone with
    /// high probability
    pub fn fanout(&self, scale: f32) -> usize {
        ((self.len() as f32).sqrt() * scale).ceil() as usize
    }

    pub fn random_fanout(&self, scale: f32) -> Vec<Arc<Channel>> {
        let mut channels: Vec<_> = self.channels.lock().unwrap().values().cloned().collect();
        channels.shuffle(&mut thread_rng());
        channels.truncate(self.fanout(scale));
        channels
    }

    pub fn flood(&self, message: &Message, drop_policy: DropPolicy, scale: f32) {
        for channel in self.random_fanout(scale) {
            self.try_send(channel.channel_id(), message, drop_policy, TrafficType::Generic);
        }
    }

    pub fn track_sends(&self) -> Arc<SendTracker> {
        self.send_listener.track()
    }

    pub fn container_info(&self) -> ContainerInfo {
        ContainerInfo::builder()
            .leaf(
                "channels",
                self.len(),
                std::mem::size_of::<Arc<Channel>>() + std::mem::size_of::<ChannelId>(),
            )
            .finish()
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new_test_instance()
    }
}
