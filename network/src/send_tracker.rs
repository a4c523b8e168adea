use crate::ChannelId;
use rslat_messages::Message;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, Weak,
};

#[derive(Clone, Debug)]
pub struct SentMessage {
    pub channel_id: ChannelId,
    pub message: Message,
}

/// Records the messages a `Network` emitted while the tracker is alive
pub struct SendTracker {
    sent: Mutex<Vec<SentMessage>>,
}

impl SendTracker {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, sent: SentMessage) {
        self.sent.lock().unwrap().push(sent);
    }

    pub fn output(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Default for SendTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out weakly held trackers, so that emitting is free once the
/// last tracker is dropped
pub struct SendListener {
    trackers: Mutex<Vec<Weak<SendTracker>>>,
    count: AtomicUsize,
}

impl SendListener {
    pub fn new() -> Self {
        Self {
            trackers: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
        }
    }

    pub fn track(&self) -> Arc<SendTracker> {
        let tracker = Arc::new(SendTracker::new());
        let mut guard = self.trackers.lock().unwrap();
        guard.push(Arc::downgrade(&tracker));
        self.count.store(guard.len(), Ordering::SeqCst);
        tracker
    }

    pub fn emit(&self, sent: SentMessage) {
        if self.count.load(Ordering::SeqCst) == 0 {
            return;
        }

        let mut guard = self.trackers.lock().unwrap();
        let mut should_clean = false;
        for tracker in guard.iter() {
            if let Some(tracker) = tracker.upgrade() {
                tracker.add(sent.clone());
            } else {
                should_clean = true;
            }
        }

        if should_clean {
            guard.retain(|t| t.strong_count() > 0);
            self.count.store(guard.len(), Ordering::SeqCst);
        }
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.lock().unwrap().len()
    }
}

impl Default for SendListener {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rslat_messages::Publish;

    fn test_message() -> SentMessage {
        SentMessage {
            channel_id: ChannelId::from(1),
            message: Message::Publish(Publish::new_test_instance()),
        }
    }

    #[test]
    fn emit_without_trackers() {
        let listener = SendListener::new();
        listener.emit(test_message());
    }

    #[test]
    fn track_sends() {
        let listener = SendListener::new();
        let tracker = listener.track();
        listener.emit(test_message());
        listener.emit(test_message());
        assert_eq!(tracker.output().len(), 2);
    }

    #[test]
    fn stop_tracking_when_tracker_dropped() {
        let listener = SendListener::new();
        let tracker = listener.track();
        listener.emit(test_message());
        assert_eq!(listener.tracker_count(), 1);
        drop(tracker);
        listener.emit(test_message());
        assert_eq!(listener.tracker_count(), 0);
    }
}
