use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use tokio::sync::broadcast;

use super::notifier::{PublishError, PushChannel, PushMessage};

/// Per-user named channels for the SSE endpoint.
///
/// Lossy: a subscriber that falls more than `capacity` messages behind
/// skips ahead. Senders are created on first subscription. Channels whose
/// receivers are all gone are dropped on the next subscribe or publish.
#[derive(Debug)]
pub struct PushHub {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<PushMessage>>>,
}

impl PushHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<PushMessage> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.retain(|_, tx| tx.receiver_count() > 0);
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.get(channel).map_or(0, |tx| tx.receiver_count())
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl PushChannel for PushHub {
    fn publish(&self, channel: &str, message: PushMessage) -> Result<usize, PublishError> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = channels.get(channel) else {
            return Err(PublishError::NoSubscribers(channel.to_string()));
        };

        match tx.send(message) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                channels.remove(channel);
                Err(PublishError::NoSubscribers(channel.to_string()))
            }
        }
    }
}
