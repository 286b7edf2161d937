use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use uuid::Uuid;

use crate::{
    models::Notification,
    store::{InventoryStore, StoreResult},
};

pub const MESSAGE_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub event: String,
    pub data: serde_json::Value,
}

impl PushMessage {
    /// `message` event carrying `{"text": ...}`, the shape the browser toast expects.
    pub fn text(text: &str) -> Self {
        Self {
            event: MESSAGE_EVENT.to_string(),
            data: json!({ "text": text }),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no subscriber on channel {0}")]
    NoSubscribers(String),
}

/// Synchronous relay to a per-user named channel. Returns how many
/// receivers got the message.
pub trait PushChannel: Send + Sync {
    fn publish(&self, channel: &str, message: PushMessage) -> Result<usize, PublishError>;
}

pub fn user_channel(user_id: Uuid) -> String {
    user_id.to_string()
}

pub struct NotificationDispatcher {
    store: Arc<dyn InventoryStore>,
    channel: Arc<dyn PushChannel>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn InventoryStore>, channel: Arc<dyn PushChannel>) -> Self {
        Self { store, channel }
    }

    /// Records a notification for `destination` and relays it.
    pub async fn send(&self, destination: Uuid, body: &str) -> StoreResult<(Notification, bool)> {
        let mut notification = self.store.create_notification(Some(destination), body).await?;
        let delivered = self.notify(&mut notification).await?;
        Ok((notification, delivered))
    }

    /// Publishes the notification on its destination's channel and marks it
    /// read. A failed publish leaves it unread so the next subscriber
    /// connection receives it; only store failures are errors.
    pub async fn notify(&self, notification: &mut Notification) -> StoreResult<bool> {
        let Some(destination) = notification.destination_id else {
            log::warn!("notification {} has no destination", notification.id);
            return Ok(false);
        };

        let channel = user_channel(destination);
        match self.channel.publish(&channel, PushMessage::text(&notification.body)) {
            Ok(receivers) => {
                log::debug!("notification {} relayed to {} receiver(s)", notification.id, receivers);
            }
            Err(err) => {
                log::warn!("notification {} kept unread: {}", notification.id, err);
                return Ok(false);
            }
        }

        self.store.mark_notification_read(notification.id).await?;
        notification.read = true;
        Ok(true)
    }

    /// Stream for one subscriber: the user's unread backlog first, then the
    /// live channel.
    ///
    /// The backlog is read from the store instead of going through the
    /// bounded broadcast buffer, so its length is not limited by the hub
    /// capacity. Each pending notification is marked read when the stream
    /// hands it out; whatever is left unpolled stays unread.
    pub async fn pending_then_live(
        &self,
        user_id: Uuid,
        live: broadcast::Receiver<PushMessage>,
    ) -> StoreResult<impl Stream<Item = PushMessage> + Send + 'static> {
        let pending = self.store.unread_notifications(user_id).await?;
        if !pending.is_empty() {
            log::info!("replaying {} pending notification(s) to {}", pending.len(), user_id);
        }

        let store = Arc::clone(&self.store);
        let backlog = tokio_stream::iter(pending).then(move |notification| {
            let store = Arc::clone(&store);
            async move {
                if let Err(err) = store.mark_notification_read(notification.id).await {
                    log::error!("failed to mark notification {} read: {}", notification.id, err);
                }
                PushMessage::text(&notification.body)
            }
        });

        let live = BroadcastStream::new(live).filter_map(|message| match message {
            Ok(message) => Some(message),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                log::warn!("push subscriber lagged, {} message(s) skipped", skipped);
                None
            }
        });

        Ok(backlog.chain(live))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Push channel that records publishes instead of delivering them.
    #[derive(Debug, Default)]
    pub struct RecordingChannel {
        pub published: Mutex<Vec<(String, PushMessage)>>,
        pub offline: bool,
    }

    impl RecordingChannel {
        pub fn offline() -> Self {
            Self {
                offline: true,
                ..Self::default()
            }
        }

        pub fn published(&self) -> Vec<(String, PushMessage)> {
            self.published.lock().unwrap().clone()
        }
    }

    impl PushChannel for RecordingChannel {
        fn publish(&self, channel: &str, message: PushMessage) -> Result<usize, PublishError> {
            if self.offline {
                return Err(PublishError::NoSubscribers(channel.to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((channel.to_string(), message));
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingChannel;
    use super::*;
    use crate::{services::push::PushHub, store::InMemoryStore};

    fn dispatcher(
        channel: Arc<RecordingChannel>,
    ) -> (Arc<InMemoryStore>, NotificationDispatcher) {
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = NotificationDispatcher::new(store.clone(), channel);
        (store, dispatcher)
    }

    #[tokio::test]
    async fn notify_publishes_once_and_marks_read() {
        let channel = Arc::new(RecordingChannel::default());
        let (store, dispatcher) = dispatcher(channel.clone());
        let user = Uuid::new_v4();
        let mut notification = store
            .create_notification(Some(user), "Low stock on bolts")
            .await
            .unwrap();
        assert!(!notification.read);

        assert!(dispatcher.notify(&mut notification).await.unwrap());

        assert!(notification.read);
        assert!(store.notifications()[0].read);
        let published = channel.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, user.to_string());
        assert_eq!(published[0].1.event, "message");
        assert_eq!(published[0].1.data, json!({ "text": "Low stock on bolts" }));
    }

    #[tokio::test]
    async fn failed_publish_keeps_notification_unread() {
        let channel = Arc::new(RecordingChannel::offline());
        let (store, dispatcher) = dispatcher(channel);
        let user = Uuid::new_v4();

        let (notification, delivered) = dispatcher.send(user, "High stock").await.unwrap();

        assert!(!delivered);
        assert!(!notification.read);
        assert_eq!(store.unread_notifications(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn backlog_longer_than_hub_capacity_is_delivered_in_order() {
        let hub = Arc::new(PushHub::new(2));
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = NotificationDispatcher::new(store.clone(), hub.clone());
        let user = Uuid::new_v4();
        for i in 0..5 {
            store.create_notification(Some(user), &format!("n{i}")).await.unwrap();
        }

        let live = hub.subscribe(&user_channel(user));
        let stream = dispatcher.pending_then_live(user, live).await.unwrap();
        tokio::pin!(stream);

        let mut texts = Vec::new();
        for _ in 0..2 {
            texts.push(stream.next().await.unwrap().data["text"].clone());
        }
        assert_eq!(store.unread_notifications(user).await.unwrap().len(), 3);

        for _ in 0..3 {
            texts.push(stream.next().await.unwrap().data["text"].clone());
        }
        assert_eq!(texts, ["n0", "n1", "n2", "n3", "n4"]);
        assert!(store.unread_notifications(user).await.unwrap().is_empty());

        hub.publish(&user_channel(user), PushMessage::text("live")).unwrap();
        assert_eq!(stream.next().await.unwrap().data["text"], "live");
    }

    #[tokio::test]
    async fn notification_without_destination_is_not_published() {
        let channel = Arc::new(RecordingChannel::default());
        let (store, dispatcher) = dispatcher(channel.clone());
        let mut notification = store.create_notification(None, "orphan").await.unwrap();

        assert!(!dispatcher.notify(&mut notification).await.unwrap());
        assert!(channel.published().is_empty());
    }
}
