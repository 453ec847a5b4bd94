//! In-process pub/sub over tokio broadcast channels.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use loopline_common::{AppError, AppResult};
use loopline_core::{Envelope, PubSub};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Single-process pub/sub backend.
///
/// Publishing to a topic nobody subscribed to drops the envelope, matching
/// the fire-and-forget semantics of the Redis backend.
#[derive(Default)]
pub struct MemoryPubSub {
    topics: RwLock<HashMap<String, broadcast::Sender<Envelope>>>,
}

impl MemoryPubSub {
    /// Create an empty pub/sub table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> AppResult<broadcast::Sender<Envelope>> {
        let mut topics = self
            .topics
            .write()
            .map_err(|e| AppError::Internal(format!("Pub/sub lock poisoned: {e}")))?;
        Ok(topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone())
    }

    /// Number of topics currently held in the table.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.read().map_or(0, |topics| topics.len())
    }
}

#[async_trait]
impl PubSub for MemoryPubSub {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> AppResult<()> {
        let sender = {
            let topics = self
                .topics
                .read()
                .map_err(|e| AppError::Internal(format!("Pub/sub lock poisoned: {e}")))?;
            topics.get(topic).cloned()
        };

        if let Some(sender) = sender {
            // send only fails when every receiver is gone; that is a no-op
            // delivery, not an error
            let _ = sender.send(envelope.clone());
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> AppResult<broadcast::Receiver<Envelope>> {
        Ok(self.sender(topic)?.subscribe())
    }

    async fn unsubscribe(&self, topic: &str) -> AppResult<()> {
        let mut topics = self
            .topics
            .write()
            .map_err(|e| AppError::Internal(format!("Pub/sub lock poisoned: {e}")))?;
        if let Some(sender) = topics.get(topic)
            && sender.receiver_count() == 0
        {
            topics.remove(topic);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_envelope() {
        let pubsub = MemoryPubSub::new();
        let mut rx = pubsub.subscribe("user:u1").await.unwrap();

        let envelope = Envelope::new_post("p1");
        pubsub.publish("user:u1", &envelope).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), envelope);
    }

    #[tokio::test]
    async fn test_every_session_of_a_user_gets_the_event() {
        let pubsub = MemoryPubSub::new();
        let mut rx1 = pubsub.subscribe("user:u1").await.unwrap();
        let mut rx2 = pubsub.subscribe("user:u1").await.unwrap();

        let envelope = Envelope::new_post("p1");
        pubsub.publish("user:u1", &envelope).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap(), envelope);
        assert_eq!(rx2.recv().await.unwrap(), envelope);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let pubsub = MemoryPubSub::new();
        pubsub
            .publish("user:nobody", &Envelope::new_post("p1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribe_prunes_idle_topic() {
        let pubsub = MemoryPubSub::new();
        let rx = pubsub.subscribe("user:u1").await.unwrap();
        assert_eq!(pubsub.topic_count(), 1);

        drop(rx);
        pubsub.unsubscribe("user:u1").await.unwrap();

        assert_eq!(pubsub.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_keeps_topic_with_live_sessions() {
        let pubsub = MemoryPubSub::new();
        let mut rx1 = pubsub.subscribe("user:u1").await.unwrap();
        let rx2 = pubsub.subscribe("user:u1").await.unwrap();

        drop(rx2);
        pubsub.unsubscribe("user:u1").await.unwrap();
        assert_eq!(pubsub.topic_count(), 1);

        let envelope = Envelope::new_post("p1");
        pubsub.publish("user:u1", &envelope).await.unwrap();
        assert_eq!(rx1.recv().await.unwrap(), envelope);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let pubsub = MemoryPubSub::new();
        let mut rx = pubsub.subscribe("user:u1").await.unwrap();

        pubsub
            .publish("user:u2", &Envelope::new_post("p1"))
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
    }
}
