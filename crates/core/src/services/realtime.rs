//! Real-time dispatcher.
//!
//! Converts materialized notifications and new-post signals into envelopes on
//! per-user topics. Delivery is fire-and-forget: the notification row is the
//! durability fallback, the socket is best-effort.

use async_trait::async_trait;
use loopline_common::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::notification::NotificationView;

/// Topic naming helpers.
pub mod topics {
    /// The per-user topic every live session of a user subscribes to.
    #[must_use]
    pub fn user(user_id: &str) -> String {
        format!("user:{user_id}")
    }
}

/// The wire envelope pushed over a live socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Outer discriminator: `notification` or `live_post`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Inner message.
    pub message: EnvelopeMessage,
}

/// Inner message of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMessage {
    /// Inner discriminator: `new_notification` or `new_post`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The event payload.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Envelope carrying a full notification payload.
    pub fn notification(view: &NotificationView) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: "notification".to_string(),
            message: EnvelopeMessage {
                kind: "new_notification".to_string(),
                payload: serde_json::to_value(view)?,
            },
        })
    }

    /// Lightweight envelope telling live clients a followed user posted.
    #[must_use]
    pub fn new_post(post_id: &str) -> Self {
        Self {
            kind: "live_post".to_string(),
            message: EnvelopeMessage {
                kind: "new_post".to_string(),
                payload: json!({ "id": post_id }),
            },
        }
    }
}

/// Transport the dispatcher publishes through.
///
/// Implementations live outside the core so tests can capture envelopes
/// synchronously and production can go through Redis.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Publish an envelope to a topic.
    async fn publish(&self, topic: &str, envelope: &Envelope) -> AppResult<()>;

    /// Subscribe to a topic. Each call returns an independent receiver, so a
    /// user with several open sessions gets every event on all of them.
    async fn subscribe(&self, topic: &str) -> AppResult<broadcast::Receiver<Envelope>>;

    /// Release a topic after a session disconnects. Implementations prune
    /// their per-topic state once no receivers remain.
    async fn unsubscribe(&self, topic: &str) -> AppResult<()>;
}

/// Shared handle to a pub/sub backend.
pub type SharedPubSub = Arc<dyn PubSub>;

/// A pub/sub backend that drops everything, for when real-time delivery is
/// disabled.
#[derive(Clone, Default)]
pub struct NoOpPubSub;

#[async_trait]
impl PubSub for NoOpPubSub {
    async fn publish(&self, _topic: &str, _envelope: &Envelope) -> AppResult<()> {
        Ok(())
    }

    async fn subscribe(&self, _topic: &str) -> AppResult<broadcast::Receiver<Envelope>> {
        let (_tx, rx) = broadcast::channel(1);
        Ok(rx)
    }

    async fn unsubscribe(&self, _topic: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Pushes envelopes at live sessions. Never fails the caller: a publish
/// error is logged and swallowed, because the triggering write has already
/// committed.
#[derive(Clone)]
pub struct RealtimeDispatcher {
    pubsub: SharedPubSub,
}

impl RealtimeDispatcher {
    /// Create a dispatcher over a pub/sub backend.
    #[must_use]
    pub fn new(pubsub: SharedPubSub) -> Self {
        Self { pubsub }
    }

    /// Publish a rendered notification to its recipient's topic.
    pub async fn publish_notification(&self, recipient_id: &str, view: &NotificationView) {
        let topic = topics::user(recipient_id);
        let envelope = match Envelope::notification(view) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, topic = %topic, "Failed to serialize notification event");
                return;
            }
        };
        if let Err(e) = self.pubsub.publish(&topic, &envelope).await {
            tracing::warn!(error = %e, topic = %topic, "Failed to publish notification event");
        }
    }

    /// Fan a new-post signal out to every follower's topic.
    pub async fn publish_new_post(&self, post_id: &str, follower_ids: &[String]) {
        let envelope = Envelope::new_post(post_id);
        for follower_id in follower_ids {
            let topic = topics::user(follower_id);
            if let Err(e) = self.pubsub.publish(&topic, &envelope).await {
                tracing::warn!(error = %e, topic = %topic, "Failed to publish new post event");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use loopline_common::AppError;
    use std::sync::Mutex;

    /// Captures published envelopes for assertions.
    pub(crate) struct CapturingPubSub {
        pub published: Mutex<Vec<(String, Envelope)>>,
        pub fail: bool,
    }

    impl CapturingPubSub {
        pub(crate) fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PubSub for CapturingPubSub {
        async fn publish(&self, topic: &str, envelope: &Envelope) -> AppResult<()> {
            if self.fail {
                return Err(AppError::Redis("connection refused".to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), envelope.clone()));
            Ok(())
        }

        async fn subscribe(&self, _topic: &str) -> AppResult<broadcast::Receiver<Envelope>> {
            let (_tx, rx) = broadcast::channel(8);
            Ok(rx)
        }

        async fn unsubscribe(&self, _topic: &str) -> AppResult<()> {
            Ok(())
        }
    }

    fn test_view() -> NotificationView {
        use super::super::notification::{ActorView, RefView};
        use loopline_db::entities::notification::NotificationType;
        use loopline_db::entities::EntityKind;

        NotificationView {
            id: "n1".to_string(),
            actor: ActorView {
                id: "u2".to_string(),
                display_name: "bob".to_string(),
            },
            verb: "liked your post".to_string(),
            notification_type: NotificationType::Like,
            action_object: RefView {
                kind: EntityKind::Like,
                id: "l1".to_string(),
                display_text: None,
            },
            target: Some(RefView {
                kind: EntityKind::Post,
                id: "p1".to_string(),
                display_text: Some("hello".to_string()),
            }),
            timestamp: chrono::Utc::now().into(),
            is_read: false,
            context_snippet: Some("\"hello\"".to_string()),
        }
    }

    #[test]
    fn test_user_topic_format() {
        assert_eq!(topics::user("abc123"), "user:abc123");
    }

    #[test]
    fn test_new_post_envelope_shape() {
        let envelope = Envelope::new_post("p1");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], "live_post");
        assert_eq!(value["message"]["type"], "new_post");
        assert_eq!(value["message"]["payload"]["id"], "p1");
    }

    #[tokio::test]
    async fn test_publish_notification_envelope_shape() {
        let pubsub = Arc::new(CapturingPubSub::new());
        let dispatcher = RealtimeDispatcher::new(pubsub.clone());

        dispatcher.publish_notification("u1", &test_view()).await;

        let published = pubsub.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "user:u1");

        let value = serde_json::to_value(&published[0].1).unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["message"]["type"], "new_notification");
        assert_eq!(value["message"]["payload"]["id"], "n1");
        assert_eq!(value["message"]["payload"]["actor"]["displayName"], "bob");
    }

    #[tokio::test]
    async fn test_publish_new_post_fans_out_to_followers() {
        let pubsub = Arc::new(CapturingPubSub::new());
        let dispatcher = RealtimeDispatcher::new(pubsub.clone());

        let followers = vec!["u1".to_string(), "u2".to_string()];
        dispatcher.publish_new_post("p1", &followers).await;

        let published = pubsub.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "user:u1");
        assert_eq!(published[1].0, "user:u2");
        assert_eq!(published[0].1, published[1].1);
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let pubsub = Arc::new(CapturingPubSub {
            published: Mutex::new(Vec::new()),
            fail: true,
        });
        let dispatcher = RealtimeDispatcher::new(pubsub);

        // must not panic or propagate
        dispatcher
            .publish_new_post("p1", &["u1".to_string()])
            .await;
    }
}
