//! Redis-backed pub/sub for cross-instance real-time delivery.
//!
//! Each instance publishes envelopes to prefixed Redis channels and routes
//! incoming messages into per-topic broadcast channels, so a user connected
//! to instance A still sees events produced on instance B.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::error::Error as RedisError;
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use loopline_common::{AppError, AppResult};
use loopline_core::{Envelope, PubSub};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 256;

type TopicTable = Arc<RwLock<HashMap<String, broadcast::Sender<Envelope>>>>;

/// Redis pub/sub backend.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    subscriber: SubscriberClient,
    /// Channel name prefix, so several deployments can share one Redis.
    prefix: String,
    topics: TopicTable,
}

impl RedisPubSub {
    /// Connect both clients and start the routing loop.
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        let pubsub = Self {
            publisher,
            subscriber,
            prefix: prefix.to_string(),
            topics: Arc::new(RwLock::new(HashMap::new())),
        };
        pubsub.spawn_router();

        info!("Redis pub/sub initialized");

        Ok(pubsub)
    }

    fn channel_name(&self, topic: &str) -> String {
        format!("{}{}", self.prefix, topic)
    }

    /// Route incoming Redis messages into the local broadcast table.
    fn spawn_router(&self) {
        let prefix = self.prefix.clone();
        let topics = Arc::clone(&self.topics);
        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                let channel = message.channel.to_string();
                let Some(topic) = channel.strip_prefix(&prefix) else {
                    continue;
                };

                let Some(payload) = message.value.as_string() else {
                    warn!(topic, "Dropping non-string pub/sub payload");
                    continue;
                };

                match serde_json::from_str::<Envelope>(&payload) {
                    Ok(envelope) => {
                        let sender = match topics.read() {
                            Ok(table) => table.get(topic).cloned(),
                            Err(_) => None,
                        };
                        if let Some(sender) = sender
                            && sender.send(envelope).is_err()
                        {
                            debug!(topic, "No live sessions for pub/sub event");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, topic, "Failed to parse pub/sub message");
                    }
                }
            }
            info!("Pub/sub message stream ended");
        });
    }

    /// Close both Redis connections.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.subscriber.quit().await?;
        self.publisher.quit().await?;
        info!("Redis pub/sub shutdown");
        Ok(())
    }
}

#[async_trait]
impl PubSub for RedisPubSub {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> AppResult<()> {
        let payload = serde_json::to_string(envelope)
            .map_err(|e| AppError::Internal(format!("Envelope serialization failed: {e}")))?;

        let channel = self.channel_name(topic);
        let _: () = self
            .publisher
            .publish(&channel, payload)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        debug!(topic, "Published pub/sub event");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> AppResult<broadcast::Receiver<Envelope>> {
        let channel = self.channel_name(topic);
        self.subscriber
            .subscribe(&channel)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        let mut table = self
            .topics
            .write()
            .map_err(|e| AppError::Internal(format!("Pub/sub lock poisoned: {e}")))?;
        let sender = table
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);

        debug!(topic, "Subscribed to pub/sub topic");
        Ok(sender.subscribe())
    }

    async fn unsubscribe(&self, topic: &str) -> AppResult<()> {
        let prune = {
            let mut table = self
                .topics
                .write()
                .map_err(|e| AppError::Internal(format!("Pub/sub lock poisoned: {e}")))?;
            match table.get(topic) {
                Some(sender) if sender.receiver_count() == 0 => {
                    table.remove(topic);
                    true
                }
                _ => false,
            }
        };

        if prune {
            let channel = self.channel_name(topic);
            self.subscriber
                .unsubscribe(&channel)
                .await
                .map_err(|e| AppError::Redis(e.to_string()))?;
            debug!(topic, "Unsubscribed from pub/sub topic");
        }

        Ok(())
    }
}
