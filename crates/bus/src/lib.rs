//! The Bus Abstraction (C2): at-least-once publish/consume with per-channel
//! topics and per-channel DLQs, partitioned by `site_id`. Backed by NATS
//! JetStream; an in-memory double is provided for tests that don't need a
//! real broker.

mod consumer;

use async_trait::async_trait;
use notify_domain::MessageEnvelope;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use consumer::{ChannelConsumer, ConsumedMessage};

#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error(transparent)]
    Publish(#[from] anyhow::Error),
}

/// Publish-side contract. Returns success only once the bus has durably
/// accepted the record; publishers must not assume ordering across
/// different `site_id` partitions.
#[async_trait]
pub trait BusClient: Send + Sync {
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<(), BusError>;

    async fn publish_envelope(&self, subject: &str, envelope: &MessageEnvelope) -> Result<(), BusError> {
        self.publish_value(subject, to_value(envelope)?).await
    }
}

pub fn to_value<T: serde::Serialize>(payload: &T) -> Result<Value, BusError> {
    serde_json::to_value(payload).map_err(|e| BusError::Publish(anyhow::Error::new(e)))
}

/// NATS JetStream-backed bus client. Partitioning by `site_id` is the
/// caller's responsibility (the subject itself only identifies the
/// channel/DLQ topic; JetStream preserves publish order per subject).
pub struct NatsBus {
    client: async_nats::Client,
    jetstream: async_nats::jetstream::Context,
}

impl NatsBus {
    pub async fn connect(nats_url: &str) -> anyhow::Result<Self> {
        let client = async_nats::connect(nats_url).await?;
        let jetstream = async_nats::jetstream::new(client.clone());
        Ok(Self { client, jetstream })
    }

    pub fn client(&self) -> async_nats::Client {
        self.client.clone()
    }

    pub fn jetstream(&self) -> async_nats::jetstream::Context {
        self.jetstream.clone()
    }
}

#[async_trait]
impl BusClient for NatsBus {
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<(), BusError> {
        let bytes = serde_json::to_vec(&payload).map_err(|e| BusError::Publish(anyhow::Error::new(e)))?;
        self.client
            .publish(subject.to_string(), bytes.into())
            .await
            .map_err(|err| BusError::Publish(anyhow::Error::new(err)))?;
        self.client
            .flush()
            .await
            .map_err(|err| BusError::Publish(anyhow::Error::new(err)))
    }
}

/// In-process test double: records every publish without a network
/// dependency, for component tests exercising the gateway or retry loop
/// without a live broker.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    published: Arc<Mutex<Vec<(String, Value)>>>,
}

impl InMemoryBus {
    pub async fn take_published(&self) -> Vec<(String, Value)> {
        let mut guard = self.published.lock().await;
        std::mem::take(&mut *guard)
    }
}

#[async_trait]
impl BusClient for InMemoryBus {
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<(), BusError> {
        self.published.lock().await.push((subject.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_domain::Channel;

    fn envelope() -> MessageEnvelope {
        MessageEnvelope {
            message_id: "MSG-1".into(),
            site_id: "SITE-1".into(),
            channel: Channel::Email,
            recipient: "a@b.test".into(),
            subject: Some("hi".into()),
            body: "hello".into(),
            from_email: None,
            from_name: None,
            is_html: false,
            image_url: None,
            video_url: None,
            document_url: None,
            file_name: None,
            caption: None,
            whatsapp_session_name: None,
        }
    }

    #[tokio::test]
    async fn in_memory_bus_records_publishes() {
        let bus = InMemoryBus::default();
        bus.publish_envelope("notifications.email", &envelope())
            .await
            .unwrap();
        let published = bus.take_published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "notifications.email");
        assert!(bus.take_published().await.is_empty());
    }
}
