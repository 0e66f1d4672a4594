use anyhow::{Context, Result};
use async_nats::jetstream::{
    consumer::{
        push::{Config as PushConfig, Messages},
        AckPolicy,
    },
    stream::{Config as StreamConfig, RetentionPolicy},
    Context as JetStreamContext,
};
use notify_domain::{Channel, MessageEnvelope};

/// A live push-consumer attached to one channel's work-queue stream, with
/// cooperative rebalancing across worker instances via `deliver_group`.
pub struct ChannelConsumer {
    pub messages: Messages,
    pub stream_name: String,
    pub consumer_name: String,
}

/// One message pulled off the channel's stream, still unacknowledged.
pub struct ConsumedMessage {
    pub envelope: MessageEnvelope,
    pub raw: async_nats::jetstream::Message,
}

/// Ensures the channel's work-queue stream and a durable, cooperatively
/// rebalanced push consumer exist, then attaches to the message stream.
/// `worker_group` identifies the consumer group (all instances of one
/// worker binary share it so JetStream load-balances messages across them).
pub async fn bootstrap_consumer(
    js: &JetStreamContext,
    channel: Channel,
    worker_group: &str,
) -> Result<ChannelConsumer> {
    let subject = channel.bus_subject().to_string();
    let stream_name = format!("notify-{}", subject.replace('.', "-"));
    let stream_cfg = StreamConfig {
        name: stream_name.clone(),
        subjects: vec![subject.clone()],
        retention: RetentionPolicy::WorkQueue,
        max_messages: -1,
        max_messages_per_subject: -1,
        max_bytes: -1,
        ..Default::default()
    };
    let stream = js
        .get_or_create_stream(stream_cfg)
        .await
        .with_context(|| format!("ensure stream {stream_name}"))?;

    let deliver_subject = format!("deliver.{worker_group}");
    let consumer_name = worker_group.to_string();
    let consumer = stream
        .get_or_create_consumer(
            &consumer_name,
            PushConfig {
                durable_name: Some(consumer_name.clone()),
                deliver_subject,
                deliver_group: Some(worker_group.to_string()),
                filter_subject: subject,
                ack_policy: AckPolicy::Explicit,
                max_ack_pending: 128,
                ..Default::default()
            },
        )
        .await
        .with_context(|| format!("ensure consumer {consumer_name}"))?;

    let messages = consumer
        .messages()
        .await
        .with_context(|| format!("attach consumer stream {consumer_name}"))?;

    Ok(ChannelConsumer {
        messages,
        stream_name,
        consumer_name,
    })
}
