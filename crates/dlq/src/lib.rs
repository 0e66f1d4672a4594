//! Dead-letter publishing and replay for terminally failed messages.
//! One JetStream stream (`DLQ`) holds both channel DLQ subjects;
//! `notifications.{channel}.dlq` is the per-channel subject a terminal
//! message is routed to.

use anyhow::{Context, Result};
use async_nats::{
    jetstream::{
        consumer::{pull::Config as PullConfig, AckPolicy, DeliverPolicy},
        stream::{Config as StreamConfig, RetentionPolicy},
        Context as JsContext,
    },
    Client,
};
use futures::TryStreamExt;
use nanoid::nanoid;
use notify_domain::{Classification, DlqRecord, MessageEnvelope};
use notify_telemetry::{record_counter, TelemetryLabels};
use tracing::{info, warn};

const DLQ_STREAM_NAME: &str = "NOTIFY_DLQ";

#[derive(Clone)]
pub struct DlqPublisher {
    js: JsContext,
}

impl DlqPublisher {
    pub async fn new(client: Client) -> Result<Self> {
        let js = async_nats::jetstream::new(client);
        ensure_stream(&js).await?;
        Ok(Self { js })
    }

    pub async fn publish(
        &self,
        envelope: MessageEnvelope,
        terminal_error: String,
        classification: Classification,
        retry_count_at_terminus: i64,
    ) -> Result<()> {
        let subject = envelope.channel.dlq_subject().to_string();
        let record = DlqRecord {
            envelope: envelope.clone(),
            terminal_error,
            classification,
            retry_count_at_terminus,
            extra: None,
        };
        let payload = serde_json::to_vec(&record)?;
        self.js
            .publish(subject.clone(), payload.into())
            .await
            .with_context(|| format!("publish DLQ entry to {subject}"))?;

        let labels = TelemetryLabels::site(envelope.site_id.clone())
            .with_channel(envelope.channel.as_str())
            .with_message_id(envelope.message_id.clone());
        record_counter("dlq_published", 1, &labels);
        info!(
            site_id = %record.envelope.site_id,
            message_id = %record.envelope.message_id,
            classification = ?record.classification,
            "dlq entry published"
        );
        Ok(())
    }
}

async fn ensure_stream(js: &JsContext) -> Result<()> {
    let cfg = StreamConfig {
        name: DLQ_STREAM_NAME.into(),
        subjects: vec!["notifications.*.dlq".into()],
        retention: RetentionPolicy::WorkQueue,
        max_messages_per_subject: -1,
        max_messages: -1,
        max_bytes: -1,
        description: Some("terminal notification failures".into()),
        ..StreamConfig::default()
    };
    match js.get_stream(DLQ_STREAM_NAME).await {
        Ok(_) => Ok(()),
        Err(_) => {
            js.create_stream(cfg).await.context("create DLQ stream")?;
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct DlqEntry {
    pub record: DlqRecord,
    pub sequence: u64,
}

pub async fn list_entries(client: &Client, channel_subject: &str, limit: usize) -> Result<Vec<DlqEntry>> {
    let js = async_nats::jetstream::new(client.clone());
    ensure_stream(&js).await?;
    let stream = js.get_stream(DLQ_STREAM_NAME).await?;
    let durable = format!("dlq-list-{}", nanoid!(6));
    let consumer = stream
        .create_consumer(PullConfig {
            durable_name: Some(durable),
            deliver_policy: DeliverPolicy::All,
            ack_policy: AckPolicy::None,
            filter_subject: channel_subject.to_string(),
            ..Default::default()
        })
        .await?;
    let mut messages = consumer.fetch().max_messages(limit).messages().await?;
    let mut out = Vec::new();
    while let Some(msg) = messages.try_next().await.map_err(|e| anyhow::anyhow!(e))? {
        if let Ok(record) = serde_json::from_slice::<DlqRecord>(&msg.payload) {
            out.push(DlqEntry {
                sequence: msg.info().map(|info| info.stream_sequence).unwrap_or(0),
                record,
            });
        } else {
            warn!("skipping unparseable dlq record");
        }
    }
    Ok(out)
}
