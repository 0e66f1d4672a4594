use anyhow::Result;
use futures::StreamExt;
use notify_bus::bootstrap_consumer;
use notify_domain::{Channel, MessageEnvelope, StatusSource};
use notify_store::MessageStore;
use notify_worker_core::{handle_envelope, ProviderClient};
use tracing::{error, info, warn};

use crate::config::WorkerConfig;

pub async fn run(config: WorkerConfig, store: MessageStore, provider: &dyn ProviderClient) -> Result<()> {
    let client = async_nats::connect(&config.nats_url).await?;
    let js = async_nats::jetstream::new(client);

    let mut consumer = bootstrap_consumer(&js, Channel::Whatsapp, &config.consumer_group).await?;
    info!(
        stream = %consumer.stream_name,
        consumer = %consumer.consumer_name,
        "whatsapp worker listening"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, stopping whatsapp worker");
                break;
            }
            next = consumer.messages.next() => {
                let Some(result) = next else { break };
                match result {
                    Ok(message) => {
                        match process_message(&message.payload, &store, provider).await {
                            Ok(()) => {
                                if let Err(err) = message.ack().await {
                                    warn!(error = %err, "failed to ack whatsapp delivery");
                                }
                            }
                            Err(err) => {
                                // Abandon the ack so JetStream redelivers; this is the
                                // STORE_UNAVAILABLE handling required by §7 — the
                                // in-flight write may not have committed.
                                error!(error = %err, "failed to process whatsapp envelope, leaving unacked for redelivery");
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "missing message from JetStream");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn process_message(
    payload: &[u8],
    store: &MessageStore,
    provider: &dyn ProviderClient,
) -> Result<()> {
    let envelope: MessageEnvelope = serde_json::from_slice(payload)?;
    let outcome = handle_envelope(store, provider, StatusSource::WorkerWhatsapp, &envelope).await?;
    info!(message_id = %envelope.message_id, outcome = ?outcome, "whatsapp envelope processed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequenced::SequencedProvider;
    use async_trait::async_trait;
    use notify_domain::NewMessage;
    use notify_session_sequencer::SessionSequencer;
    use notify_worker_core::{ProviderFailure, ProviderSuccess};
    use std::collections::HashMap;
    use std::time::Duration;

    struct AlwaysSucceeds;

    #[async_trait]
    impl ProviderClient for AlwaysSucceeds {
        async fn send(&self, _envelope: &MessageEnvelope) -> Result<ProviderSuccess, ProviderFailure> {
            Ok(ProviderSuccess::default())
        }
    }

    #[tokio::test]
    async fn process_message_marks_message_delivered_through_sequencer() {
        let store = MessageStore::open_in_memory().unwrap();
        let (site_id, _) = store.register_site("acme".into()).await.unwrap();
        let (message_id, _) = store
            .create_message(NewMessage {
                site_id: site_id.clone(),
                channel: Channel::Whatsapp,
                recipient: "1555".into(),
                subject: None,
                body: "hi".into(),
                from_email: None,
                from_name: None,
                is_html: false,
                image_url: None,
                video_url: None,
                document_url: None,
                file_name: None,
                caption: None,
                metadata: HashMap::new(),
                scheduled_at: None,
                whatsapp_session_name: Some("conv-1".into()),
            })
            .await
            .unwrap();

        let provider = SequencedProvider::new(AlwaysSucceeds, SessionSequencer::new(Duration::from_millis(1)));

        let envelope = MessageEnvelope {
            message_id: message_id.clone(),
            site_id,
            channel: Channel::Whatsapp,
            recipient: "1555".into(),
            subject: None,
            body: "hi".into(),
            from_email: None,
            from_name: None,
            is_html: false,
            image_url: None,
            video_url: None,
            document_url: None,
            file_name: None,
            caption: None,
            whatsapp_session_name: Some("conv-1".into()),
        };
        let payload = serde_json::to_vec(&envelope).unwrap();

        process_message(&payload, &store, &provider).await.unwrap();

        let status = store.get_status(&message_id).await.unwrap();
        assert_eq!(status, Some(notify_domain::MessageStatus::Delivered));
    }
}
