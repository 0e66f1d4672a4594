use std::sync::Arc;

use anyhow::Result;
use notify_bus::BusClient;
use notify_dlq::DlqPublisher;
use notify_retry_policy::{decide_with_policies, RetryDecision, RetryPolicies};
use notify_store::MessageStore;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::config::SchedulerConfig;

pub async fn run(
    config: SchedulerConfig,
    store: MessageStore,
    bus: Arc<dyn BusClient>,
    dlq: DlqPublisher,
) -> Result<()> {
    let mut ticker = tokio::time::interval(config.interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, stopping retry & scheduler loop");
                break;
            }
            _ = ticker.tick() => {}
        }

        let scheduler_outcome = scheduler_pass(&store, bus.as_ref(), config.batch_size).await;
        match scheduler_outcome {
            Ok(counts) => info!(
                promoted = counts.promoted,
                rolled_back = counts.rolled_back,
                "scheduler pass complete"
            ),
            Err(err) => warn!(error = %err, "scheduler pass failed"),
        }

        let retry_outcome = retry_pass(
            &store,
            bus.as_ref(),
            &dlq,
            config.batch_size,
            &config.retry_policies,
        )
        .await;
        match retry_outcome {
            Ok(counts) => info!(
                retried = counts.retried,
                dlq_routed = counts.dlq_routed,
                not_yet_due = counts.not_yet_due,
                "retry pass complete"
            ),
            Err(err) => warn!(error = %err, "retry pass failed"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SchedulerPassCounts {
    pub promoted: u32,
    pub rolled_back: u32,
}

/// Promotes `SCHEDULED` rows whose time has come to `PENDING` and publishes
/// them; rolls back to `SCHEDULED` on publish failure so the next cycle
/// retries (§4.5 "Scheduler pass").
pub async fn scheduler_pass(
    store: &MessageStore,
    bus: &dyn BusClient,
    batch_size: u32,
) -> Result<SchedulerPassCounts> {
    let mut counts = SchedulerPassCounts::default();
    let due = store.select_due_scheduled(batch_size).await?;
    for message in due {
        store.transition_scheduled_to_pending(&message.message_id).await?;
        let subject = message.envelope.channel.bus_subject();
        if bus.publish_envelope(subject, &message.envelope).await.is_err() {
            warn!(message_id = %message.message_id, "publish failed after promotion, rolling back to SCHEDULED");
            store.revert_to_scheduled(&message.message_id).await?;
            counts.rolled_back += 1;
        } else {
            counts.promoted += 1;
        }
    }
    Ok(counts)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RetryPassCounts {
    pub retried: u32,
    pub dlq_routed: u32,
    pub not_yet_due: u32,
}

/// Evaluates `FAILED` rows against the backoff policy for their
/// classification and either republishes, routes to the DLQ, or leaves
/// them for a later cycle (§4.5 "Retry pass").
pub async fn retry_pass(
    store: &MessageStore,
    bus: &dyn BusClient,
    dlq: &DlqPublisher,
    batch_size: u32,
    policies: &RetryPolicies,
) -> Result<RetryPassCounts> {
    let mut counts = RetryPassCounts::default();
    let now = OffsetDateTime::now_utc();
    let due_failed = store.select_due_failed(batch_size).await?;

    for message in due_failed {
        match decide_with_policies(
            message.classification,
            message.retry_count,
            message.updated_at,
            now,
            policies,
        ) {
            RetryDecision::NotYetDue => {
                counts.not_yet_due += 1;
            }
            RetryDecision::RouteToDlq => {
                dlq.publish(
                    message.envelope.clone(),
                    "retry budget exhausted or permanent failure".to_string(),
                    message.classification,
                    message.retry_count,
                )
                .await?;
                store.mark_dlq_routed(&message.message_id).await?;
                counts.dlq_routed += 1;
            }
            RetryDecision::RetryNow => {
                store.retry_and_increment(&message.message_id).await?;
                let subject = message.envelope.channel.bus_subject();
                if bus.publish_envelope(subject, &message.envelope).await.is_err() {
                    warn!(message_id = %message.message_id, "republish failed, reverting to FAILED");
                    store.revert_retry_to_failed(&message.message_id).await?;
                } else {
                    counts.retried += 1;
                }
            }
        }
    }
    Ok(counts)
}
