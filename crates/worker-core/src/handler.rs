use notify_domain::{DomainResult, MessageEnvelope, MessageStatus, StatusSource};
use notify_store::MessageStore;
use notify_telemetry::{record_counter, TelemetryLabels};
use tracing::{info, warn};

use crate::classify::{bounded_redacted_message, classify};
use crate::provider::ProviderClient;

/// What happened to one envelope handed to a channel worker. Callers use
/// this only for logging/metrics; the bus ack always happens regardless of
/// which of these is returned (the worker never republishes itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Delivered,
    SkippedAlreadyDelivered,
    TenantMismatch,
    Failed,
}

/// Shared C4 skeleton: tenant verification, idempotency check, a single
/// provider dispatch attempt, classification, and the terminal status
/// update. Identical for every channel; only the `ProviderClient` and
/// `StatusSource` differ between the email and WhatsApp workers.
pub async fn handle_envelope(
    store: &MessageStore,
    provider: &dyn ProviderClient,
    source: StatusSource,
    envelope: &MessageEnvelope,
) -> DomainResult<HandleOutcome> {
    let labels = TelemetryLabels::site(envelope.site_id.clone())
        .with_channel(envelope.channel.as_str())
        .with_message_id(envelope.message_id.clone());

    let Some(stored_site_id) = store.get_site_id(&envelope.message_id).await? else {
        warn!(message_id = %envelope.message_id, "worker received envelope for unknown message");
        return Ok(HandleOutcome::Failed);
    };
    if stored_site_id != envelope.site_id {
        warn!(
            message_id = %envelope.message_id,
            payload_site_id = %envelope.site_id,
            stored_site_id = %stored_site_id,
            "tenant isolation violation"
        );
        store
            .update_status(
                &envelope.message_id,
                MessageStatus::Failed,
                Some("tenant isolation violation".to_string()),
                source,
                None,
            )
            .await?;
        record_counter("worker_tenant_isolation_violation", 1, &labels);
        return Ok(HandleOutcome::TenantMismatch);
    }

    if store.get_status(&envelope.message_id).await? == Some(MessageStatus::Delivered) {
        info!(message_id = %envelope.message_id, "skipping already-delivered message");
        return Ok(HandleOutcome::SkippedAlreadyDelivered);
    }

    match provider.send(envelope).await {
        Ok(_success) => {
            store
                .update_status(&envelope.message_id, MessageStatus::Delivered, None, source, None)
                .await?;
            record_counter("worker_delivered_total", 1, &labels);
            Ok(HandleOutcome::Delivered)
        }
        Err(failure) => {
            let classification = classify(&failure);
            let error_message = bounded_redacted_message(&failure, "provider send failed");
            store
                .update_status(
                    &envelope.message_id,
                    MessageStatus::Failed,
                    Some(error_message),
                    source,
                    Some(classification),
                )
                .await?;
            record_counter("worker_failed_total", 1, &labels);
            Ok(HandleOutcome::Failed)
        }
    }
}
