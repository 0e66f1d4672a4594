use async_trait::async_trait;
use notify_domain::MessageEnvelope;

use crate::classify::ProviderFailure;

/// A successful provider dispatch. `provider_message_id` is whatever
/// identifier the provider's own response carries, kept for diagnostics only
/// — the system of record remains `message_id`.
#[derive(Debug, Clone, Default)]
pub struct ProviderSuccess {
    pub provider_message_id: Option<String>,
}

/// Channel-agnostic provider send interface (§4.4 "Provider contract"). Each
/// implementation makes exactly one attempt; retry/backoff decisions belong
/// exclusively to C5, never to the provider client itself.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn send(&self, envelope: &MessageEnvelope) -> Result<ProviderSuccess, ProviderFailure>;
}
