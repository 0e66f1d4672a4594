use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Channel;

/// The self-describing JSON record published to the bus. Carries the full
/// message content plus the identifiers a worker needs for tenant
/// verification and idempotency without a round trip to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message_id: String,
    pub site_id: String,
    pub channel: Channel,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub is_html: bool,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub document_url: Option<String>,
    pub file_name: Option<String>,
    pub caption: Option<String>,
    pub whatsapp_session_name: Option<String>,
}

/// Failure classification. Controls whether the Retry & Scheduler Loop
/// retries, backs off, or routes directly to the DLQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Permanent,
    RateLimit,
    Transient,
}

/// The outcome of a provider send attempt, already classified. Built by the
/// channel-agnostic send interface described for C4; never carries the raw
/// response body past the worker boundary (callers redact before storing).
#[derive(Debug, Clone)]
pub struct ClassifiedFailure {
    pub classification: Classification,
    pub error_message: String,
    pub http_status: Option<u16>,
}

/// Each DLQ record is the original payload plus terminal failure context,
/// matching the dead-letter shape used for replay/inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqRecord {
    pub envelope: MessageEnvelope,
    pub terminal_error: String,
    pub classification: Classification,
    pub retry_count_at_terminus: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}
