use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Email,
    Whatsapp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "EMAIL",
            Channel::Whatsapp => "WHATSAPP",
        }
    }

    pub fn bus_subject(&self) -> &'static str {
        match self {
            Channel::Email => "notifications.email",
            Channel::Whatsapp => "notifications.whatsapp",
        }
    }

    pub fn dlq_subject(&self) -> &'static str {
        match self {
            Channel::Email => "notifications.email.dlq",
            Channel::Whatsapp => "notifications.whatsapp.dlq",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    Pending,
    Scheduled,
    Sent,
    Delivered,
    Failed,
    Bounced,
    Rejected,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Delivered
                | MessageStatus::Bounced
                | MessageStatus::Rejected
                | MessageStatus::Failed
        )
    }
}

/// Who performed a status mutation; carried in `message_status_history.source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusSource {
    Api,
    WorkerEmail,
    WorkerWhatsapp,
    Retry,
    Scheduler,
}

/// Everything the Ingestion Gateway needs to create a `MessageLog` row.
/// One struct serves both the single-send and bulk-send item paths.
#[derive(Debug, Clone)]
pub struct NewMessage {
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
    pub metadata: HashMap<String, String>,
    pub scheduled_at: Option<OffsetDateTime>,
    pub whatsapp_session_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLog {
    pub message_id: String,
    pub site_id: String,
    pub channel: Channel,
    pub status: MessageStatus,
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
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub failure_type: Option<Classification>,
    pub metadata: HashMap<String, String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub scheduled_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sent_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub delivered_at: Option<OffsetDateTime>,
    pub whatsapp_session_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusHistoryEntry {
    pub message_id: String,
    pub old_status: Option<MessageStatus>,
    pub new_status: MessageStatus,
    pub source: StatusSource,
    pub changed_at: OffsetDateTime,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageFilters {
    pub status: Option<MessageStatus>,
    pub channel: Option<Channel>,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
    pub page: u32,
    pub page_size: u32,
}

pub use crate::envelope::Classification;
