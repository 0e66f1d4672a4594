use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::message::Channel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub site_id: String,
    pub site_name: String,
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub whatsapp_session_name: Option<String>,
    #[serde(skip_serializing)]
    pub wasender_api_key_encrypted: Option<String>,
    #[serde(skip_serializing)]
    pub sendgrid_api_key_encrypted: Option<String>,
    pub sendgrid_from_email: Option<String>,
    pub sendgrid_from_name: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteMetricsDaily {
    pub site_id: String,
    pub channel: Channel,
    pub date: Date,
    pub total_sent: i64,
    pub total_delivered: i64,
    pub total_failed: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteStats {
    pub total_pending: i64,
    pub total_scheduled: i64,
    pub total_sent: i64,
    pub total_delivered: i64,
    pub total_failed: i64,
    pub total_bounced: i64,
    pub total_rejected: i64,
    pub success_rate: f64,
    pub average_per_day: f64,
}
