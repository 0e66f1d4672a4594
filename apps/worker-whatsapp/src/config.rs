use std::time::Duration;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_path: String,
    pub nats_url: String,
    pub consumer_group: String,
    pub provider_base_url: String,
    pub default_api_key: Option<String>,
    pub request_timeout: Duration,
    pub inter_message_delay: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "notify.sqlite3".into());
        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
        let consumer_group =
            std::env::var("WHATSAPP_WORKER_GROUP").unwrap_or_else(|_| "worker-whatsapp".into());
        let provider_base_url = std::env::var("WASENDER_BASE_URL")
            .unwrap_or_else(|_| "https://www.wasenderapi.com/api".into());
        let default_api_key = std::env::var("WASENDER_API_KEY").ok();
        let timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let inter_message_delay_ms: u64 = std::env::var("WHATSAPP_INTER_MESSAGE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1_000);

        Ok(Self {
            database_path,
            nats_url,
            consumer_group,
            provider_base_url,
            default_api_key,
            request_timeout: Duration::from_secs(timeout_secs),
            inter_message_delay: Duration::from_millis(inter_message_delay_ms),
        })
    }
}
