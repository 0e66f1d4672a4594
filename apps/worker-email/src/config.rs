use std::time::Duration;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_path: String,
    pub nats_url: String,
    pub consumer_group: String,
    pub provider_base_url: String,
    pub default_api_key: Option<String>,
    pub default_from_email: String,
    pub default_from_name: String,
    pub request_timeout: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "notify.sqlite3".into());
        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
        let consumer_group =
            std::env::var("EMAIL_WORKER_GROUP").unwrap_or_else(|_| "worker-email".into());
        let provider_base_url = std::env::var("SENDGRID_BASE_URL")
            .unwrap_or_else(|_| "https://api.sendgrid.com/v3".into());
        let default_api_key = std::env::var("SENDGRID_API_KEY").ok();
        let default_from_email =
            std::env::var("SENDGRID_FROM_EMAIL").unwrap_or_else(|_| "noreply@notify.test".into());
        let default_from_name =
            std::env::var("SENDGRID_FROM_NAME").unwrap_or_else(|_| "Notify Platform".into());
        let timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            database_path,
            nats_url,
            consumer_group,
            provider_base_url,
            default_api_key,
            default_from_email,
            default_from_name,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
