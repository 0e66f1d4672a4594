use std::time::Duration;

use anyhow::Result;
use notify_retry_policy::{BackoffPolicy, RetryPolicies};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub database_path: String,
    pub nats_url: String,
    pub interval: Duration,
    pub batch_size: u32,
    pub retry_policies: RetryPolicies,
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self> {
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "notify.sqlite3".into());
        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
        let interval_seconds: u64 = std::env::var("SCHEDULER_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        let batch_size: u32 = std::env::var("SCHEDULER_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        let default_transient = BackoffPolicy::transient();
        let default_rate_limit = BackoffPolicy::rate_limit();
        let retry_policies = RetryPolicies {
            transient: BackoffPolicy {
                base_seconds: env_f64("TRANSIENT_POLICY_BASE_SECONDS", default_transient.base_seconds),
                multiplier: env_f64("TRANSIENT_POLICY_MULTIPLIER", default_transient.multiplier),
                max_seconds: env_f64("TRANSIENT_POLICY_MAX_SECONDS", default_transient.max_seconds),
                max_attempts: env_i64("TRANSIENT_POLICY_MAX_ATTEMPTS", default_transient.max_attempts),
            },
            rate_limit: BackoffPolicy {
                base_seconds: env_f64("RATE_LIMIT_POLICY_BASE_SECONDS", default_rate_limit.base_seconds),
                multiplier: env_f64("RATE_LIMIT_POLICY_MULTIPLIER", default_rate_limit.multiplier),
                max_seconds: env_f64("RATE_LIMIT_POLICY_MAX_SECONDS", default_rate_limit.max_seconds),
                max_attempts: env_i64("RATE_LIMIT_POLICY_MAX_ATTEMPTS", default_rate_limit.max_attempts),
            },
            permanent_to_dlq_immediately: env_bool("PERMANENT_TO_DLQ_IMMEDIATELY", true),
        };

        Ok(Self {
            database_path,
            nats_url,
            interval: Duration::from_secs(interval_seconds),
            batch_size,
            retry_policies,
        })
    }
}
