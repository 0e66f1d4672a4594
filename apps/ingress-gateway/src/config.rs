use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    pub database_path: String,
    pub nats_url: String,
    pub max_bulk_items: usize,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
        let addr = SocketAddr::from_str(&bind_addr).context("invalid BIND_ADDR")?;
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "notify.sqlite3".into());
        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
        let max_bulk_items = std::env::var("MAX_BULK_ITEMS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        Ok(Self {
            addr,
            database_path,
            nats_url,
            max_bulk_items,
        })
    }
}
