pub mod config;
pub mod http;

use std::sync::Arc;

use notify_bus::NatsBus;
use notify_store::MessageStore;

pub use config::GatewayConfig;
pub use http::{build_router, GatewayState};

pub async fn build_state(config: GatewayConfig) -> anyhow::Result<Arc<GatewayState>> {
    let store = MessageStore::open(&config.database_path)?;
    let bus = NatsBus::connect(&config.nats_url).await?;
    Ok(Arc::new(GatewayState {
        store,
        bus: Arc::new(bus),
        config,
    }))
}
