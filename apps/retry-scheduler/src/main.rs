use std::sync::Arc;

use anyhow::Result;
use notify_bus::{BusClient, NatsBus};
use notify_dlq::DlqPublisher;
use notify_retry_scheduler::{run, SchedulerConfig};
use notify_store::MessageStore;
use notify_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(
        "notify-retry-scheduler",
        env!("CARGO_PKG_VERSION"),
    ))?;

    let config = SchedulerConfig::from_env()?;
    let store = MessageStore::open(&config.database_path)?;
    let bus = NatsBus::connect(&config.nats_url).await?;
    let dlq = DlqPublisher::new(bus.client()).await?;
    let bus: Arc<dyn BusClient> = Arc::new(bus);

    run(config, store, bus, dlq).await
}
