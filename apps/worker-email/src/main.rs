use anyhow::Result;
use notify_store::MessageStore;
use notify_telemetry::{init_telemetry, TelemetryConfig};
use notify_worker_email::{run, SendgridClient, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(
        "notify-worker-email",
        env!("CARGO_PKG_VERSION"),
    ))?;

    let config = WorkerConfig::from_env()?;
    let store = MessageStore::open(&config.database_path)?;
    let provider = SendgridClient::new(store.clone(), config.clone());

    run(config, store, &provider).await
}
