use anyhow::Result;
use notify_session_sequencer::SessionSequencer;
use notify_store::MessageStore;
use notify_telemetry::{init_telemetry, TelemetryConfig};
use notify_worker_whatsapp::{run, SequencedProvider, WasenderClient, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(
        "notify-worker-whatsapp",
        env!("CARGO_PKG_VERSION"),
    ))?;

    let config = WorkerConfig::from_env()?;
    let store = MessageStore::open(&config.database_path)?;
    let inner = WasenderClient::new(store.clone(), config.clone());
    let provider = SequencedProvider::new(inner, SessionSequencer::new(config.inter_message_delay));

    run(config, store, &provider).await
}
