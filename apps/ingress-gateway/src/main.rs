use anyhow::Result;
use notify_ingress_gateway::{build_router, build_state, GatewayConfig};
use notify_telemetry::{init_telemetry, TelemetryConfig};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(
        "notify-ingress-gateway",
        env!("CARGO_PKG_VERSION"),
    ))?;

    let config = GatewayConfig::from_env()?;
    let state = build_state(config.clone()).await?;
    let router = build_router(state);

    let listener = TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "ingress gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
