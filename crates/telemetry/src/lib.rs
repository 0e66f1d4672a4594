mod config;
mod context;
mod metrics;
mod tracing_init;

pub use config::{TelemetryConfig, TelemetryProtocol};
pub use context::TelemetryLabels;
pub use metrics::{record_counter, record_gauge, record_histogram};
pub use tracing_init::{init_telemetry, telemetry_enabled};
