use crate::context::TelemetryLabels;

pub fn record_counter(name: &'static str, value: u64, labels: &TelemetryLabels) {
    let site_id = labels.site_id.clone().unwrap_or_default();
    let channel = labels.channel.clone().unwrap_or_default();
    metrics::counter!(name, "site_id" => site_id, "channel" => channel).increment(value);
}

pub fn record_histogram(name: &'static str, value: f64, labels: &TelemetryLabels) {
    let site_id = labels.site_id.clone().unwrap_or_default();
    let channel = labels.channel.clone().unwrap_or_default();
    metrics::histogram!(name, "site_id" => site_id, "channel" => channel).record(value);
}

pub fn record_gauge(name: &'static str, value: f64, labels: &TelemetryLabels) {
    let site_id = labels.site_id.clone().unwrap_or_default();
    let channel = labels.channel.clone().unwrap_or_default();
    metrics::gauge!(name, "site_id" => site_id, "channel" => channel).set(value);
}
