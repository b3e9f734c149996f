//! Prometheus metrics exporter and the counters/histograms this crate emits.
//!
//! Initialized once at bootstrap; every component records through the
//! `metrics` facade macros, so modules never touch the exporter directly.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the global recorder and returns a handle whose `render()` backs
/// `GET /metrics/prometheus`.
pub fn install() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

pub fn record_ingestion_tick(symbol: &str, outcome: &'static str) {
    metrics::counter!("dexter_ingestion_ticks_total", "symbol" => symbol.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_signal_generated(strategy_id: &str, signal_type: &'static str) {
    metrics::counter!("dexter_signals_generated_total", "strategy" => strategy_id.to_string(), "type" => signal_type).increment(1);
}

pub fn record_orchestration_run(status: &'static str) {
    metrics::counter!("dexter_orchestration_runs_total", "status" => status).increment(1);
}

pub fn record_trade_submission(outcome: &'static str) {
    metrics::counter!("dexter_trades_submitted_total", "outcome" => outcome).increment(1);
}

pub fn record_circuit_breaker_trip(name: &str) {
    metrics::counter!("dexter_circuit_breaker_trips_total", "breaker" => name.to_string()).increment(1);
}

pub fn record_edge_alert(strategy_id: &str, code: &'static str) {
    metrics::counter!("dexter_edge_alerts_total", "strategy" => strategy_id.to_string(), "code" => code).increment(1);
}
