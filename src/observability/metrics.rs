//! Metrics collection and exposition.
//!
//! # Metrics
//! - `flow_control_decisions_total` (counter): rule evaluations by outcome and rule
//! - `flow_control_decode_failures_total` (counter): rejected inbound tokens by reason
//! - `flow_control_rules_loaded` (gauge): valid rules in the published set
//! - `flow_control_rules_rejected` (gauge): rules excluded by validation
//! - `flow_control_upstream_requests_total` (counter): forwarded calls by status

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of evaluating the rule set for one request.
pub fn record_decision(rule: Option<&str>) {
    let (outcome, rule) = match rule {
        Some(rule) => ("gray", rule.to_string()),
        None => ("baseline", String::new()),
    };
    counter!("flow_control_decisions_total", "outcome" => outcome, "rule" => rule).increment(1);
}

pub fn record_decode_failure(reason: &'static str) {
    counter!("flow_control_decode_failures_total", "reason" => reason).increment(1);
}

pub fn record_rules_loaded(valid: usize, rejected: usize) {
    gauge!("flow_control_rules_loaded").set(valid as f64);
    gauge!("flow_control_rules_rejected").set(rejected as f64);
}

pub fn record_upstream(status: u16) {
    counter!("flow_control_upstream_requests_total", "status" => status.to_string()).increment(1);
}
