//! Rule-set reload while the gateway is serving.

use std::time::Duration;

use flow_control::config::loader::parse_config;
use flow_control::config::FlowControlConfig;
use serde_json::Value;

mod common;

async fn decision(addr: std::net::SocketAddr) -> Value {
    common::client()
        .get(format!("http://{}/checkout", addr))
        .header("x-user-group", "beta")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_reload_swaps_rules() {
    let gateway = common::start_gateway(FlowControlConfig::default()).await;

    let before = decision(gateway.addr).await;
    assert_eq!(before["environment"], Value::Null);
    assert_eq!(before["rule"], Value::Null);

    let updated = parse_config(
        r#"
[[rules]]
name = "api-only"
environment = { name = "canary" }
when = { kind = "path_prefix", prefix = "/api" }

[[rules]]
name = "beta-group"
environment = { name = "beta", version = "v3" }
when = { kind = "header", header = "x-user-group", values = ["beta"] }

[[rules]]
name = "catch-all"
environment = { name = "gray" }
when = { kind = "any" }
"#,
    )
    .unwrap();
    gateway.config_updates.send(updated).unwrap();

    let mut after = Value::Null;
    for _ in 0..50 {
        after = decision(gateway.addr).await;
        if after["rule"] != Value::Null {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Both beta-group and catch-all match; the earlier declaration wins.
    assert_eq!(after["rule"], "beta-group");
    assert_eq!(after["environment"]["name"], "beta");
    assert_eq!(after["environment"]["version"], "v3");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_reload_task_stops_on_shutdown() {
    let gateway = common::start_gateway(FlowControlConfig::default()).await;
    assert!(!gateway.config_updates.is_closed());

    gateway.shutdown.trigger();

    // The receiver is dropped once the reload task exits.
    for _ in 0..50 {
        if gateway.config_updates.is_closed() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(gateway.config_updates.is_closed());
    assert!(gateway.config_updates.send(FlowControlConfig::default()).is_err());
}
