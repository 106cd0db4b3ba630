//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{HeaderMap, Uri},
    Router,
};
use flow_control::config::FlowControlConfig;
use flow_control::context::environment::{decode_header, HEADER_NAME};
use flow_control::{HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Start an upstream that answers with the environment it received,
/// rendered as `name@version`, `name`, or `none`.
pub async fn start_echo_upstream() -> SocketAddr {
    let app = Router::new().fallback(|headers: HeaderMap| async move {
        match decode_header(headers.get(HEADER_NAME)) {
            Some(env) => env.to_string(),
            None => "none".to_string(),
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start an upstream that answers with `label` and the path and query it
/// was asked for.
pub async fn start_labelled_upstream(label: &'static str) -> SocketAddr {
    let app = Router::new().fallback(move |uri: Uri| async move {
        let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{} {}", label, target)
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A gateway running in the background.
pub struct Gateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    #[allow(dead_code)]
    pub config_updates: mpsc::UnboundedSender<FlowControlConfig>,
}

/// Start a gateway on an ephemeral port.
pub async fn start_gateway(config: FlowControlConfig) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    Gateway {
        addr,
        shutdown,
        config_updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
