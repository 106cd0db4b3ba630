//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway handler
//! - Wire up middleware (tracing, timeout, environment resolution)
//! - Bind server to listener
//! - Forward requests to the upstream service with the environment attached
//! - Apply rule-set reloads without restarting

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Extension, State},
    http::{header, HeaderMap, Request, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::FlowControlConfig;
use crate::context::environment::HEADER_NAME;
use crate::http::inbound::{environment_middleware, ResolvedEnvironment};
use crate::http::outbound;
use crate::observability::metrics;
use crate::routing::{RuleSet, SharedRuleSet};

/// Largest request body forwarded upstream.
const MAX_FORWARD_BODY: usize = 2 * 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub upstream: Option<reqwest::Url>,
}

/// Gray-routing gateway.
pub struct HttpServer {
    router: Router,
    config: FlowControlConfig,
    rules: Arc<SharedRuleSet>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: FlowControlConfig) -> Self {
        let rules = Arc::new(SharedRuleSet::new(RuleSet::from_config(&config.rules)));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.upstream_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        let upstream = config
            .upstream
            .url
            .as_deref()
            .and_then(|url| reqwest::Url::parse(url).ok());

        let state = AppState { client, upstream };
        let router = Self::build_router(&config, state, rules.clone());

        Self {
            router,
            config,
            rules,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &FlowControlConfig, state: AppState, rules: Arc<SharedRuleSet>) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .layer(middleware::from_fn_with_state(rules, environment_middleware))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires.
    ///
    /// Configurations received on `config_updates` replace the rule set;
    /// listener and upstream changes need a restart.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<FlowControlConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rules = self.rules.load().len(),
            upstream = ?self.config.upstream.url,
            "HTTP server starting"
        );

        let rules = self.rules.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        let reload = tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(new_config) => {
                            rules.replace(RuleSet::from_config(&new_config.rules));
                        }
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
            tracing::debug!("Rule reload task stopped");
        });

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;
        // Serving can fail before any shutdown signal.
        reload.abort();
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &FlowControlConfig {
        &self.config
    }

    /// The live rule set.
    pub fn rules(&self) -> Arc<SharedRuleSet> {
        self.rules.clone()
    }
}

/// Main gateway handler.
/// Forwards upstream when configured, otherwise reports the routing decision.
async fn gateway_handler(
    State(state): State<AppState>,
    Extension(resolved): Extension<ResolvedEnvironment>,
    request: Request<Body>,
) -> Response {
    match &state.upstream {
        Some(upstream) => forward(&state.client, upstream, request).await,
        None => Json(resolved).into_response(),
    }
}

/// Target for a forwarded request.
///
/// Scheme and authority always come from `upstream`; the inbound path is
/// appended to the upstream base path and the inbound query replaces its
/// query. The inbound URI is never resolved as a reference, so a path like
/// `//other-host/x` stays a path.
fn upstream_url(upstream: &reqwest::Url, uri: &Uri) -> reqwest::Url {
    let mut url = upstream.clone();
    let base = upstream.path().trim_end_matches('/');
    url.set_path(&format!("{}{}", base, uri.path()));
    url.set_query(uri.query());
    url
}

async fn forward(client: &reqwest::Client, upstream: &reqwest::Url, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let url = upstream_url(upstream, &parts.uri);

    let body = match axum::body::to_bytes(body, MAX_FORWARD_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response(),
    };

    let mut headers = parts.headers;
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    // The resolved environment replaces whatever the caller sent.
    headers.remove(HEADER_NAME);
    outbound::attach(&mut headers);

    let result = client
        .request(parts.method, url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) => {
            let status = response.status();
            metrics::record_upstream(status.as_u16());

            let mut headers = HeaderMap::new();
            for (name, value) in response.headers() {
                if name != header::CONTENT_LENGTH && name != header::TRANSFER_ENCODING {
                    headers.append(name.clone(), value.clone());
                }
            }

            match response.bytes().await {
                Ok(bytes) => (status, headers, bytes).into_response(),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read upstream response");
                    (StatusCode::BAD_GATEWAY, "Upstream response failed").into_response()
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Upstream error");
            metrics::record_upstream(StatusCode::BAD_GATEWAY.as_u16());
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(upstream: &str, uri: &str) -> String {
        let upstream = reqwest::Url::parse(upstream).unwrap();
        upstream_url(&upstream, &uri.parse::<Uri>().unwrap()).to_string()
    }

    #[test]
    fn test_upstream_url_keeps_configured_authority() {
        assert_eq!(
            target("http://10.0.0.1:3000", "//evil.example:80/secret?a=1"),
            "http://10.0.0.1:3000//evil.example:80/secret?a=1"
        );
    }

    #[test]
    fn test_upstream_url_appends_to_base_path() {
        assert_eq!(target("http://h/base/", "/x?y=1"), "http://h/base/x?y=1");
        assert_eq!(target("http://h/base", "/x"), "http://h/base/x");
        assert_eq!(target("http://h", "/"), "http://h/");
        assert_eq!(target("http://h/?stale=1", "/orders/7"), "http://h/orders/7");
    }
}
