use std::fmt::Write;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::client::DeviceApi;
use crate::collector::DeviceSnapshot;
use crate::metrics;
use crate::registry::DeviceRegistry;

pub struct AppState<C> {
    pub registry: DeviceRegistry<C>,
    pub listen_address: String,
}

#[derive(Serialize)]
pub struct RatesResponse {
    devices: Vec<DeviceSnapshot>,
}

async fn get_metrics<C: DeviceApi + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> impl IntoResponse {
    let outcomes = state.registry.scrape_all().await;
    let up = outcomes.iter().filter(|o| o.up()).count();
    info!(devices = outcomes.len(), up, "Scrape complete");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, metrics::CONTENT_TYPE)],
        metrics::render(&outcomes),
    )
}

async fn health() -> &'static str {
    "OK\n"
}

async fn get_rates<C: DeviceApi + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Json<RatesResponse> {
    Json(RatesResponse {
        devices: state.registry.last_snapshots().await,
    })
}

async fn index<C: DeviceApi + 'static>(State(state): State<Arc<AppState<C>>>) -> Html<String> {
    let devices = state.registry.devices();
    let mut page = String::new();
    let _ = write!(
        page,
        r#"<!DOCTYPE html>
<html>
<head><title>goCoax Prometheus Exporter</title></head>
<body>
<h1>goCoax Prometheus Exporter</h1>
<p>Version: {version}</p>
<h2>Status</h2>
<p><strong>Active collectors:</strong> {count}</p>
<h2>Configured Devices</h2>
<ol>
"#,
        version = env!("CARGO_PKG_VERSION"),
        count = devices.len(),
    );
    for (name, address) in &devices {
        let _ = writeln!(page, "<li>{} ({})</li>", html_escape(name), html_escape(address));
    }
    let _ = write!(
        page,
        r#"</ol>
<h2>Endpoints</h2>
<ul>
<li><a href="/metrics">/metrics</a> - Prometheus metrics</li>
<li><a href="/api/rates">/api/rates</a> - Last decoded PHY rates (JSON)</li>
<li><a href="/health">/health</a> - Health check</li>
</ul>
<h2>Prometheus Configuration</h2>
<pre>
scrape_configs:
  - job_name: 'gocoax'
    static_configs:
      - targets: ['{target}']
</pre>
</body>
</html>
"#,
        target = html_escape(&state.listen_address),
    );
    Html(page)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn router<C: DeviceApi + 'static>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/", get(index::<C>))
        .route("/metrics", get(get_metrics::<C>))
        .route("/health", get(health))
        .route("/api/rates", get(get_rates::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM, then drain in-flight requests.
pub async fn run_server<C: DeviceApi + 'static>(
    state: Arc<AppState<C>>,
    bind: &str,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "Metrics available at /metrics");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, stopping...");
}
