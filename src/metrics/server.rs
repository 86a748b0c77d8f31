// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! HTTP endpoint serving the Prometheus text exposition.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::collector::{GpusCollector, ScrapeError};

/// Collect once and encode the result in the Prometheus text format
pub async fn render(collector: &GpusCollector) -> Result<String, ScrapeError> {
    let families = collector.collect().await?;

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Build the exporter's HTTP routes
pub fn router(collector: Arc<GpusCollector>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(collector)
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Serving metrics on http://{}/metrics", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn metrics_handler(State(collector): State<Arc<GpusCollector>>) -> Response {
    let start = Instant::now();
    match render(&collector).await {
        Ok(body) => {
            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Scrape completed");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
                body,
            )
                .into_response()
        }
        Err(e) => {
            warn!("Scrape failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("scrape failed: {}\n", e)).into_response()
        }
    }
}

async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}
