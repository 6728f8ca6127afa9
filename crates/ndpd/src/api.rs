//! HTTP endpoints for Prometheus scraping and neighbor inspection
//!
//! Plain HTTP bound to localhost only.

use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::worker::{InterfaceHandle, InterfaceSnapshot};
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use prometheus::TEXT_FORMAT;
use serde::Serialize;
use std::net::{Ipv6Addr, SocketAddr};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ApiState {
    pub handles: Vec<InterfaceHandle>,
    pub metrics: MetricsCollector,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    interfaces: usize,
    responsive: usize,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/neighbors", get(neighbors_handler))
        .with_state(state)
}

/// Serve the API on [::1]:`port` until the task is dropped
///
/// # NIST Controls
/// - SC-7: Boundary Protection - Listens on loopback only
/// - SI-4: System Monitoring - Exposes metrics and neighbor state
pub async fn serve(port: u16, state: ApiState) -> Result<()> {
    let addr = SocketAddr::from((Ipv6Addr::LOCALHOST, port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Starting API server on http://[::1]:{}", port);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn metrics_handler(State(state): State<ApiState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, [("content-type", TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let mut responsive = 0;
    for handle in &state.handles {
        if handle.snapshot().await.is_ok() {
            responsive += 1;
        }
    }

    let status = if responsive == state.handles.len() {
        "healthy"
    } else {
        "degraded"
    };
    let code = if status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthBody {
            status,
            interfaces: state.handles.len(),
            responsive,
        }),
    )
}

async fn neighbors_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let mut snapshots: Vec<InterfaceSnapshot> = Vec::with_capacity(state.handles.len());
    for handle in &state.handles {
        match handle.snapshot().await {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => warn!(interface = %handle.name(), error = %e, "Interface did not answer"),
        }
    }
    Json(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalConfig;
    use crate::interface::testing::{RecordingTransport, config};
    use crate::notify::LogSink;
    use crate::worker::spawn_interface;
    use axum::body::to_bytes;
    use std::sync::Arc;

    fn state() -> (ApiState, tokio::task::JoinHandle<()>) {
        let metrics = MetricsCollector::new().unwrap();
        let (handle, task) = spawn_interface(
            config(),
            &GlobalConfig::default(),
            Arc::new(RecordingTransport::default()),
            Arc::new(LogSink),
            metrics.clone(),
        );
        (
            ApiState {
                handles: vec![handle],
                metrics,
            },
            task,
        )
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (state, _task) = state();
        state.metrics.solicitations_sent_total.inc();

        let response = metrics_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("ndpd_solicitations_sent_total 1"));
    }

    #[tokio::test]
    async fn test_health_reports_dead_worker() {
        let (state, task) = state();
        let response = health_handler(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        state.handles[0].shutdown().await.unwrap();
        task.await.unwrap();
        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_neighbors_endpoint_lists_interfaces() {
        let (state, _task) = state();
        let response = neighbors_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value[0]["name"], "Ethernet0");
        assert_eq!(value[0]["ifindex"], 5);
        assert!(value[0]["neighbors"].as_array().unwrap().is_empty());
    }
}
