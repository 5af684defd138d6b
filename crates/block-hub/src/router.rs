//! HTTP surface: WebSocket upgrades per channel plus health and metrics.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /block` | Full records |
//! | `GET /logs/:app_id` | Log lines of one application |
//! | `GET /filter` | The filter gate |
//! | `GET /health` | Gate state and subscriber counts |
//! | `GET /metrics` | Prometheus exposition |
//!
//! Routes for disabled channels are not mounted and answer `404`.

use crate::domain::config::ChannelsConfig;
use crate::domain::connection::{ChannelKey, ChannelKind};
use crate::gate::{FilterGate, GateState};
use crate::registry::ConnectionRegistry;
use crate::ws::{run_filter_session, run_subscriber_session};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub gate: Arc<FilterGate>,
    pub channels: ChannelsConfig,
    /// Cancelled when the hub closes; ends every session.
    pub shutdown: CancellationToken,
}

/// Build the router for the enabled channels.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics));

    if state.channels.block {
        router = router.route("/block", get(block_upgrade));
    }
    if state.channels.logs {
        router = router.route("/logs/:app_id", get(logs_upgrade));
    }
    if state.channels.filter {
        router = router.route("/filter", get(filter_upgrade));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn block_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    subscribe(state, ws, ChannelKey::Block)
}

async fn logs_upgrade(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    match app_id.parse::<u64>() {
        Ok(app_id) => subscribe(state, ws, ChannelKey::Logs(app_id)),
        Err(_) => {
            debug!(app_id = %app_id, "Rejecting log subscription with invalid application id");
            (
                StatusCode::BAD_REQUEST,
                format!("invalid application id: {app_id}"),
            )
                .into_response()
        }
    }
}

fn subscribe(state: AppState, ws: WebSocketUpgrade, key: ChannelKey) -> Response {
    ws.on_upgrade(move |socket| {
        run_subscriber_session(socket, key, state.registry, state.shutdown)
    })
}

async fn filter_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.gate.is_attached() {
        return (StatusCode::CONFLICT, "a filter is already attached").into_response();
    }
    ws.on_upgrade(move |socket| run_filter_session(socket, state.gate, state.shutdown))
}

/// Health report.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub gate: Option<GateState>,
    pub subscribers: SubscriberCounts,
}

#[derive(Debug, Default, Serialize)]
pub struct SubscriberCounts {
    pub block: usize,
    pub logs: usize,
    /// Applications with at least one log subscriber.
    pub log_applications: usize,
}

impl HealthReport {
    pub fn collect(state: &AppState) -> Self {
        let mut subscribers = SubscriberCounts::default();
        for key in state.registry.keys() {
            let n = state.registry.len(&key);
            match key.kind() {
                ChannelKind::Block => subscribers.block += n,
                ChannelKind::Logs => {
                    subscribers.logs += n;
                    subscribers.log_applications += 1;
                }
                ChannelKind::Filter => {}
            }
        }

        Self {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            gate: state.channels.filter.then(|| state.gate.state()),
            subscribers,
        }
    }
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthReport::collect(&state))
}

async fn metrics() -> Response {
    match hub_telemetry::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
