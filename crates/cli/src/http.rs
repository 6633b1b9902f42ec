//! `/health` and `/metrics`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pagecast::Supervisor;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::metrics::{self, Metrics};

#[derive(Clone)]
pub struct AppState {
	pub supervisor: Arc<Supervisor>,
	pub metrics: Arc<Metrics>,
	pub started: Instant,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	/// Seconds since the process started.
	pub uptime: f64,
	pub message: &'static str,
	pub date: String,
	pub streaming: bool,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/metrics", get(metrics_text))
		.with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse {
		uptime: state.started.elapsed().as_secs_f64(),
		message: "OK",
		date: chrono::Utc::now().to_rfc3339(),
		streaming: state.supervisor.is_running(),
	})
}

async fn metrics_text(State(state): State<AppState>) -> Response {
	match state.metrics.render(state.supervisor.is_running(), state.supervisor.stats()) {
		Ok(body) => ([(header::CONTENT_TYPE, metrics::CONTENT_TYPE)], body).into_response(),
		Err(e) => {
			error!(target = "pagecast.http", error = %e, "failed to encode metrics");
			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		}
	}
}

/// Serves until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
	if let Ok(addr) = listener.local_addr() {
		info!(target = "pagecast.http", %addr, "http server listening");
	}
	axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown.cancelled_owned())
		.await
}
