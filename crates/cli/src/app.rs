//! Wires settings into the supervisor, liveness monitor and HTTP server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use pagecast::liveness::{HelixClient, LivenessMonitor, schedule_or_default};
use pagecast::{ChromeOptions, ChromeRenderer, FfmpegEncoder, FfmpegOptions, Supervisor};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::http::{self, AppState};
use crate::metrics::Metrics;
use crate::settings::Settings;
use crate::signals;

/// How long shutdown waits for each background task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Runs until a termination signal arrives or the HTTP server fails.
///
/// Errors are configuration or HTTP setup failures; pipeline failures are
/// retried by the supervisor and never end the process.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
	settings.validate()?;
	let liveness = settings.liveness()?;
	let config = settings.stream_config();

	let renderer = ChromeRenderer::new(ChromeOptions {
		chrome_path: settings.chrome_path.clone(),
		navigation_timeout: settings.navigation_timeout(),
		surface: settings.surface(),
		..ChromeOptions::default()
	});
	let encoder = FfmpegEncoder::new(FfmpegOptions {
		ffmpeg_path: settings.ffmpeg_path.clone(),
	});
	let supervisor = Arc::new(Supervisor::new(config, Arc::new(renderer), Arc::new(encoder)));
	let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);

	let listener = TcpListener::bind(("0.0.0.0", settings.port))
		.await
		.with_context(|| format!("failed to bind HTTP port {}", settings.port))?;

	let root = CancellationToken::new();
	let state = AppState {
		supervisor: supervisor.clone(),
		metrics,
		started: Instant::now(),
	};
	let mut http_task = tokio::spawn(http::serve(listener, state, root.clone()));

	let supervisor_task = tokio::spawn({
		let supervisor = supervisor.clone();
		let ctx = root.clone();
		async move { supervisor.run(ctx).await }
	});

	let monitor_task = match liveness {
		Some(liveness) => {
			let client = HelixClient::new(liveness.credentials)?;
			let schedule = schedule_or_default(&liveness.schedule)?;
			let monitor = LivenessMonitor::new(liveness.channel, Arc::new(client), supervisor.clone(), schedule);
			let ctx = root.clone();
			Some(tokio::spawn(async move { monitor.run(ctx).await }))
		}
		None => {
			info!(target = "pagecast", "no channel configured, liveness monitor disabled");
			None
		}
	};

	let outcome = tokio::select! {
		signal = signals::wait_for_shutdown_signal() => match signal {
			Ok(name) => {
				info!(target = "pagecast", signal = name, "shutting down");
				Ok(())
			}
			Err(e) => Err(anyhow::Error::new(e).context("failed to install signal handlers")),
		},
		served = &mut http_task => match served {
			Ok(Ok(())) => Err(anyhow::anyhow!("HTTP server stopped unexpectedly")),
			Ok(Err(e)) => Err(anyhow::Error::new(e).context("HTTP server failed")),
			Err(e) => Err(anyhow::Error::new(e).context("HTTP server task panicked")),
		},
	};

	root.cancel();
	join("supervisor", supervisor_task).await;
	if let Some(task) = monitor_task {
		join("liveness monitor", task).await;
	}
	if !http_task.is_finished() {
		join("http server", http_task).await;
	}

	info!(target = "pagecast", "shutdown complete");
	outcome
}

async fn join<T>(name: &str, task: JoinHandle<T>) {
	match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
		Ok(Ok(_)) => {}
		Ok(Err(e)) => warn!(target = "pagecast", task = name, error = %e, "task ended abnormally"),
		Err(_) => warn!(target = "pagecast", task = name, "task did not stop in time"),
	}
}
