use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pagecast_protocol::{
	EvaluateParams, EvaluateResult, Event, NavigateParams, NavigateResult, PAGE_ENABLE, PAGE_LOAD_EVENT_FIRED, PAGE_NAVIGATE, RUNTIME_EVALUATE, VersionInfo,
};
use pagecast_runtime::{Connection, WebSocketTransport, browser_finder, cdp_probe, process};
use serde_json::json;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use super::{Renderer, RendererSession};
use crate::config::{CaptureSurface, StreamConfig};
use crate::error::{PagecastError, Result};

/// True once the document has parsed and `body` is laid out and visible.
pub const READY_EXPRESSION: &str = "document.readyState !== 'loading' && !!document.body && \
	document.body.getClientRects().length > 0 && getComputedStyle(document.body).visibility !== 'hidden'";

const ENDPOINT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ChromeOptions {
	/// Explicit executable; discovered on `PATH` and well-known locations when unset.
	pub chrome_path: Option<PathBuf>,
	/// Upper bound on launch, navigation and readiness combined.
	pub navigation_timeout: Duration,
	/// Pause after readiness so media elements start before capture begins.
	pub settle_delay: Duration,
	pub surface: CaptureSurface,
}

impl Default for ChromeOptions {
	fn default() -> Self {
		Self {
			chrome_path: None,
			navigation_timeout: Duration::from_secs(30),
			settle_delay: Duration::from_secs(3),
			surface: CaptureSurface::default(),
		}
	}
}

/// Launches a kiosk Chrome on the capture surface and drives it over CDP.
#[derive(Debug, Clone, Default)]
pub struct ChromeRenderer {
	options: ChromeOptions,
}

impl ChromeRenderer {
	pub fn new(options: ChromeOptions) -> Self {
		Self { options }
	}

	pub fn options(&self) -> &ChromeOptions {
		&self.options
	}
}

/// Command line for a non-headless kiosk window sized to the stream.
pub fn chrome_args(config: &StreamConfig, port: u16, user_data_dir: &Path) -> Vec<String> {
	let (width, height) = config.dimensions();
	vec![
		format!("--remote-debugging-port={port}"),
		format!("--user-data-dir={}", user_data_dir.display()),
		"--kiosk".to_string(),
		"--no-sandbox".to_string(),
		"--disable-setuid-sandbox".to_string(),
		"--disable-dev-shm-usage".to_string(),
		"--disable-web-security".to_string(),
		"--allow-running-insecure-content".to_string(),
		"--autoplay-policy=no-user-gesture-required".to_string(),
		"--use-fake-ui-for-media-stream".to_string(),
		"--use-fake-device-for-media-stream".to_string(),
		"--alsa-output-device=pulse".to_string(),
		"--enable-features=VaapiVideoDecoder".to_string(),
		"--disable-blink-features=AutomationControlled".to_string(),
		"--window-position=0,0".to_string(),
		format!("--window-size={width},{height}"),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
		"about:blank".to_string(),
	]
}

#[async_trait]
impl Renderer for ChromeRenderer {
	async fn start(&self, cancel: CancellationToken, config: &StreamConfig) -> Result<RendererSession> {
		let chrome = browser_finder::resolve_chrome(self.options.chrome_path.as_deref()).map_err(|e| PagecastError::BrowserLaunch(e.to_string()))?;
		let port = process::free_port()?;
		let profile = tempfile::Builder::new().prefix("pagecast-chrome-").tempdir()?;

		let mut cmd = Command::new(&chrome);
		cmd.args(chrome_args(config, port, profile.path()))
			.env("DISPLAY", &self.options.surface.display)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(true);

		#[cfg(unix)]
		cmd.process_group(0);

		let mut child = cmd.spawn().map_err(|source| PagecastError::Spawn {
			program: chrome.display().to_string(),
			source,
		})?;
		let pid = child.id();
		info!(target = "pagecast.renderer", pid, port, url = %config.page_url, "chrome launched");

		let connection = tokio::select! {
			_ = cancel.cancelled() => Err(PagecastError::Cancelled),
			outcome = tokio::time::timeout(self.options.navigation_timeout, bring_up(&mut child, port, &config.page_url)) => outcome.unwrap_or_else(|_| {
				Err(PagecastError::Navigation {
					url: config.page_url.clone(),
					reason: format!("page not visible after {:?}", self.options.navigation_timeout),
				})
			}),
		};

		let connection = match connection {
			Ok(connection) => connection,
			Err(err) => {
				teardown(child, pid, profile).await;
				return Err(err);
			}
		};

		tokio::select! {
			_ = cancel.cancelled() => {
				teardown(child, pid, profile).await;
				return Err(PagecastError::Cancelled);
			}
			_ = tokio::time::sleep(self.options.settle_delay) => {}
		}

		info!(target = "pagecast.renderer", pid, url = %config.page_url, "page visible");
		let released = CancellationToken::new();
		tokio::spawn(guard(child, pid, profile, connection, cancel, released.clone().drop_guard()));

		Ok(RendererSession::new(self.options.surface.clone(), pid, Some(port), released))
	}
}

async fn bring_up(child: &mut Child, port: u16, url: &str) -> Result<Arc<Connection>> {
	let version = wait_for_endpoint(child, port).await?;
	debug!(target = "pagecast.renderer", browser = ?version.browser, protocol = ?version.protocol_version, "debugging endpoint ready");

	let target = cdp_probe::first_page_target(port).await?;
	let ws_url = target
		.web_socket_debugger_url
		.ok_or_else(|| PagecastError::BrowserLaunch(format!("page target {} has no websocket url", target.id)))?;

	let connection = Arc::new(Connection::new(WebSocketTransport::connect(&ws_url).await?));
	tokio::spawn({
		let connection = Arc::clone(&connection);
		async move { connection.run().await }
	});

	navigate(&connection, url).await?;
	wait_until_visible(&connection).await?;
	Ok(connection)
}

async fn wait_for_endpoint(child: &mut Child, port: u16) -> Result<VersionInfo> {
	loop {
		if let Some(status) = child.try_wait()? {
			return Err(PagecastError::BrowserLaunch(format!(
				"chrome exited before debugging endpoint became available (status: {status})"
			)));
		}

		match cdp_probe::fetch_version(port).await {
			Ok(version) => return Ok(version),
			Err(e) => debug!(target = "pagecast.renderer", port, error = %e, "debugging endpoint not ready"),
		}

		tokio::time::sleep(ENDPOINT_POLL_INTERVAL).await;
	}
}

/// Enables page events, navigates and waits for the `load` event.
///
/// Load failures map to [`PagecastError::Navigation`].
pub async fn navigate(connection: &Connection, url: &str) -> Result<()> {
	let mut events = connection.subscribe();
	connection.send_command(PAGE_ENABLE, json!({})).await?;

	let params = NavigateParams { url: url.to_string() };
	let result: NavigateResult = connection.call(PAGE_NAVIGATE, &params).await.map_err(|e| match e {
		pagecast_runtime::Error::Protocol { message, .. } => PagecastError::Navigation {
			url: url.to_string(),
			reason: message,
		},
		other => other.into(),
	})?;

	if let Some(reason) = result.failure() {
		return Err(PagecastError::Navigation {
			url: url.to_string(),
			reason: reason.to_string(),
		});
	}

	debug!(target = "pagecast.renderer", %url, frame = %result.frame_id, "navigation committed");
	wait_for_load(&mut events).await?;
	debug!(target = "pagecast.renderer", %url, "page loaded");
	Ok(())
}

async fn wait_for_load(events: &mut broadcast::Receiver<Event>) -> Result<()> {
	loop {
		match events.recv().await {
			Ok(event) if event.method == PAGE_LOAD_EVENT_FIRED => return Ok(()),
			Ok(_) => {}
			Err(broadcast::error::RecvError::Lagged(skipped)) => debug!(target = "pagecast.renderer", skipped, "page events lagged"),
			Err(broadcast::error::RecvError::Closed) => return Err(pagecast_runtime::Error::ChannelClosed.into()),
		}
	}
}

/// Polls the page until [`READY_EXPRESSION`] holds. Unbounded; callers apply a timeout.
pub async fn wait_until_visible(connection: &Connection) -> Result<()> {
	let params = EvaluateParams::by_value(READY_EXPRESSION);
	loop {
		let result: EvaluateResult = connection.call(RUNTIME_EVALUATE, &params).await?;
		if result.as_bool() {
			return Ok(());
		}
		if let Some(details) = &result.exception_details {
			debug!(target = "pagecast.renderer", error = %details.text, "readiness probe threw");
		}
		tokio::time::sleep(READY_POLL_INTERVAL).await;
	}
}

/// Keeps the browser alive until the session is cancelled, then tears it down.
///
/// `released` is dropped only after teardown has finished.
async fn guard(mut child: Child, pid: Option<u32>, profile: TempDir, connection: Arc<Connection>, cancel: CancellationToken, released: DropGuard) {
	tokio::select! {
		_ = cancel.cancelled() => {}
		status = child.wait() => {
			warn!(target = "pagecast.renderer", pid, status = ?status.ok(), "chrome exited while streaming");
			cancel.cancelled().await;
		}
	}
	drop(connection);
	teardown(child, pid, profile).await;
	drop(released);
}

async fn teardown(mut child: Child, pid: Option<u32>, profile: TempDir) {
	if let Some(pid) = pid {
		if let Err(e) = process::kill_process_group(pid) {
			debug!(target = "pagecast.renderer", pid, error = %e, "process group kill failed");
		}
	}
	let _ = child.start_kill();
	let _ = child.wait().await;

	if let Some(pid) = pid {
		if process::pid_is_alive(pid) {
			warn!(target = "pagecast.renderer", pid, "chrome still alive after teardown");
		}
	}

	let profile_path = profile.path().to_path_buf();
	if let Err(e) = profile.close() {
		warn!(target = "pagecast.renderer", path = %profile_path.display(), error = %e, "failed to remove chrome profile");
	}
	debug!(target = "pagecast.renderer", pid, "chrome torn down");
}
