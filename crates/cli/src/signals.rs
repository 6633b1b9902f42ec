//! Termination signal handling.

/// Completes on SIGINT, SIGTERM or SIGQUIT (Ctrl-C elsewhere).
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
	use tokio::signal::unix::{SignalKind, signal};

	let mut sigint = signal(SignalKind::interrupt())?;
	let mut sigterm = signal(SignalKind::terminate())?;
	let mut sigquit = signal(SignalKind::quit())?;

	let name = tokio::select! {
		_ = sigint.recv() => "SIGINT",
		_ = sigterm.recv() => "SIGTERM",
		_ = sigquit.recv() => "SIGQUIT",
	};
	Ok(name)
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
	tokio::signal::ctrl_c().await?;
	Ok("ctrl-c")
}
