use std::process::ExitStatus;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{PagecastError, Result};

/// How an encoder process ended.
#[derive(Debug, Clone)]
pub enum ExitReport {
	Exited(ExitStatus),
	/// Terminated in response to a kill or cancellation.
	Killed,
	/// The exit could not be observed.
	Failed(String),
}

/// Clonable kill/wait handle to a running encoder.
///
/// The supervisor keeps one copy to kill on stop while the run loop waits on
/// another.
#[derive(Debug, Clone)]
pub struct EncoderHandle {
	pid: Option<u32>,
	kill: CancellationToken,
	exit_rx: watch::Receiver<Option<ExitReport>>,
}

/// Owned by whatever watches the process; publishes its exit exactly once.
#[derive(Debug)]
pub struct ExitReporter {
	kill: CancellationToken,
	exit_tx: watch::Sender<Option<ExitReport>>,
}

/// Pairs a handle with the reporter for the same process.
///
/// The kill token is a child of `cancel`, so cancelling the pipeline kills the
/// encoder too.
pub fn exit_channel(pid: Option<u32>, cancel: &CancellationToken) -> (EncoderHandle, ExitReporter) {
	let kill = cancel.child_token();
	let (exit_tx, exit_rx) = watch::channel(None);
	(EncoderHandle { pid, kill: kill.clone(), exit_rx }, ExitReporter { kill, exit_tx })
}

impl EncoderHandle {
	pub fn pid(&self) -> Option<u32> {
		self.pid
	}

	/// Requests a forceful kill. Returns immediately.
	pub fn kill(&self) {
		self.kill.cancel();
	}

	pub fn is_killed(&self) -> bool {
		self.kill.is_cancelled()
	}

	pub fn has_exited(&self) -> bool {
		self.exit_rx.borrow().is_some()
	}

	/// Blocks until the process has exited.
	///
	/// `Ok` when the exit was requested (kill or cancellation). Any other exit,
	/// including a clean one, is [`PagecastError::UnexpectedExit`]: the stream is
	/// never supposed to end on its own.
	pub async fn wait(&self) -> Result<()> {
		let mut exit_rx = self.exit_rx.clone();
		let report = exit_rx.wait_for(Option::is_some).await.ok().and_then(|report| report.clone());

		if self.kill.is_cancelled() {
			return Ok(());
		}

		match report {
			Some(ExitReport::Exited(status)) => Err(PagecastError::UnexpectedExit(status.to_string())),
			Some(ExitReport::Failed(reason)) => Err(PagecastError::UnexpectedExit(reason)),
			Some(ExitReport::Killed) => Ok(()),
			None => Err(PagecastError::UnexpectedExit("exit watcher went away".to_string())),
		}
	}
}

impl ExitReporter {
	pub fn kill_token(&self) -> CancellationToken {
		self.kill.clone()
	}

	pub async fn kill_requested(&self) {
		self.kill.cancelled().await
	}

	pub fn report(self, report: ExitReport) {
		self.exit_tx.send_replace(Some(report));
	}
}
