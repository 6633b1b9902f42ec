//! Stream Supervisor: owns the one live pipeline and every transition of it.
//!
//! # State machine
//!
//! ```text
//!   Idle ──start──▶ Starting ──ok──▶ Running ──stop/restart/exit──▶ Stopping ──▶ Idle
//!                      │
//!                      └──error──▶ Idle
//! ```
//!
//! [`Supervisor::restart`] only tears the pipeline down. Recreating it is the
//! job of [`Supervisor::run`], so an external trigger and the loop can never
//! both start a pipeline.
//!
//! A new renderer is never launched while the previous browser or encoder is
//! still alive: every start first waits for the retired pipeline to exit.
//!
//! Locking: pipeline state sits behind a synchronous mutex that is never held
//! across an await. Starts are additionally serialized by an async gate since
//! they await the renderer and encoder.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::StreamConfig;
use crate::encoder::{Encoder, EncoderHandle};
use crate::error::{PagecastError, Result};
use crate::renderer::{Renderer, RendererSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Starting,
	Running,
	/// Torn down, but the killed encoder has not exited yet.
	Stopping,
}

impl Phase {
	pub fn as_str(self) -> &'static str {
		match self {
			Phase::Idle => "idle",
			Phase::Starting => "starting",
			Phase::Running => "running",
			Phase::Stopping => "stopping",
		}
	}
}

#[derive(Debug, Clone, Copy)]
pub struct SupervisorTimings {
	/// Pause before restarting after a failed start or an unexpected exit.
	pub restart_backoff: Duration,
	/// Pause after stopping a running pipeline before starting its replacement,
	/// letting the display and audio devices be released.
	pub stop_settle: Duration,
}

impl Default for SupervisorTimings {
	fn default() -> Self {
		Self {
			restart_backoff: Duration::from_secs(5),
			stop_settle: Duration::from_secs(2),
		}
	}
}

/// Lifetime counters, as exported on `/metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
	pub starts: u64,
	pub start_failures: u64,
	pub stops: u64,
	pub restart_requests: u64,
	pub unexpected_exits: u64,
}

#[derive(Default)]
struct Counters {
	starts: AtomicU64,
	start_failures: AtomicU64,
	stops: AtomicU64,
	restart_requests: AtomicU64,
	unexpected_exits: AtomicU64,
}

/// Handles of a running pipeline. Present together or not at all.
struct ActivePipeline {
	generation: u64,
	cancel: CancellationToken,
	renderer_cancel: CancellationToken,
	renderer: RendererSession,
	encoder: EncoderHandle,
}

impl ActivePipeline {
	fn teardown(&self) {
		self.encoder.kill();
		self.renderer_cancel.cancel();
		self.cancel.cancel();
	}

	fn retired(&self) -> RetiredPipeline {
		RetiredPipeline {
			renderer: self.renderer.clone(),
			encoder: self.encoder.clone(),
		}
	}
}

/// A torn-down pipeline whose processes may still be exiting.
#[derive(Clone)]
struct RetiredPipeline {
	renderer: RendererSession,
	encoder: EncoderHandle,
}

impl RetiredPipeline {
	fn is_gone(&self) -> bool {
		self.encoder.has_exited() && self.renderer.is_released()
	}

	async fn gone(&self) {
		let _ = self.encoder.wait().await;
		self.renderer.released().await;
	}
}

struct PipelineState {
	phase: Phase,
	active: Option<ActivePipeline>,
	/// Last stopped pipeline, kept until its processes have exited.
	retiring: Option<RetiredPipeline>,
	next_generation: u64,
}

pub struct Supervisor {
	config: StreamConfig,
	renderer: Arc<dyn Renderer>,
	encoder: Arc<dyn Encoder>,
	timings: SupervisorTimings,
	state: Mutex<PipelineState>,
	start_gate: tokio::sync::Mutex<()>,
	counters: Counters,
}

impl Supervisor {
	pub fn new(config: StreamConfig, renderer: Arc<dyn Renderer>, encoder: Arc<dyn Encoder>) -> Self {
		Self {
			config,
			renderer,
			encoder,
			timings: SupervisorTimings::default(),
			state: Mutex::new(PipelineState {
				phase: Phase::Idle,
				active: None,
				retiring: None,
				next_generation: 1,
			}),
			start_gate: tokio::sync::Mutex::new(()),
			counters: Counters::default(),
		}
	}

	pub fn with_timings(mut self, timings: SupervisorTimings) -> Self {
		self.timings = timings;
		self
	}

	pub fn config(&self) -> &StreamConfig {
		&self.config
	}

	pub fn is_running(&self) -> bool {
		self.state.lock().active.is_some()
	}

	pub fn phase(&self) -> Phase {
		let state = self.state.lock();
		match state.phase {
			Phase::Idle if state.retiring.as_ref().is_some_and(|retired| !retired.is_gone()) => Phase::Stopping,
			phase => phase,
		}
	}

	pub fn stats(&self) -> SupervisorStats {
		SupervisorStats {
			starts: self.counters.starts.load(Ordering::Relaxed),
			start_failures: self.counters.start_failures.load(Ordering::Relaxed),
			stops: self.counters.stops.load(Ordering::Relaxed),
			restart_requests: self.counters.restart_requests.load(Ordering::Relaxed),
			unexpected_exits: self.counters.unexpected_exits.load(Ordering::Relaxed),
		}
	}

	/// Starts a fresh pipeline, stopping the current one first.
	///
	/// The new pipeline's cancellation tree hangs off `ctx`.
	pub async fn start(&self, ctx: &CancellationToken, config: &StreamConfig) -> Result<EncoderHandle> {
		let _gate = self.start_gate.lock().await;
		self.start_locked(ctx, config).await.map(|(_, encoder)| encoder)
	}

	/// Tears the current pipeline down. Returns whether anything was running.
	///
	/// Never waits for the processes to exit; the kill is issued and state is
	/// cleared before returning.
	pub fn stop(&self) -> bool {
		let mut state = self.state.lock();
		let Some(active) = state.active.take() else {
			return false;
		};

		active.teardown();
		state.phase = Phase::Idle;
		state.retiring = Some(active.retired());
		drop(state);

		self.counters.stops.fetch_add(1, Ordering::Relaxed);
		info!(target = "pagecast.supervisor", generation = active.generation, pid = active.encoder.pid(), "pipeline stopped");
		true
	}

	/// Stops the current pipeline so the run loop brings up a new one.
	pub fn restart(&self) -> bool {
		self.counters.restart_requests.fetch_add(1, Ordering::Relaxed);
		let stopped = self.stop();
		if !stopped {
			debug!(target = "pagecast.supervisor", phase = self.phase().as_str(), "restart requested with no running pipeline");
		}
		stopped
	}

	/// Keeps a pipeline running until `ctx` is cancelled.
	pub async fn run(&self, ctx: CancellationToken) {
		info!(target = "pagecast.supervisor", url = %self.config.page_url, resolution = %self.config.resolution, framerate = %self.config.framerate, "supervisor started");

		loop {
			if ctx.is_cancelled() {
				break;
			}

			let (generation, encoder) = match self.ensure_running(&ctx).await {
				Ok(current) => current,
				Err(PagecastError::Cancelled) => break,
				Err(err) => {
					error!(target = "pagecast.supervisor", error = %err, backoff = ?self.timings.restart_backoff, "pipeline start failed");
					if self.backoff(&ctx).await {
						continue;
					}
					break;
				}
			};

			let exit = tokio::select! {
				biased;
				_ = ctx.cancelled() => break,
				exit = encoder.wait() => exit,
			};
			self.retire(generation);

			match exit {
				Ok(()) => debug!(target = "pagecast.supervisor", generation, "pipeline ended on request"),
				Err(err) => {
					self.counters.unexpected_exits.fetch_add(1, Ordering::Relaxed);
					warn!(target = "pagecast.supervisor", generation, error = %err, backoff = ?self.timings.restart_backoff, "pipeline exited unexpectedly, restarting");
					if !self.backoff(&ctx).await {
						break;
					}
				}
			}
		}

		self.stop();
		let retired = self.state.lock().retiring.clone();
		if let Some(retired) = retired {
			retired.gone().await;
		}
		info!(target = "pagecast.supervisor", "supervisor exited");
	}

	/// Returns the current pipeline, starting one if there is none.
	async fn ensure_running(&self, ctx: &CancellationToken) -> Result<(u64, EncoderHandle)> {
		let _gate = self.start_gate.lock().await;
		if let Some(current) = self.current() {
			return Ok(current);
		}
		self.start_locked(ctx, &self.config).await
	}

	async fn start_locked(&self, ctx: &CancellationToken, config: &StreamConfig) -> Result<(u64, EncoderHandle)> {
		let stopped = self.stop();
		self.await_retired(ctx).await?;
		if stopped {
			debug!(target = "pagecast.supervisor", settle = ?self.timings.stop_settle, "waiting for previous pipeline to release devices");
			tokio::select! {
				_ = ctx.cancelled() => return Err(PagecastError::Cancelled),
				_ = tokio::time::sleep(self.timings.stop_settle) => {}
			}
		}
		if ctx.is_cancelled() {
			return Err(PagecastError::Cancelled);
		}

		self.state.lock().phase = Phase::Starting;
		let cancel = ctx.child_token();
		let renderer_cancel = cancel.child_token();

		let (renderer, encoder) = match self.launch(&cancel, &renderer_cancel, config).await {
			Ok(launched) => launched,
			Err(err) => {
				cancel.cancel();
				self.state.lock().phase = Phase::Idle;
				if !matches!(err, PagecastError::Cancelled) {
					self.counters.start_failures.fetch_add(1, Ordering::Relaxed);
				}
				return Err(err);
			}
		};

		let mut state = self.state.lock();
		if ctx.is_cancelled() {
			encoder.kill();
			cancel.cancel();
			state.phase = Phase::Idle;
			state.retiring = Some(RetiredPipeline { renderer, encoder });
			return Err(PagecastError::Cancelled);
		}
		if let Some(stale) = state.active.take() {
			warn!(target = "pagecast.supervisor", generation = stale.generation, "replacing a pipeline that appeared during start");
			stale.teardown();
			state.retiring = Some(stale.retired());
		}

		let generation = state.next_generation;
		state.next_generation += 1;
		state.active = Some(ActivePipeline {
			generation,
			cancel,
			renderer_cancel,
			renderer,
			encoder: encoder.clone(),
		});
		state.phase = Phase::Running;
		drop(state);

		self.counters.starts.fetch_add(1, Ordering::Relaxed);
		info!(target = "pagecast.supervisor", generation, pid = encoder.pid(), "pipeline running");
		Ok((generation, encoder))
	}

	async fn launch(&self, cancel: &CancellationToken, renderer_cancel: &CancellationToken, config: &StreamConfig) -> Result<(RendererSession, EncoderHandle)> {
		let session = self.renderer.start(renderer_cancel.clone(), config).await?;
		debug!(target = "pagecast.supervisor", pid = session.pid, display = %session.surface.display, "renderer ready");
		match self.encoder.start(cancel.clone(), config, &session.surface).await {
			Ok(encoder) => Ok((session, encoder)),
			Err(err) => {
				renderer_cancel.cancel();
				session.released().await;
				Err(err)
			}
		}
	}

	fn current(&self) -> Option<(u64, EncoderHandle)> {
		self.state.lock().active.as_ref().map(|active| (active.generation, active.encoder.clone()))
	}

	/// Clears the pipeline after its encoder exited, unless it was already replaced.
	fn retire(&self, generation: u64) {
		let mut state = self.state.lock();
		if state.active.as_ref().is_some_and(|active| active.generation == generation) {
			if let Some(active) = state.active.take() {
				active.teardown();
				state.retiring = Some(active.retired());
			}
			state.phase = Phase::Idle;
		}
	}

	/// Waits for the last stopped pipeline's browser and encoder to exit.
	async fn await_retired(&self, ctx: &CancellationToken) -> Result<()> {
		let retired = self.state.lock().retiring.clone();
		let Some(retired) = retired.filter(|retired| !retired.is_gone()) else {
			return Ok(());
		};

		debug!(target = "pagecast.supervisor", "waiting for previous pipeline to exit");
		tokio::select! {
			_ = ctx.cancelled() => Err(PagecastError::Cancelled),
			_ = retired.gone() => Ok(()),
		}
	}

	/// Sleeps for the restart backoff. `false` if `ctx` was cancelled meanwhile.
	async fn backoff(&self, ctx: &CancellationToken) -> bool {
		tokio::select! {
			_ = ctx.cancelled() => false,
			_ = tokio::time::sleep(self.timings.restart_backoff) => true,
		}
	}
}
