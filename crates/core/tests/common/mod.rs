#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pagecast::encoder::{ExitReport, exit_channel};
use pagecast::{CaptureSurface, Encoder, EncoderHandle, Framerate, PagecastError, Renderer, RendererSession, Resolution, Result, StreamConfig, Supervisor, SupervisorTimings};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub fn stream_config() -> StreamConfig {
	StreamConfig::new("https://example.com", "rtmp://localhost:1935/live/stream", Resolution::Hd720, Framerate::Fps30)
}

pub fn fast_timings() -> SupervisorTimings {
	SupervisorTimings {
		restart_backoff: Duration::from_millis(50),
		stop_settle: Duration::from_millis(10),
	}
}

/// Renderer that succeeds instantly, optionally failing the first few starts.
#[derive(Default)]
pub struct MockRenderer {
	pub starts: AtomicUsize,
	pub fail_remaining: AtomicUsize,
	pub sessions: Mutex<Vec<CancellationToken>>,
	/// Cancelled once each session's simulated browser is gone.
	pub released: Mutex<Vec<CancellationToken>>,
	/// Highest number of live browsers seen when a start was requested.
	pub max_alive_at_start: AtomicUsize,
	teardown_delay: Duration,
	/// When set, every start blocks until a permit is handed out.
	gate: Option<Arc<Notify>>,
}

impl MockRenderer {
	pub fn failing(times: usize) -> Self {
		let renderer = Self::default();
		renderer.fail_remaining.store(times, Ordering::SeqCst);
		renderer
	}

	/// Browsers take `delay` to die after their session is cancelled.
	pub fn slow_teardown(delay: Duration) -> Self {
		Self {
			teardown_delay: delay,
			..Self::default()
		}
	}

	/// Starts wait on `gate` before reporting the page ready.
	pub fn gated(gate: Arc<Notify>) -> Self {
		Self {
			gate: Some(gate),
			..Self::default()
		}
	}

	pub fn starts(&self) -> usize {
		self.starts.load(Ordering::SeqCst)
	}

	pub fn session_tokens(&self) -> Vec<CancellationToken> {
		self.sessions.lock().clone()
	}

	pub fn alive(&self) -> usize {
		self.released.lock().iter().filter(|released| !released.is_cancelled()).count()
	}
}

#[async_trait]
impl Renderer for MockRenderer {
	async fn start(&self, cancel: CancellationToken, config: &StreamConfig) -> Result<RendererSession> {
		self.starts.fetch_add(1, Ordering::SeqCst);
		self.max_alive_at_start.fetch_max(self.alive(), Ordering::SeqCst);

		let failing = self.fail_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
		if failing {
			return Err(PagecastError::Navigation {
				url: config.page_url.clone(),
				reason: "page not visible".to_string(),
			});
		}

		let released = CancellationToken::new();
		self.released.lock().push(released.clone());
		self.sessions.lock().push(cancel.clone());
		tokio::spawn({
			let cancel = cancel.clone();
			let released = released.clone();
			let delay = self.teardown_delay;
			async move {
				cancel.cancelled().await;
				tokio::time::sleep(delay).await;
				released.cancel();
			}
		});

		if let Some(gate) = &self.gate {
			tokio::select! {
				_ = cancel.cancelled() => return Err(PagecastError::Cancelled),
				_ = gate.notified() => {}
			}
		}

		let surface = CaptureSurface {
			display: ":99".to_string(),
			..CaptureSurface::default()
		};
		Ok(RendererSession::new(surface, None, None, released))
	}
}

#[derive(Debug, Clone, Copy)]
pub enum EncoderBehavior {
	/// Runs until killed.
	Hold,
	/// Dies on its own after the delay unless killed first.
	FailAfter(Duration),
	/// Cannot be spawned.
	Refuse,
}

/// Encoder whose processes are simulated with the exit channel.
pub struct MockEncoder {
	behavior: EncoderBehavior,
	pub handles: Mutex<Vec<EncoderHandle>>,
	/// Highest number of unkilled encoders seen at the moment a new one spawned.
	pub max_alive_at_spawn: AtomicUsize,
	pub surfaces: Mutex<Vec<CaptureSurface>>,
	pub spawned_at: Mutex<Vec<Instant>>,
	/// When each `FailAfter` encoder died on its own.
	pub failed_at: Arc<Mutex<Vec<Instant>>>,
}

impl MockEncoder {
	pub fn new(behavior: EncoderBehavior) -> Self {
		Self {
			behavior,
			handles: Mutex::new(Vec::new()),
			max_alive_at_spawn: AtomicUsize::new(0),
			surfaces: Mutex::new(Vec::new()),
			spawned_at: Mutex::new(Vec::new()),
			failed_at: Arc::new(Mutex::new(Vec::new())),
		}
	}

	pub fn starts(&self) -> usize {
		self.handles.lock().len()
	}

	pub fn alive(&self) -> usize {
		self.handles.lock().iter().filter(|handle| !handle.is_killed() && !handle.has_exited()).count()
	}
}

#[async_trait]
impl Encoder for MockEncoder {
	async fn start(&self, cancel: CancellationToken, _config: &StreamConfig, surface: &CaptureSurface) -> Result<EncoderHandle> {
		if let EncoderBehavior::Refuse = self.behavior {
			return Err(PagecastError::Spawn {
				program: "ffmpeg".to_string(),
				source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
			});
		}

		let alive = self.alive();
		self.max_alive_at_spawn.fetch_max(alive, Ordering::SeqCst);

		let (handle, reporter) = exit_channel(None, &cancel);
		let behavior = self.behavior;
		let failed_at = Arc::clone(&self.failed_at);
		tokio::spawn(async move {
			let report = match behavior {
				EncoderBehavior::FailAfter(delay) => tokio::select! {
					_ = reporter.kill_requested() => ExitReport::Killed,
					_ = tokio::time::sleep(delay) => {
						failed_at.lock().push(Instant::now());
						ExitReport::Failed("rtmp connection reset".to_string())
					}
				},
				_ => {
					reporter.kill_requested().await;
					ExitReport::Killed
				}
			};
			reporter.report(report);
		});

		self.spawned_at.lock().push(Instant::now());
		self.handles.lock().push(handle.clone());
		self.surfaces.lock().push(surface.clone());
		Ok(handle)
	}
}

pub struct Harness {
	pub renderer: Arc<MockRenderer>,
	pub encoder: Arc<MockEncoder>,
	pub supervisor: Arc<Supervisor>,
}

pub fn harness(renderer: MockRenderer, behavior: EncoderBehavior) -> Harness {
	let renderer = Arc::new(renderer);
	let encoder = Arc::new(MockEncoder::new(behavior));
	let supervisor = Arc::new(Supervisor::new(stream_config(), renderer.clone(), encoder.clone()).with_timings(fast_timings()));
	Harness { renderer, encoder, supervisor }
}

/// Polls `condition` until it holds, panicking after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
	while !condition() {
		assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
}
