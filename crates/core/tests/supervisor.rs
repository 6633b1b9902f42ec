mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use common::{EncoderBehavior, MockRenderer, eventually, fast_timings, harness, stream_config};
use pagecast::{PagecastError, Phase};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn idle_before_first_start() {
	let h = harness(MockRenderer::default(), EncoderBehavior::Hold);
	assert!(!h.supervisor.is_running());
	assert_eq!(h.supervisor.phase(), Phase::Idle);
	assert_eq!(h.supervisor.stats().starts, 0);
}

#[tokio::test]
async fn start_then_stop_tears_everything_down() {
	let h = harness(MockRenderer::default(), EncoderBehavior::Hold);
	let ctx = CancellationToken::new();

	let encoder = h.supervisor.start(&ctx, &stream_config()).await.unwrap();
	assert!(h.supervisor.is_running());
	assert_eq!(h.supervisor.phase(), Phase::Running);
	assert_eq!(h.encoder.surfaces.lock()[0].display, ":99");

	assert!(h.supervisor.stop());
	assert!(!h.supervisor.is_running());
	assert!(encoder.is_killed());
	assert!(h.renderer.session_tokens()[0].is_cancelled());
	assert!(!ctx.is_cancelled());

	encoder.wait().await.unwrap();
	eventually("browser released", || h.renderer.alive() == 0).await;
	assert_eq!(h.supervisor.phase(), Phase::Idle);

	assert!(!h.supervisor.stop());
	assert_eq!(h.supervisor.stats().stops, 1);
}

#[tokio::test]
async fn start_while_running_leaves_one_encoder() {
	let h = harness(MockRenderer::default(), EncoderBehavior::Hold);
	let ctx = CancellationToken::new();

	let first = h.supervisor.start(&ctx, &stream_config()).await.unwrap();
	let second = h.supervisor.start(&ctx, &stream_config()).await.unwrap();

	assert!(first.is_killed());
	assert!(!second.is_killed());
	assert_eq!(h.encoder.max_alive_at_spawn.load(Ordering::SeqCst), 0);
	assert_eq!(h.encoder.alive(), 1);
	assert!(h.renderer.session_tokens()[0].is_cancelled());
	assert!(!h.renderer.session_tokens()[1].is_cancelled());

	let stats = h.supervisor.stats();
	assert_eq!((stats.starts, stats.stops), (2, 1));
}

#[tokio::test]
async fn restart_when_idle_is_a_noop() {
	let h = harness(MockRenderer::default(), EncoderBehavior::Hold);

	assert!(!h.supervisor.restart());
	assert!(!h.supervisor.is_running());
	assert_eq!(h.supervisor.stats().restart_requests, 1);
	assert_eq!(h.supervisor.stats().stops, 0);
}

#[tokio::test]
async fn encoder_spawn_failure_cancels_renderer() {
	let h = harness(MockRenderer::default(), EncoderBehavior::Refuse);
	let ctx = CancellationToken::new();

	let err = h.supervisor.start(&ctx, &stream_config()).await.unwrap_err();
	assert!(matches!(err, PagecastError::Spawn { .. }));
	assert!(h.renderer.session_tokens()[0].is_cancelled());
	assert!(!h.supervisor.is_running());
	assert_eq!(h.supervisor.phase(), Phase::Idle);
	assert_eq!(h.supervisor.stats().start_failures, 1);
}

#[tokio::test]
async fn start_after_shutdown_is_refused() {
	let h = harness(MockRenderer::default(), EncoderBehavior::Hold);
	let ctx = CancellationToken::new();
	ctx.cancel();

	let err = h.supervisor.start(&ctx, &stream_config()).await.unwrap_err();
	assert!(matches!(err, PagecastError::Cancelled));
	assert_eq!(h.renderer.starts(), 0);
	assert!(!h.supervisor.is_running());
}

#[tokio::test]
async fn loop_restarts_after_unexpected_exit() {
	let h = harness(MockRenderer::default(), EncoderBehavior::FailAfter(Duration::from_millis(20)));
	let ctx = CancellationToken::new();
	let run = tokio::spawn({
		let supervisor = h.supervisor.clone();
		let ctx = ctx.clone();
		async move { supervisor.run(ctx).await }
	});

	eventually("second encoder start", || h.encoder.starts() >= 2).await;
	assert!(h.supervisor.stats().unexpected_exits >= 1);

	let failed = h.encoder.failed_at.lock()[0];
	let respawned = h.encoder.spawned_at.lock()[1];
	assert!(
		respawned.duration_since(failed) >= fast_timings().restart_backoff,
		"restarted {:?} after the exit",
		respawned.duration_since(failed)
	);

	ctx.cancel();
	tokio::time::timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
}

#[tokio::test]
async fn loop_retries_failed_starts() {
	let h = harness(MockRenderer::failing(2), EncoderBehavior::Hold);
	let ctx = CancellationToken::new();
	let run = tokio::spawn({
		let supervisor = h.supervisor.clone();
		let ctx = ctx.clone();
		async move { supervisor.run(ctx).await }
	});

	eventually("pipeline running", || h.supervisor.is_running()).await;
	assert_eq!(h.renderer.starts(), 3);
	assert_eq!(h.supervisor.stats().start_failures, 2);

	ctx.cancel();
	tokio::time::timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
}

#[tokio::test]
async fn restart_is_recreated_by_the_loop() {
	let h = harness(MockRenderer::default(), EncoderBehavior::Hold);
	let ctx = CancellationToken::new();
	let run = tokio::spawn({
		let supervisor = h.supervisor.clone();
		let ctx = ctx.clone();
		async move { supervisor.run(ctx).await }
	});

	eventually("pipeline running", || h.supervisor.is_running()).await;
	assert!(h.supervisor.restart());

	eventually("replacement pipeline", || h.encoder.starts() == 2 && h.supervisor.is_running()).await;
	assert_eq!(h.encoder.max_alive_at_spawn.load(Ordering::SeqCst), 0);
	let stats = h.supervisor.stats();
	assert_eq!(stats.restart_requests, 1);
	assert_eq!(stats.unexpected_exits, 0);

	ctx.cancel();
	tokio::time::timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
}

#[tokio::test]
async fn root_cancellation_stops_once_and_returns() {
	let h = harness(MockRenderer::default(), EncoderBehavior::Hold);
	let ctx = CancellationToken::new();
	let run = tokio::spawn({
		let supervisor = h.supervisor.clone();
		let ctx = ctx.clone();
		async move { supervisor.run(ctx).await }
	});

	eventually("pipeline running", || h.supervisor.is_running()).await;
	ctx.cancel();
	tokio::time::timeout(Duration::from_secs(1), run).await.unwrap().unwrap();

	assert!(!h.supervisor.is_running());
	assert_eq!(h.supervisor.stats().stops, 1);
	assert_eq!(h.encoder.alive(), 0);
	assert_eq!(h.renderer.alive(), 0);

	// Nothing comes back after the loop is gone.
	tokio::time::sleep(Duration::from_millis(120)).await;
	assert_eq!(h.encoder.starts(), 1);
	assert_eq!(h.renderer.starts(), 1);
}

#[tokio::test]
async fn restart_waits_for_old_browser_to_exit() {
	let h = harness(MockRenderer::slow_teardown(Duration::from_millis(200)), EncoderBehavior::Hold);
	let ctx = CancellationToken::new();
	let run = tokio::spawn({
		let supervisor = h.supervisor.clone();
		let ctx = ctx.clone();
		async move { supervisor.run(ctx).await }
	});

	eventually("pipeline running", || h.supervisor.is_running()).await;
	assert!(h.supervisor.restart());
	assert_eq!(h.supervisor.phase(), Phase::Stopping);

	eventually("replacement pipeline", || h.encoder.starts() == 2 && h.supervisor.is_running()).await;
	assert_eq!(h.renderer.max_alive_at_start.load(Ordering::SeqCst), 0);
	assert_eq!(h.renderer.alive(), 1);
	assert_eq!(h.encoder.alive(), 1);

	ctx.cancel();
	tokio::time::timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
	assert_eq!(h.renderer.alive(), 0);
}

#[tokio::test]
async fn start_while_running_waits_for_old_browser_to_exit() {
	let h = harness(MockRenderer::slow_teardown(Duration::from_millis(200)), EncoderBehavior::Hold);
	let ctx = CancellationToken::new();

	h.supervisor.start(&ctx, &stream_config()).await.unwrap();
	let replaced_at = Instant::now();
	h.supervisor.start(&ctx, &stream_config()).await.unwrap();

	assert!(replaced_at.elapsed() >= Duration::from_millis(200));
	assert_eq!(h.renderer.max_alive_at_start.load(Ordering::SeqCst), 0);
	assert_eq!(h.renderer.alive(), 1);
	assert_eq!(h.supervisor.phase(), Phase::Running);
}

#[tokio::test]
async fn restart_during_start_keeps_a_single_pipeline() {
	let gate = Arc::new(Notify::new());
	let h = harness(MockRenderer::gated(gate.clone()), EncoderBehavior::Hold);
	let ctx = CancellationToken::new();
	let run = tokio::spawn({
		let supervisor = h.supervisor.clone();
		let ctx = ctx.clone();
		async move { supervisor.run(ctx).await }
	});

	eventually("renderer start in flight", || h.renderer.starts() == 1).await;
	assert_eq!(h.supervisor.phase(), Phase::Starting);
	assert!(!h.supervisor.restart());

	gate.notify_one();
	eventually("pipeline running", || h.supervisor.is_running()).await;
	assert_eq!(h.encoder.starts(), 1);
	assert_eq!(h.encoder.alive(), 1);
	let stats = h.supervisor.stats();
	assert_eq!((stats.starts, stats.stops, stats.restart_requests), (1, 0, 1));

	gate.notify_one();
	assert!(h.supervisor.restart());
	eventually("replacement pipeline", || h.encoder.starts() == 2 && h.supervisor.is_running()).await;
	assert_eq!(h.encoder.alive(), 1);
	assert_eq!(h.renderer.alive(), 1);
	assert_eq!(h.encoder.max_alive_at_spawn.load(Ordering::SeqCst), 0);
	assert_eq!(h.renderer.max_alive_at_start.load(Ordering::SeqCst), 0);

	ctx.cancel();
	tokio::time::timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
}
