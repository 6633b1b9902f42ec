//! Prometheus exposition of supervisor state.

use pagecast::SupervisorStats;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Registry whose values are copied from the supervisor on every scrape.
pub struct Metrics {
	registry: Registry,
	running: IntGauge,
	starts: IntCounter,
	start_failures: IntCounter,
	stops: IntCounter,
	restart_requests: IntCounter,
	unexpected_exits: IntCounter,
}

impl Metrics {
	pub fn new() -> prometheus::Result<Self> {
		let registry = Registry::new_custom(Some("pagecast".to_string()), None)?;

		let running = IntGauge::new("pipeline_running", "1 while a renderer and encoder pipeline is active")?;
		let starts = IntCounter::new("pipeline_starts_total", "Pipelines brought up successfully")?;
		let start_failures = IntCounter::new("pipeline_start_failures_total", "Pipeline starts that failed")?;
		let stops = IntCounter::new("pipeline_stops_total", "Pipelines torn down by stop or restart")?;
		let restart_requests = IntCounter::new("pipeline_restart_requests_total", "Restart requests, including no-ops")?;
		let unexpected_exits = IntCounter::new("encoder_unexpected_exits_total", "Encoder exits that nobody asked for")?;

		registry.register(Box::new(running.clone()))?;
		for counter in [&starts, &start_failures, &stops, &restart_requests, &unexpected_exits] {
			registry.register(Box::new(counter.clone()))?;
		}

		Ok(Self {
			registry,
			running,
			starts,
			start_failures,
			stops,
			restart_requests,
			unexpected_exits,
		})
	}

	/// Syncs from a stats snapshot and encodes the text exposition format.
	pub fn render(&self, running: bool, stats: SupervisorStats) -> prometheus::Result<String> {
		self.running.set(i64::from(running));
		advance(&self.starts, stats.starts);
		advance(&self.start_failures, stats.start_failures);
		advance(&self.stops, stats.stops);
		advance(&self.restart_requests, stats.restart_requests);
		advance(&self.unexpected_exits, stats.unexpected_exits);

		let mut buffer = Vec::new();
		TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
		String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
	}
}

fn advance(counter: &IntCounter, total: u64) {
	let current = counter.get();
	if total > current {
		counter.inc_by(total - current);
	}
}

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
