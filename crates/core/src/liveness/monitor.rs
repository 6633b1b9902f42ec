use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{ChannelStatus, StatusSource, until_next};
use crate::supervisor::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
	Live,
	RestartRequested,
	/// Lookup failed; nothing was restarted.
	QueryFailed,
}

pub struct LivenessMonitor {
	channel: String,
	source: Arc<dyn StatusSource>,
	supervisor: Arc<Supervisor>,
	schedule: Schedule,
}

impl LivenessMonitor {
	pub fn new(channel: impl Into<String>, source: Arc<dyn StatusSource>, supervisor: Arc<Supervisor>, schedule: Schedule) -> Self {
		Self {
			channel: channel.into(),
			source,
			supervisor,
			schedule,
		}
	}

	pub fn channel(&self) -> &str {
		&self.channel
	}

	/// Runs one status check, restarting the pipeline if the channel is offline.
	pub async fn check_once(&self) -> CheckOutcome {
		match self.source.status(&self.channel).await {
			Ok(ChannelStatus::Live { title }) => {
				info!(target = "pagecast.liveness", channel = %self.channel, %title, "channel is live");
				CheckOutcome::Live
			}
			Ok(ChannelStatus::NotLive) => {
				warn!(target = "pagecast.liveness", channel = %self.channel, "channel is not live, restarting pipeline");
				self.supervisor.restart();
				CheckOutcome::RestartRequested
			}
			Err(err) => {
				error!(target = "pagecast.liveness", channel = %self.channel, error = %err, "status check failed");
				CheckOutcome::QueryFailed
			}
		}
	}

	/// Checks on every scheduled tick until `ctx` is cancelled.
	pub async fn run(&self, ctx: CancellationToken) {
		info!(target = "pagecast.liveness", channel = %self.channel, "liveness monitor started");
		loop {
			let Some(delay) = until_next(&self.schedule, Utc::now()) else {
				warn!(target = "pagecast.liveness", "status schedule has no upcoming runs");
				break;
			};

			tokio::select! {
				_ = ctx.cancelled() => break,
				_ = tokio::time::sleep(delay) => {}
			}

			tokio::select! {
				_ = ctx.cancelled() => break,
				_ = self.check_once() => {}
			}
		}
		info!(target = "pagecast.liveness", "liveness monitor stopped");
	}
}
