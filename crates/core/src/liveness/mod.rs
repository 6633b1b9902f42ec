//! Liveness Monitor: periodically asks the streaming platform whether the
//! channel is live and restarts the pipeline when it is not.

mod helix;
mod monitor;
mod schedule;

use async_trait::async_trait;

pub use helix::{HelixClient, HelixCredentials, HelixEndpoints};
pub use monitor::{CheckOutcome, LivenessMonitor};
pub use schedule::{DEFAULT_SCHEDULE, parse_schedule, schedule_or_default, until_next};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
	Live { title: String },
	NotLive,
}

/// Where channel status comes from.
#[async_trait]
pub trait StatusSource: Send + Sync {
	async fn status(&self, channel: &str) -> Result<ChannelStatus>;
}
