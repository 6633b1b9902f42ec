//! Encoder Process: captures the surface and pushes the stream to RTMP.

mod ffmpeg;
mod process;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use ffmpeg::{FfmpegEncoder, FfmpegOptions, build_args, redact_endpoint};
pub use process::{EncoderHandle, ExitReport, ExitReporter, exit_channel};

use crate::config::{CaptureSurface, StreamConfig};
use crate::error::Result;

#[async_trait]
pub trait Encoder: Send + Sync {
	/// Spawns the encoder bound to `surface`.
	///
	/// The process is killed when `cancel` fires or [`EncoderHandle::kill`] is
	/// called, whichever comes first.
	async fn start(&self, cancel: CancellationToken, config: &StreamConfig, surface: &CaptureSurface) -> Result<EncoderHandle>;
}
