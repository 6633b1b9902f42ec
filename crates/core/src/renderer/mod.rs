//! Renderer Session: a browser showing the target page on the capture surface.

mod chrome;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use chrome::{ChromeOptions, ChromeRenderer, READY_EXPRESSION, chrome_args, navigate, wait_until_visible};

use crate::config::{CaptureSurface, StreamConfig};
use crate::error::Result;

/// A started renderer. It stays alive until the token passed to
/// [`Renderer::start`] is cancelled, which tears the browser down.
#[derive(Debug, Clone)]
pub struct RendererSession {
	/// Where the page is drawn and heard; handed to the encoder.
	pub surface: CaptureSurface,
	pub pid: Option<u32>,
	pub debugging_port: Option<u16>,
	released: CancellationToken,
}

impl RendererSession {
	/// `released` must be cancelled by the renderer once the browser and
	/// everything it spawned are gone.
	pub fn new(surface: CaptureSurface, pid: Option<u32>, debugging_port: Option<u16>, released: CancellationToken) -> Self {
		Self {
			surface,
			pid,
			debugging_port,
			released,
		}
	}

	pub fn is_released(&self) -> bool {
		self.released.is_cancelled()
	}

	/// Blocks until the browser has been torn down.
	pub async fn released(&self) {
		self.released.cancelled().await
	}
}

#[async_trait]
pub trait Renderer: Send + Sync {
	/// Launches the browser and blocks until the page is ready to be captured.
	///
	/// Cancelling `cancel` at any point, during startup or afterwards, must
	/// terminate the whole browser process tree.
	async fn start(&self, cancel: CancellationToken, config: &StreamConfig) -> Result<RendererSession>;
}
