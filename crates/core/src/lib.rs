//! Live-streams a webpage to an RTMP endpoint.
//!
//! A pipeline is a browser ([`renderer`]) drawing the page onto an X display
//! plus an encoder process ([`encoder`]) capturing that display and the audio
//! sink. The [`supervisor::Supervisor`] keeps exactly one pipeline alive,
//! restarting it when the encoder dies or when the [`liveness`] monitor finds
//! the channel offline.

pub mod config;
pub mod encoder;
pub mod error;
pub mod liveness;
pub mod renderer;
pub mod supervisor;

pub use config::{Bitrate, CaptureSurface, Framerate, Resolution, StreamConfig};
pub use encoder::{Encoder, EncoderHandle, ExitReport, FfmpegEncoder, FfmpegOptions};
pub use error::{PagecastError, Result};
pub use liveness::{ChannelStatus, CheckOutcome, HelixClient, LivenessMonitor, StatusSource};
pub use renderer::{ChromeOptions, ChromeRenderer, Renderer, RendererSession};
pub use supervisor::{Phase, Supervisor, SupervisorStats, SupervisorTimings};
