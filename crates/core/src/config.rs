//! Stream parameters and the capture surface shared by renderer and encoder.

use std::fmt;

use tracing::warn;

/// Output resolution. Unknown settings fall back to [`Resolution::Hd720`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
	#[default]
	Hd720,
	Hd1080,
	Qhd2k,
}

impl Resolution {
	/// Parses a setting such as `"1080p"` (case-insensitive), warning on unknown input.
	pub fn from_setting(value: &str) -> Self {
		match value.trim().to_ascii_lowercase().as_str() {
			"720p" => Self::Hd720,
			"1080p" => Self::Hd1080,
			"2k" => Self::Qhd2k,
			other => {
				warn!(target = "pagecast.config", resolution = other, fallback = "720p", "unsupported resolution, using default");
				Self::Hd720
			}
		}
	}

	/// Pixel `(width, height)`.
	pub fn dimensions(self) -> (u32, u32) {
		match self {
			Self::Hd720 => (1280, 720),
			Self::Hd1080 => (1920, 1080),
			Self::Qhd2k => (2560, 1440),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Hd720 => "720p",
			Self::Hd1080 => "1080p",
			Self::Qhd2k => "2k",
		}
	}
}

impl fmt::Display for Resolution {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Output frame rate. Unknown settings fall back to [`Framerate::Fps30`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Framerate {
	#[default]
	Fps30,
	Fps60,
}

impl Framerate {
	pub fn from_setting(value: &str) -> Self {
		match value.trim() {
			"30" => Self::Fps30,
			"60" => Self::Fps60,
			other => {
				warn!(target = "pagecast.config", framerate = other, fallback = 30, "unsupported framerate, using default");
				Self::Fps30
			}
		}
	}

	pub fn fps(self) -> u32 {
		match self {
			Self::Fps30 => 30,
			Self::Fps60 => 60,
		}
	}

	/// Frames between keyframes: a two second GOP.
	pub fn keyframe_interval(self) -> u32 {
		self.fps() * 2
	}
}

impl fmt::Display for Framerate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.fps())
	}
}

/// Everything one pipeline run needs to know about the stream. Immutable per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
	pub page_url: String,
	pub rtmp_url: String,
	pub resolution: Resolution,
	pub framerate: Framerate,
}

impl StreamConfig {
	pub fn new(page_url: impl Into<String>, rtmp_url: impl Into<String>, resolution: Resolution, framerate: Framerate) -> Self {
		Self {
			page_url: page_url.into(),
			rtmp_url: rtmp_url.into(),
			resolution,
			framerate,
		}
	}

	pub fn dimensions(&self) -> (u32, u32) {
		self.resolution.dimensions()
	}

	pub fn bitrate(&self) -> Bitrate {
		Bitrate::for_stream(self.resolution, self.framerate)
	}
}

pub const AUDIO_BITRATE_KBPS: u32 = 160;

/// Encoder rate control targets in kbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitrate {
	pub video_kbps: u32,
	pub audio_kbps: u32,
	pub buffer_kbps: u32,
}

impl Bitrate {
	pub fn for_stream(resolution: Resolution, framerate: Framerate) -> Self {
		let video_kbps = match (resolution, framerate) {
			(Resolution::Hd720, Framerate::Fps30) => 3000,
			(Resolution::Hd720, Framerate::Fps60) => 4000,
			(Resolution::Hd1080, Framerate::Fps30) => 4500,
			(Resolution::Hd1080, Framerate::Fps60) => 6000,
			(Resolution::Qhd2k, Framerate::Fps30) => 6000,
			(Resolution::Qhd2k, Framerate::Fps60) => 8500,
		};
		Self {
			video_kbps,
			audio_kbps: AUDIO_BITRATE_KBPS,
			buffer_kbps: video_kbps * 2,
		}
	}

	pub fn video(&self) -> String {
		format!("{}k", self.video_kbps)
	}

	pub fn audio(&self) -> String {
		format!("{}k", self.audio_kbps)
	}

	pub fn buffer(&self) -> String {
		format!("{}k", self.buffer_kbps)
	}
}

/// The X display and audio sink the renderer draws into and the encoder captures.
///
/// Both are singleton OS resources reused across pipeline restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSurface {
	pub display: String,
	pub audio_format: String,
	pub audio_device: String,
}

impl Default for CaptureSurface {
	fn default() -> Self {
		Self {
			display: ":0".to_string(),
			audio_format: "alsa".to_string(),
			audio_device: "default".to_string(),
		}
	}
}
