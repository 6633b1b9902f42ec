//! Environment-backed configuration. Every option is also a flag; flags win.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use pagecast::liveness::{DEFAULT_SCHEDULE, HelixCredentials};
use pagecast::{CaptureSurface, Framerate, Resolution, StreamConfig};
use url::Url;

const DEFAULT_WEBPAGE_URL: &str = "https://google.com";

#[derive(Debug, Clone, Parser)]
#[command(name = "pagecast", version, about = "Stream a live webpage to an RTMP endpoint")]
pub struct Settings {
	/// Page to render.
	#[arg(long, env = "WEBPAGE_URL")]
	pub webpage_url: Option<String>,

	/// Older name for `--webpage-url`.
	#[arg(long, env = "WEBSITE_URL", hide = true)]
	pub website_url: Option<String>,

	/// RTMP endpoint including the stream key.
	#[arg(long, env = "RTMP_URL", default_value = "rtmp://localhost:1935/live/stream", hide_env_values = true)]
	pub rtmp_url: String,

	/// 720p, 1080p or 2k.
	#[arg(long, env = "RESOLUTION", default_value = "720p")]
	pub resolution: String,

	/// 30 or 60.
	#[arg(long, env = "FRAMERATE", default_value = "30")]
	pub framerate: String,

	#[arg(long, env = "LOG_LEVEL", default_value = "info")]
	pub log_level: String,

	/// `json` or `console`.
	#[arg(long, env = "LOG_FORMAT", default_value = "json")]
	pub log_format: String,

	/// Port for `/health` and `/metrics`.
	#[arg(long, env = "PORT", default_value_t = 8080)]
	pub port: u16,

	/// Twitch channel to watch; the liveness monitor is off when unset.
	#[arg(long, env = "TWITCH_CHANNEL")]
	pub twitch_channel: Option<String>,

	#[arg(long, env = "TWITCH_CLIENT_ID")]
	pub twitch_client_id: Option<String>,

	#[arg(long, env = "TWITCH_CLIENT_SECRET", hide_env_values = true)]
	pub twitch_client_secret: Option<String>,

	/// Cron expression for liveness checks.
	#[arg(long, env = "STATUS_CRON_SCHEDULE", default_value = DEFAULT_SCHEDULE)]
	pub status_cron_schedule: String,

	/// X display the browser draws on and the encoder captures.
	#[arg(long, env = "DISPLAY", default_value = ":0")]
	pub display: String,

	#[arg(long, env = "AUDIO_INPUT_FORMAT", default_value = "alsa")]
	pub audio_input_format: String,

	#[arg(long, env = "AUDIO_DEVICE", default_value = "default")]
	pub audio_device: String,

	#[arg(long, env = "CHROME_PATH")]
	pub chrome_path: Option<PathBuf>,

	#[arg(long, env = "FFMPEG_PATH")]
	pub ffmpeg_path: Option<PathBuf>,

	/// Seconds the page has to become visible.
	#[arg(long, env = "NAVIGATION_TIMEOUT_SECS", default_value_t = 30)]
	pub navigation_timeout_secs: u64,
}

/// Channel and credentials for the liveness monitor.
#[derive(Debug, Clone)]
pub struct LivenessSettings {
	pub channel: String,
	pub credentials: HelixCredentials,
	pub schedule: String,
}

impl Settings {
	pub fn page_url(&self) -> &str {
		self.webpage_url
			.as_deref()
			.or(self.website_url.as_deref())
			.filter(|url| !url.trim().is_empty())
			.unwrap_or(DEFAULT_WEBPAGE_URL)
	}

	/// Rejects settings the process cannot run with.
	pub fn validate(&self) -> anyhow::Result<()> {
		Url::parse(self.page_url()).with_context(|| format!("invalid webpage URL {:?}", self.page_url()))?;
		let rtmp = Url::parse(&self.rtmp_url).context("invalid RTMP URL")?;
		if !matches!(rtmp.scheme(), "rtmp" | "rtmps") {
			bail!("RTMP URL must use rtmp:// or rtmps://, got {}://", rtmp.scheme());
		}
		if self.navigation_timeout_secs == 0 {
			bail!("navigation timeout must be at least one second");
		}
		self.liveness()?;
		Ok(())
	}

	pub fn stream_config(&self) -> StreamConfig {
		StreamConfig::new(
			self.page_url(),
			self.rtmp_url.clone(),
			Resolution::from_setting(&self.resolution),
			Framerate::from_setting(&self.framerate),
		)
	}

	pub fn surface(&self) -> CaptureSurface {
		CaptureSurface {
			display: self.display.clone(),
			audio_format: self.audio_input_format.clone(),
			audio_device: self.audio_device.clone(),
		}
	}

	pub fn navigation_timeout(&self) -> Duration {
		Duration::from_secs(self.navigation_timeout_secs)
	}

	/// `None` when no channel is configured. A channel without both credentials is an error.
	pub fn liveness(&self) -> anyhow::Result<Option<LivenessSettings>> {
		let Some(channel) = self.twitch_channel.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
			return Ok(None);
		};

		let present = |value: &Option<String>| value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
		let (Some(client_id), Some(client_secret)) = (present(&self.twitch_client_id), present(&self.twitch_client_secret)) else {
			bail!("TWITCH_CHANNEL is set but TWITCH_CLIENT_ID and TWITCH_CLIENT_SECRET are both required");
		};

		Ok(Some(LivenessSettings {
			channel: channel.to_string(),
			credentials: HelixCredentials { client_id, client_secret },
			schedule: self.status_cron_schedule.clone(),
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(args: &[&str]) -> Settings {
		let mut argv = vec!["pagecast", "--display", ":7", "--port", "9000"];
		argv.extend_from_slice(args);
		Settings::try_parse_from(argv).unwrap()
	}

	#[test]
	fn flags_build_stream_config() {
		let settings = parse(&[
			"--webpage-url",
			"https://example.com/board",
			"--rtmp-url",
			"rtmp://live.example.com/app/key",
			"--resolution",
			"1080p",
			"--framerate",
			"60",
		]);
		settings.validate().unwrap();

		let config = settings.stream_config();
		assert_eq!(config.page_url, "https://example.com/board");
		assert_eq!(config.resolution, Resolution::Hd1080);
		assert_eq!(config.framerate, Framerate::Fps60);
		assert_eq!(settings.surface().display, ":7");
		assert_eq!(settings.port, 9000);
	}

	#[test]
	fn unknown_enums_normalize_instead_of_failing() {
		let settings = parse(&["--webpage-url", "https://example.com", "--resolution", "8k", "--framerate", "25"]);
		let config = settings.stream_config();
		assert_eq!(config.resolution, Resolution::Hd720);
		assert_eq!(config.framerate, Framerate::Fps30);
	}

	#[test]
	fn legacy_url_flag_is_used_as_fallback() {
		let mut settings = parse(&["--website-url", "https://legacy.example.com"]);
		// WEBPAGE_URL may be set in the environment running the tests.
		settings.webpage_url = None;
		assert_eq!(settings.page_url(), "https://legacy.example.com");

		settings.webpage_url = Some("https://current.example.com".to_string());
		assert_eq!(settings.page_url(), "https://current.example.com");

		settings.webpage_url = Some("  ".to_string());
		settings.website_url = None;
		assert_eq!(settings.page_url(), DEFAULT_WEBPAGE_URL);
	}

	#[test]
	fn invalid_urls_are_fatal() {
		let settings = parse(&["--webpage-url", "not a url"]);
		assert!(settings.validate().is_err());

		let settings = parse(&["--webpage-url", "https://example.com", "--rtmp-url", "http://example.com/live"]);
		assert!(settings.validate().is_err());
	}

	#[test]
	fn channel_without_credentials_is_fatal() {
		let settings = parse(&[
			"--webpage-url",
			"https://example.com",
			"--rtmp-url",
			"rtmp://localhost/live/key",
			"--twitch-channel",
			"somechannel",
			"--twitch-client-id",
			"",
			"--twitch-client-secret",
			"",
		]);
		assert!(settings.validate().is_err());
	}

	#[test]
	fn channel_with_credentials_enables_monitor() {
		let settings = parse(&[
			"--webpage-url",
			"https://example.com",
			"--rtmp-url",
			"rtmp://localhost/live/key",
			"--twitch-channel",
			"somechannel",
			"--twitch-client-id",
			"cid",
			"--twitch-client-secret",
			"secret",
			"--status-cron-schedule",
			"*/5 * * * *",
		]);
		let liveness = settings.liveness().unwrap().unwrap();
		assert_eq!(liveness.channel, "somechannel");
		assert_eq!(liveness.credentials.client_id, "cid");
		assert_eq!(liveness.schedule, "*/5 * * * *");
	}
}
