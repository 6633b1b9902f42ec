use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::process::{ExitReport, ExitReporter, exit_channel};
use super::{Encoder, EncoderHandle};
use crate::config::{CaptureSurface, StreamConfig};
use crate::error::{PagecastError, Result};

#[derive(Debug, Clone, Default)]
pub struct FfmpegOptions {
	/// Explicit binary; `ffmpeg` on `PATH` when unset.
	pub ffmpeg_path: Option<PathBuf>,
}

/// x11grab + audio capture, libx264/aac, FLV over RTMP.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
	options: FfmpegOptions,
}

impl FfmpegEncoder {
	pub fn new(options: FfmpegOptions) -> Self {
		Self { options }
	}

	fn program(&self) -> Result<PathBuf> {
		match &self.options.ffmpeg_path {
			Some(path) => Ok(path.clone()),
			None => which::which("ffmpeg").map_err(|e| PagecastError::Spawn {
				program: "ffmpeg".to_string(),
				source: io::Error::new(io::ErrorKind::NotFound, e),
			}),
		}
	}
}

/// Full argument list for one encoder run.
///
/// Both inputs are mapped explicitly; an empty display or audio device is
/// rejected rather than silently streaming one track.
pub fn build_args(config: &StreamConfig, surface: &CaptureSurface) -> Result<Vec<String>> {
	if surface.display.trim().is_empty() {
		return Err(PagecastError::MissingStream("video"));
	}
	if surface.audio_device.trim().is_empty() || surface.audio_format.trim().is_empty() {
		return Err(PagecastError::MissingStream("audio"));
	}

	let (width, height) = config.dimensions();
	let fps = config.framerate.fps();
	let bitrate = config.bitrate();

	Ok(owned([
		// video input
		"-f",
		"x11grab",
		"-video_size",
		&format!("{width}x{height}"),
		"-framerate",
		&fps.to_string(),
		"-i",
		&format!("{}+0,0", surface.display),
		// audio input
		"-f",
		&surface.audio_format,
		"-i",
		&surface.audio_device,
		"-map",
		"0:v",
		"-map",
		"1:a",
		"-vf",
		"crop=in_w:in_h:0:0",
		"-c:v",
		"libx264",
		"-preset",
		"veryfast",
		"-tune",
		"zerolatency",
		"-crf",
		"23",
		"-maxrate",
		&bitrate.video(),
		"-bufsize",
		&bitrate.buffer(),
		"-pix_fmt",
		"yuv420p",
		"-g",
		&config.framerate.keyframe_interval().to_string(),
		"-c:a",
		"aac",
		"-b:a",
		&bitrate.audio(),
		"-ar",
		"44100",
		"-f",
		"flv",
		&config.rtmp_url,
	]))
}

fn owned<const N: usize>(args: [&str; N]) -> Vec<String> {
	args.into_iter().map(str::to_string).collect()
}

/// Drops the final path segment (usually the stream key) for logging.
pub fn redact_endpoint(rtmp_url: &str) -> String {
	let Some(scheme_end) = rtmp_url.find("://") else {
		return rtmp_url.to_string();
	};
	match rtmp_url[scheme_end + 3..].rsplit_once('/') {
		Some((location, key)) if !key.is_empty() => format!("{}://{location}/***", &rtmp_url[..scheme_end]),
		_ => rtmp_url.to_string(),
	}
}

#[async_trait]
impl Encoder for FfmpegEncoder {
	async fn start(&self, cancel: CancellationToken, config: &StreamConfig, surface: &CaptureSurface) -> Result<EncoderHandle> {
		let args = build_args(config, surface)?;
		let program = self.program()?;

		let mut child = Command::new(&program)
			.args(&args)
			.env("DISPLAY", &surface.display)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|source| PagecastError::Spawn {
				program: program.display().to_string(),
				source,
			})?;

		let pid = child.id();
		if let Some(stdout) = child.stdout.take() {
			tokio::spawn(forward_output(stdout, "stdout"));
		}
		if let Some(stderr) = child.stderr.take() {
			tokio::spawn(forward_output(stderr, "stderr"));
		}

		info!(
			target = "pagecast.encoder",
			pid,
			resolution = %config.resolution,
			framerate = %config.framerate,
			video_bitrate = %config.bitrate().video(),
			endpoint = %redact_endpoint(&config.rtmp_url),
			"encoder started"
		);

		let (handle, reporter) = exit_channel(pid, &cancel);
		tokio::spawn(watch_child(child, reporter));
		Ok(handle)
	}
}

async fn watch_child(mut child: Child, reporter: ExitReporter) {
	let kill = reporter.kill_token();
	let report = tokio::select! {
		_ = kill.cancelled() => {
			if let Err(e) = child.start_kill() {
				debug!(target = "pagecast.encoder", error = %e, "kill failed, process likely gone");
			}
			let _ = child.wait().await;
			ExitReport::Killed
		}
		status = child.wait() => match status {
			Ok(status) => {
				warn!(target = "pagecast.encoder", %status, "encoder exited");
				ExitReport::Exited(status)
			}
			Err(e) => ExitReport::Failed(e.to_string()),
		},
	};
	debug!(target = "pagecast.encoder", ?report, "encoder exit observed");
	reporter.report(report);
}

async fn forward_output<R>(reader: R, stream: &'static str)
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(reader).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		debug!(target = "pagecast.encoder", stream, "{line}");
	}
}
