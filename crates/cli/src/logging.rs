//! Subscriber setup driven by `LOG_LEVEL` / `LOG_FORMAT`.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
	Json,
	Console,
}

impl LogFormat {
	/// `console` selects human-readable output; anything else is JSON.
	pub fn parse(value: &str) -> Self {
		match value.trim().to_ascii_lowercase().as_str() {
			"console" => LogFormat::Console,
			_ => LogFormat::Json,
		}
	}
}

/// Maps a level name to a tracing level, defaulting to `info`.
///
/// `dpanic`, `panic` and `fatal` have no tracing counterpart and map to `error`.
pub fn parse_level(value: &str) -> Level {
	match value.trim().to_ascii_lowercase().as_str() {
		"trace" => Level::TRACE,
		"debug" => Level::DEBUG,
		"info" => Level::INFO,
		"warn" | "warning" => Level::WARN,
		"error" | "dpanic" | "panic" | "fatal" => Level::ERROR,
		_ => Level::INFO,
	}
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(level: &str, format: &str) {
	let filter = EnvFilter::builder()
		.with_default_directive(LevelFilter::from_level(parse_level(level)).into())
		.from_env_lossy();

	let installed = match LogFormat::parse(format) {
		LogFormat::Json => tracing_subscriber::fmt()
			.json()
			.with_env_filter(filter)
			.with_current_span(false)
			.with_target(true)
			.try_init(),
		LogFormat::Console => tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init(),
	};

	if installed.is_err() {
		tracing::debug!("tracing subscriber already installed");
	}
}
