use std::io;

use thiserror::Error;

/// Failures surfaced by the pipeline components.
///
/// None of these are fatal to the process on their own; the supervisor's run
/// loop logs them and backs off. Only the binary decides what ends the process.
#[derive(Debug, Error)]
pub enum PagecastError {
	/// The renderer could not bring the target page to a visible, ready state.
	#[error("navigation to {url} failed: {reason}")]
	Navigation { url: String, reason: String },

	/// A child process could not be created (missing binary, permissions).
	#[error("failed to spawn {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: io::Error,
	},

	/// The encoder was asked to run without one of its input streams.
	#[error("missing {0} input stream")]
	MissingStream(&'static str),

	#[error("encoder exited unexpectedly: {0}")]
	UnexpectedExit(String),

	#[error("browser launch failed: {0}")]
	BrowserLaunch(String),

	/// Status lookup against the streaming platform failed.
	#[error("status query failed: {0}")]
	Query(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("operation cancelled")]
	Cancelled,

	#[error(transparent)]
	Runtime(#[from] pagecast_runtime::Error),

	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PagecastError>;

impl From<reqwest::Error> for PagecastError {
	fn from(err: reqwest::Error) -> Self {
		PagecastError::Query(err.to_string())
	}
}
