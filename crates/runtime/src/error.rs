use thiserror::Error;

/// Errors raised while launching, probing or talking to a browser.
#[derive(Debug, Error)]
pub enum Error {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("WebSocket error: {0}")]
	WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Protocol error {code}: {message}")]
	Protocol { code: i64, message: String },

	#[error("Timeout: {0}")]
	Timeout(String),

	#[error("Connection closed before a response arrived")]
	ChannelClosed,

	#[error("{0}")]
	Context(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		Error::WebSocket(Box::new(err))
	}
}

pub type Result<T> = std::result::Result<T, Error>;
