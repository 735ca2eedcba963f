//! Error types for the transport layer.

use dc_protocol::ResultCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("WebSocket error: {0}")]
	WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Invalid endpoint URL: {0}")]
	Url(#[from] url::ParseError),

	#[error("Invalid endpoint: {0}")]
	Endpoint(String),

	/// The manager answered but reported a non-OK result code.
	#[error("{operation} rejected by manager (result={code}): {message}")]
	Rejected {
		operation: &'static str,
		code: ResultCode,
		message: String,
	},

	#[error("Invalid response: {0}")]
	InvalidResponse(String),

	#[error("Event channel is not connected")]
	NotConnected,

	#[error("Event channel closed")]
	ChannelClosed,
}

impl Error {
	pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
		Error::Rejected {
			operation,
			code: ResultCode::ERROR,
			message: message.into(),
		}
	}

	/// Returns `true` when the manager was reached but said no.
	pub fn is_rejected(&self) -> bool {
		matches!(self, Error::Rejected { .. })
	}
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		Error::WebSocket(Box::new(err))
	}
}
