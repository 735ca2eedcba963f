//! Error types for the watcher core.

use thiserror::Error;

use crate::channel::ChannelState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// The capability path is not `/{api}/{profile}[/{interface}][/{attribute}]`.
	#[error("Malformed path '{path}': {reason}")]
	MalformedPath { path: String, reason: &'static str },

	#[error(transparent)]
	Transport(#[from] dc_runtime::Error),

	#[error("Event channel failed: {0}")]
	ChannelFailed(String),

	#[error("Event channel closed")]
	ChannelClosed,

	#[error("Event channel is not open (state: {0})")]
	NotOpen(ChannelState),

	#[error("Subscribe to {target} failed: {source}")]
	SubscribeFailed {
		target: String,
		#[source]
		source: dc_runtime::Error,
	},
}

impl Error {
	pub fn is_malformed_path(&self) -> bool {
		matches!(self, Error::MalformedPath { .. })
	}
}
