//! Result codes and the status envelope shared by every manager response.

use serde::{Deserialize, Serialize};

/// Numeric `result` field carried by every manager response.
///
/// `0` means success; any other value is a failure whose details live in
/// [`ResponseStatus::error_code`] and [`ResponseStatus::error_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub i64);

impl ResultCode {
	pub const OK: ResultCode = ResultCode(0);
	pub const ERROR: ResultCode = ResultCode(1);

	pub fn is_ok(self) -> bool {
		self == Self::OK
	}
}

impl Default for ResultCode {
	fn default() -> Self {
		Self::ERROR
	}
}

impl std::fmt::Display for ResultCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Status fields common to all responses, flattened into each response type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
	#[serde(default)]
	pub result: ResultCode,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_code: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
}

impl ResponseStatus {
	pub fn ok() -> Self {
		Self {
			result: ResultCode::OK,
			error_code: None,
			error_message: None,
		}
	}

	pub fn is_ok(&self) -> bool {
		self.result.is_ok()
	}

	/// Human-readable failure description, falling back to the raw code.
	pub fn describe(&self) -> String {
		match (&self.error_message, self.error_code) {
			(Some(message), Some(code)) => format!("{message} (errorCode={code})"),
			(Some(message), None) => message.clone(),
			(None, Some(code)) => format!("errorCode={code}"),
			(None, None) => format!("result={}", self.result),
		}
	}
}

/// `GET /gotapi/availability` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
	#[serde(flatten)]
	pub status: ResponseStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub uuid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
}

/// Response to subscribe/unsubscribe and other commands with no payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
	#[serde(flatten)]
	pub status: ResponseStatus,
}
