//! Event messages pushed over the event WebSocket.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A pushed event.
///
/// Routing fields are typed; everything else (e.g. `orientation`) is kept
/// verbatim in `payload` for the consumer to interpret.
///
/// ```json
/// {
///   "serviceId": "host.abc",
///   "profile": "deviceOrientation",
///   "attribute": "onDeviceOrientation",
///   "orientation": { "accelerationIncludingGravity": { "x": 0.1, "y": 9.8, "z": 0.0 } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub service_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub profile: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub interface: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attribute: Option<String>,
	#[serde(flatten)]
	pub payload: Map<String, Value>,
}

impl EventMessage {
	/// `true` when the message carries routing fields, as opposed to a bare
	/// acknowledgement like `{"result": 0}`.
	pub fn is_event(&self) -> bool {
		self.profile.is_some() && self.attribute.is_some()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.payload.get(key)
	}
}
