//! Service registry (`servicediscovery`) wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::ResponseStatus;

/// One entry of the registry listing.
///
/// Every field is optional on the wire; entries lacking an id or name are
/// skipped by discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub network_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub online: Option<bool>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes: Vec<String>,
}

impl ServiceEntry {
	pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: Some(id.into()),
			name: Some(name.into()),
			..Default::default()
		}
	}

	/// Returns `(id, name)` when both are present and non-empty.
	pub fn identity(&self) -> Option<(&str, &str)> {
		let id = self.id.as_deref().filter(|s| !s.is_empty())?;
		let name = self.name.as_deref().filter(|s| !s.is_empty())?;
		Some((id, name))
	}
}

/// `GET /gotapi/servicediscovery` response.
///
/// `services` is kept as raw JSON so a single malformed element does not
/// poison the whole listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDiscoveryResponse {
	#[serde(flatten)]
	pub status: ResponseStatus,
	#[serde(default)]
	pub services: Vec<Value>,
}

impl ServiceDiscoveryResponse {
	/// Registry entries in response order, skipping non-object elements.
	pub fn entries(&self) -> Vec<ServiceEntry> {
		self.services
			.iter()
			.filter(|value| value.is_object())
			.filter_map(|value| serde_json::from_value(value.clone()).ok())
			.collect()
	}
}
