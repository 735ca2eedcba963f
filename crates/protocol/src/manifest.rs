//! Capability manifests (`serviceinformation`) wire types.
//!
//! Managers have published two manifest shapes over time:
//! * a profile map (`supportApis`): profile name to a definition whose
//!   `paths` table is keyed by sub-path (`/onDeviceOrientation`,
//!   `/interface/attribute`)
//! * a flat capability list (`supports`): profile names only
//!
//! Which one a deployment emits is decided at integration time through
//! [`ManifestShape`]; a backend is never assumed to serve both.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::result::ResponseStatus;

/// Manifest shape selected for a transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestShape {
	#[default]
	ProfileMap,
	CapabilityList,
}

impl std::fmt::Display for ManifestShape {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ManifestShape::ProfileMap => f.write_str("profile-map"),
			ManifestShape::CapabilityList => f.write_str("capability-list"),
		}
	}
}

impl std::str::FromStr for ManifestShape {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"profile-map" => Ok(ManifestShape::ProfileMap),
			"capability-list" => Ok(ManifestShape::CapabilityList),
			other => Err(format!("unknown manifest shape '{other}' (expected profile-map or capability-list)")),
		}
	}
}

/// One profile entry of a profile-map manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileDefinition {
	/// Sub-path table; `None` when the definition had no usable `paths` object.
	pub paths: Option<Map<String, Value>>,
}

impl ProfileDefinition {
	fn from_value(value: &Value) -> Self {
		let paths = value.get("paths").and_then(Value::as_object).cloned();
		Self { paths }
	}

	pub fn has_path(&self, sub_path: &str) -> bool {
		self.paths.as_ref().is_some_and(|paths| paths.contains_key(sub_path))
	}
}

/// A service's capability manifest in one of the supported shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
	ProfileMap(BTreeMap<String, ProfileDefinition>),
	CapabilityList(Vec<String>),
}

impl Manifest {
	pub fn shape(&self) -> ManifestShape {
		match self {
			Manifest::ProfileMap(_) => ManifestShape::ProfileMap,
			Manifest::CapabilityList(_) => ManifestShape::CapabilityList,
		}
	}

	/// Profile names advertised by this manifest, in manifest order.
	pub fn profiles(&self) -> Vec<&str> {
		match self {
			Manifest::ProfileMap(map) => map.keys().map(String::as_str).collect(),
			Manifest::CapabilityList(list) => list.iter().map(String::as_str).collect(),
		}
	}
}

/// `GET /gotapi/serviceinformation` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInformationResponse {
	#[serde(flatten)]
	pub status: ResponseStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub supports: Option<Vec<Value>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub support_apis: Option<Map<String, Value>>,
}

impl ServiceInformationResponse {
	/// Extracts the manifest in `shape`, or `None` when the response does not
	/// carry that shape.
	pub fn manifest(&self, shape: ManifestShape) -> Option<Manifest> {
		match shape {
			ManifestShape::ProfileMap => {
				let apis = self.support_apis.as_ref()?;
				let map = apis
					.iter()
					.map(|(profile, definition)| (profile.clone(), ProfileDefinition::from_value(definition)))
					.collect();
				Some(Manifest::ProfileMap(map))
			}
			ManifestShape::CapabilityList => {
				let supports = self.supports.as_ref()?;
				let list = supports.iter().filter_map(Value::as_str).map(str::to_string).collect();
				Some(Manifest::CapabilityList(list))
			}
		}
	}
}
