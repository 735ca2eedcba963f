//! Subscription targets: where an event registration is addressed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::EventMessage;

/// Address of an event registration: `/{api}/{profile}[/{interface}][/{attribute}]`
/// on one service, plus query parameters such as `interval`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTarget {
	pub api: String,
	pub profile: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub interface: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attribute: Option<String>,
	pub service_id: String,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub params: BTreeMap<String, String>,
}

impl SubscriptionTarget {
	pub fn new(api: impl Into<String>, profile: impl Into<String>, service_id: impl Into<String>) -> Self {
		Self {
			api: api.into(),
			profile: profile.into(),
			interface: None,
			attribute: None,
			service_id: service_id.into(),
			params: BTreeMap::new(),
		}
	}

	pub fn with_interface(mut self, interface: Option<String>) -> Self {
		self.interface = interface;
		self
	}

	pub fn with_attribute(mut self, attribute: Option<String>) -> Self {
		self.attribute = attribute;
		self
	}

	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.insert(key.into(), value.into());
		self
	}

	pub fn with_params<I, K, V>(mut self, params: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.params.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
		self
	}

	/// Request path without service id or query, e.g. `/gotapi/deviceOrientation/onDeviceOrientation`.
	pub fn path(&self) -> String {
		let mut path = format!("/{}/{}", self.api, self.profile);
		if let Some(interface) = &self.interface {
			path.push('/');
			path.push_str(interface);
		}
		if let Some(attribute) = &self.attribute {
			path.push('/');
			path.push_str(attribute);
		}
		path
	}

	/// Whether a pushed event belongs to this registration.
	///
	/// Profile, interface and attribute compare case-insensitively; the
	/// service id compares exactly.
	pub fn matches(&self, event: &EventMessage) -> bool {
		fn eq_opt(a: Option<&str>, b: Option<&str>) -> bool {
			match (a, b) {
				(Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
				(None, None) => true,
				_ => false,
			}
		}

		event.service_id.as_deref() == Some(self.service_id.as_str())
			&& eq_opt(event.profile.as_deref(), Some(&self.profile))
			&& eq_opt(event.interface.as_deref(), self.interface.as_deref())
			&& eq_opt(event.attribute.as_deref(), self.attribute.as_deref())
	}
}

impl std::fmt::Display for SubscriptionTarget {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}?serviceId={}", self.path(), self.service_id)
	}
}
