//! Capability path parsing.
//!
//! A capability path names a remote feature:
//!
//! | Path | Segments | interface | attribute |
//! |---|---|---|---|
//! | `/{api}/{profile}` | 3 | - | - |
//! | `/{api}/{profile}/{attribute}` | 4 | - | yes |
//! | `/{api}/{profile}/{interface}/{attribute}` | 5 | yes | yes |
//!
//! Segment counts include the empty root before the leading `/`, so
//! `/gotapi/deviceOrientation/onDeviceOrientation` has four.

use std::fmt;
use std::str::FromStr;

use dc_protocol::SubscriptionTarget;

use crate::error::{Error, Result};

const MIN_SEGMENTS: usize = 3;
const MAX_SEGMENTS: usize = 5;

/// Parsed capability path. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSpec {
	api: String,
	profile: String,
	interface: Option<String>,
	attribute: Option<String>,
}

impl PathSpec {
	/// Parses `path`, failing with [`Error::MalformedPath`].
	///
	/// Trailing slashes are ignored; any other empty segment is rejected.
	pub fn parse(path: &str) -> Result<Self> {
		let malformed = |reason| Error::MalformedPath {
			path: path.to_string(),
			reason,
		};

		let rest = path.strip_prefix('/').ok_or_else(|| malformed("must start with '/'"))?;
		let names: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
		if names.iter().any(|name| name.is_empty()) {
			return Err(malformed("contains an empty segment"));
		}

		let segments = names.len() + 1;
		if !(MIN_SEGMENTS..=MAX_SEGMENTS).contains(&segments) {
			return Err(malformed("expected /api/profile[/interface][/attribute]"));
		}

		let owned = |i: usize| names[i].to_string();
		let (interface, attribute) = match segments {
			3 => (None, None),
			4 => (None, Some(owned(2))),
			_ => (Some(owned(2)), Some(owned(3))),
		};

		Ok(Self {
			api: owned(0),
			profile: owned(1),
			interface,
			attribute,
		})
	}

	pub fn api(&self) -> &str {
		&self.api
	}

	pub fn profile(&self) -> &str {
		&self.profile
	}

	pub fn interface(&self) -> Option<&str> {
		self.interface.as_deref()
	}

	pub fn attribute(&self) -> Option<&str> {
		self.attribute.as_deref()
	}

	/// Number of segments including the empty root.
	pub fn segment_count(&self) -> usize {
		2 + 1 + usize::from(self.interface.is_some()) + usize::from(self.attribute.is_some())
	}

	/// Key into a profile's path table: `/{interface}/{attribute}` or
	/// `/{attribute}`; `None` for profile-only paths.
	pub fn sub_path(&self) -> Option<String> {
		let attribute = self.attribute.as_deref()?;
		Some(match &self.interface {
			Some(interface) => format!("/{interface}/{attribute}"),
			None => format!("/{attribute}"),
		})
	}

	/// Subscription target for this path on `service_id`.
	pub fn target(&self, service_id: &str) -> SubscriptionTarget {
		SubscriptionTarget::new(&self.api, &self.profile, service_id)
			.with_interface(self.interface.clone())
			.with_attribute(self.attribute.clone())
	}
}

impl FromStr for PathSpec {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

impl fmt::Display for PathSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "/{}/{}{}", self.api, self.profile, self.sub_path().unwrap_or_default())
	}
}
