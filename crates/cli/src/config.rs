//! Persistent CLI configuration.
//!
//! Loaded from `<config dir>/dcwatch/config.json` or `--config FILE`.
//! Command-line flags override file values, which override defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dc_protocol::ManifestShape;
use dc_runtime::HttpTransportConfig;
use dcwatch::{PollPolicy, SessionConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// On-disk config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub origin: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_timeout_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub manifest_shape: Option<ManifestShape>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub interval_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reconnect: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub availability: Option<PollPolicy>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub discovery: Option<PollPolicy>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notification_capacity: Option<usize>,
}

impl ConfigFile {
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("dcwatch").join("config.json"))
	}

	pub fn load(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
		serde_json::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
	}

	/// Loads `explicit`, which must exist, or the default path if present.
	pub fn discover(explicit: Option<&Path>) -> Result<Self> {
		if let Some(path) = explicit {
			return Self::load(path);
		}
		match Self::default_path() {
			Some(path) if path.is_file() => Self::load(&path),
			path => {
				debug!(target = "dcwatch", path = ?path, "no config file; using defaults");
				Ok(Self::default())
			}
		}
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(self)?;
		fs::write(path, json).with_context(|| format!("writing config {}", path.display()))
	}
}

/// Flag values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub endpoint: Option<String>,
	pub origin: Option<String>,
	pub manifest_shape: Option<ManifestShape>,
	pub interval_ms: Option<u64>,
	pub reconnect: bool,
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
	pub transport: HttpTransportConfig,
	pub session: SessionConfig,
}

impl Settings {
	pub fn resolve(file: ConfigFile, overrides: Overrides) -> Self {
		let defaults = HttpTransportConfig::default();
		let transport = HttpTransportConfig {
			endpoint: overrides.endpoint.or(file.endpoint).unwrap_or(defaults.endpoint),
			origin: overrides.origin.or(file.origin).unwrap_or(defaults.origin),
			request_timeout: file.request_timeout_ms.map(Duration::from_millis).unwrap_or(defaults.request_timeout),
			manifest_shape: overrides.manifest_shape.or(file.manifest_shape).unwrap_or(defaults.manifest_shape),
		};

		let mut session = SessionConfig::default();
		if let Some(policy) = file.availability {
			session.availability_policy = policy;
		}
		if let Some(policy) = file.discovery {
			session.discovery_policy = policy;
		}
		if let Some(capacity) = file.notification_capacity {
			session.notification_capacity = capacity;
		}
		if let Some(interval) = overrides.interval_ms.or(file.interval_ms) {
			session = session.with_interval(interval);
		}
		session.restart_on_channel_loss = overrides.reconnect || file.reconnect.unwrap_or(false);

		Self { transport, session }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_without_file_or_flags() {
		let settings = Settings::resolve(ConfigFile::default(), Overrides::default());
		assert_eq!(settings.transport.endpoint, "http://localhost:4035");
		assert_eq!(settings.transport.origin, "dcwatch");
		assert_eq!(settings.transport.manifest_shape, ManifestShape::ProfileMap);
		assert_eq!(settings.session.subscription_params["interval"], "500");
		assert!(!settings.session.restart_on_channel_loss);
	}

	#[test]
	fn flags_override_file() {
		let file = ConfigFile {
			endpoint: Some("http://file:4035".into()),
			origin: Some("file-origin".into()),
			interval_ms: Some(1000),
			..Default::default()
		};
		let overrides = Overrides {
			endpoint: Some("http://flag:4035".into()),
			interval_ms: Some(250),
			reconnect: true,
			..Default::default()
		};

		let settings = Settings::resolve(file, overrides);
		assert_eq!(settings.transport.endpoint, "http://flag:4035");
		assert_eq!(settings.transport.origin, "file-origin");
		assert_eq!(settings.session.subscription_params["interval"], "250");
		assert!(settings.session.restart_on_channel_loss);
	}

	#[test]
	fn file_policies_replace_defaults() {
		let file = ConfigFile {
			discovery: Some(PollPolicy::fixed(Duration::from_millis(500))),
			request_timeout_ms: Some(1500),
			..Default::default()
		};
		let settings = Settings::resolve(file, Overrides::default());
		assert_eq!(settings.session.discovery_policy, PollPolicy::fixed(Duration::from_millis(500)));
		assert_eq!(settings.session.availability_policy, PollPolicy::availability());
		assert_eq!(settings.transport.request_timeout, Duration::from_millis(1500));
	}
}
