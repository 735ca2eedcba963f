//! Capability probing: does a service support a [`PathSpec`]?

use dc_protocol::Manifest;
use dc_runtime::Transport;
use tracing::debug;

use crate::path::PathSpec;

/// Checks `manifest` for the path's profile and, when the path names an
/// attribute, for its sub-path in the profile's path table.
///
/// Capability-list manifests only carry profile names, so only the profile
/// is checked there.
pub fn manifest_supports(manifest: &Manifest, spec: &PathSpec) -> bool {
	match manifest {
		Manifest::ProfileMap(profiles) => {
			let Some(definition) = profiles.get(spec.profile()) else {
				return false;
			};
			match spec.sub_path() {
				Some(sub_path) => definition.has_path(&sub_path),
				None => true,
			}
		}
		Manifest::CapabilityList(profiles) => profiles.iter().any(|profile| profile == spec.profile()),
	}
}

/// Fetches the manifest of `service_id` and checks it against `spec`.
///
/// Never fails: transport errors and malformed manifests count as unsupported.
pub async fn supports(transport: &dyn Transport, service_id: &str, spec: &PathSpec) -> bool {
	match transport.service_information(service_id).await {
		Ok(manifest) => {
			let supported = manifest_supports(&manifest, spec);
			debug!(target = "dcwatch.probe", service_id, path = %spec, shape = %manifest.shape(), supported, "probed service");
			supported
		}
		Err(err) => {
			debug!(target = "dcwatch.probe", service_id, path = %spec, error = %err, "service information unavailable");
			false
		}
	}
}
