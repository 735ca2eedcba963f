//! Discovery loop: poll the service registry for the first service that
//! supports a capability path.

use std::fmt;

use dc_runtime::Transport;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::backoff::{Outcome, PollPolicy, sleep_or_cancel};
use crate::path::PathSpec;
use crate::probe;

/// A registry entry chosen for subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
	pub id: String,
	pub display_name: String,
}

impl ServiceDescriptor {
	pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			display_name: display_name.into(),
		}
	}
}

impl fmt::Display for ServiceDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.display_name, self.id)
	}
}

/// Lists the registry until a service supports `spec`, probing entries in
/// registry order.
///
/// The first supporting entry wins and later entries in that listing are not
/// probed. Entries without an id or name are skipped. Listing failures are
/// transient: the loop waits on `policy` and lists again.
pub async fn find_service(transport: &dyn Transport, spec: &PathSpec, policy: &PollPolicy, cancel: &CancellationToken) -> Outcome<ServiceDescriptor> {
	let mut backoff = policy.backoff();
	let mut cycles: u32 = 0;

	loop {
		if cancel.is_cancelled() {
			return Outcome::Cancelled;
		}
		cycles += 1;

		match transport.service_discovery().await {
			Ok(entries) => {
				for entry in &entries {
					let Some((id, name)) = entry.identity() else {
						trace!(target = "dcwatch.discovery", ?entry, "skipping entry without id or name");
						continue;
					};
					if cancel.is_cancelled() {
						return Outcome::Cancelled;
					}
					if probe::supports(transport, id, spec).await {
						let service = ServiceDescriptor::new(id, name);
						info!(target = "dcwatch.discovery", %service, path = %spec, cycles, "found supporting service");
						return Outcome::Completed(service);
					}
				}
				debug!(target = "dcwatch.discovery", services = entries.len(), path = %spec, cycles, "no supporting service yet");
			}
			Err(err) => {
				debug!(target = "dcwatch.discovery", error = %err, cycles, "service discovery failed");
			}
		}

		if sleep_or_cancel(cancel, backoff.next_delay()).await {
			return Outcome::Cancelled;
		}
	}
}
