//! Availability gate: block until the manager answers its availability check.

use dc_runtime::Transport;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backoff::{Outcome, PollPolicy, sleep_or_cancel};

/// Polls [`Transport::availability`] until it succeeds or `cancel` fires.
///
/// Failures are logged and retried on `policy`'s schedule. Cancellation is
/// checked before every call and interrupts the wait between calls.
pub async fn await_available(transport: &dyn Transport, policy: &PollPolicy, cancel: &CancellationToken) -> Outcome<()> {
	let mut backoff = policy.backoff();
	let mut attempts: u32 = 0;

	loop {
		if cancel.is_cancelled() {
			return Outcome::Cancelled;
		}

		attempts += 1;
		let error = match transport.availability().await {
			Ok(()) => {
				info!(target = "dcwatch.gate", attempts, "manager available");
				return Outcome::Completed(());
			}
			Err(err) => err,
		};

		let delay = backoff.next_delay();
		debug!(target = "dcwatch.gate", attempts, error = %error, retry_in = ?delay, "manager not available");
		if sleep_or_cancel(cancel, delay).await {
			return Outcome::Cancelled;
		}
	}
}
