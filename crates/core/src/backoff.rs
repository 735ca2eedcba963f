//! Polling cadence for the availability and discovery loops.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Result of a loop that can be stopped from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
	Completed(T),
	Cancelled,
}

impl<T> Outcome<T> {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Outcome::Cancelled)
	}

	pub fn completed(self) -> Option<T> {
		match self {
			Outcome::Completed(value) => Some(value),
			Outcome::Cancelled => None,
		}
	}
}

/// Bounded exponential retry schedule.
///
/// The first retry waits `initial`; each later one multiplies the delay by
/// `multiplier` up to `max`. A multiplier below 1 (or NaN) is treated as 1,
/// and delays never drop below [`Backoff::MIN_DELAY`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollPolicy {
	#[serde(with = "millis", rename = "initialMs")]
	pub initial: Duration,
	#[serde(with = "millis", rename = "maxMs")]
	pub max: Duration,
	pub multiplier: f64,
}

impl PollPolicy {
	/// Same delay on every retry.
	pub const fn fixed(interval: Duration) -> Self {
		Self {
			initial: interval,
			max: interval,
			multiplier: 1.0,
		}
	}

	/// Manager start-up probing: 100ms doubling to 5s.
	pub const fn availability() -> Self {
		Self {
			initial: Duration::from_millis(100),
			max: Duration::from_secs(5),
			multiplier: 2.0,
		}
	}

	/// Registry polling: 500ms doubling to 5s.
	pub const fn discovery() -> Self {
		Self {
			initial: Duration::from_millis(500),
			max: Duration::from_secs(5),
			multiplier: 2.0,
		}
	}

	pub fn backoff(&self) -> Backoff {
		Backoff::new(*self)
	}
}

/// Delay iterator over a [`PollPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
	policy: PollPolicy,
	next: Duration,
}

impl Backoff {
	/// Shortest delay ever returned, whatever the policy says.
	pub const MIN_DELAY: Duration = Duration::from_millis(10);

	pub fn new(policy: PollPolicy) -> Self {
		let mut backoff = Self { next: Duration::ZERO, policy };
		backoff.reset();
		backoff
	}

	fn max(&self) -> Duration {
		self.policy.max.max(Self::MIN_DELAY)
	}

	pub fn next_delay(&mut self) -> Duration {
		let delay = self.next;
		let max = self.max();
		let multiplier = self.policy.multiplier.max(1.0);
		self.next = Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier).map_or(max, |next| next.clamp(Self::MIN_DELAY, max));
		delay
	}

	pub fn reset(&mut self) {
		self.next = self.policy.initial.clamp(Self::MIN_DELAY, self.max());
	}
}

/// Sleeps for `delay` unless `cancel` fires first. Returns `true` when cancelled.
pub async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
	tokio::select! {
		_ = cancel.cancelled() => true,
		_ = tokio::time::sleep(delay) => false,
	}
}

mod millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
