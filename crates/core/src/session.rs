//! Session controller: start and stop watching one capability path.
//!
//! A session runs as a single worker task:
//!
//! 1. wait for the manager ([`gate::await_available`])
//! 2. find a supporting service ([`discovery::find_service`])
//! 3. open the event channel and subscribe
//! 4. relay events until stopped or the channel is lost
//!
//! The worker owns the channel and subscription, so releasing them happens
//! exactly once, on the worker's way out. [`SessionController::stop`]
//! cancels the worker and waits for it.

use std::collections::BTreeMap;
use std::sync::Arc;

use dc_runtime::Transport;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, Outcome, PollPolicy, sleep_or_cancel};
use crate::channel::EventChannel;
use crate::error::{Error, Result};
use crate::path::PathSpec;
use crate::relay::{self, EventRelay, Notification};
use crate::{discovery, gate};

/// Subscription interval requested when none is configured, in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct SessionConfig {
	pub availability_policy: PollPolicy,
	pub discovery_policy: PollPolicy,
	/// Extra query parameters sent with the subscription, e.g. `interval`.
	pub subscription_params: BTreeMap<String, String>,
	/// Rediscover and resubscribe after the event channel is lost.
	pub restart_on_channel_loss: bool,
	pub notification_capacity: usize,
}

impl SessionConfig {
	pub fn with_interval(mut self, interval_ms: u64) -> Self {
		self.subscription_params.insert("interval".to_string(), interval_ms.to_string());
		self
	}

	pub fn with_restart_on_channel_loss(mut self, restart: bool) -> Self {
		self.restart_on_channel_loss = restart;
		self
	}
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			availability_policy: PollPolicy::availability(),
			discovery_policy: PollPolicy::discovery(),
			subscription_params: BTreeMap::new(),
			restart_on_channel_loss: false,
			notification_capacity: relay::DEFAULT_CAPACITY,
		}
		.with_interval(DEFAULT_INTERVAL_MS)
	}
}

struct ActiveSession {
	spec: PathSpec,
	cancel: CancellationToken,
	worker: JoinHandle<()>,
}

/// Drives at most one watch session against a transport.
pub struct SessionController {
	transport: Arc<dyn Transport>,
	config: SessionConfig,
	relay: EventRelay,
	active: Option<ActiveSession>,
}

impl SessionController {
	pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
		let relay = EventRelay::new(config.notification_capacity);
		Self {
			transport,
			config,
			relay,
			active: None,
		}
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Receives notifications from every session this controller runs.
	pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
		self.relay.subscribe()
	}

	/// `true` while a worker is running.
	pub fn is_active(&self) -> bool {
		self.active.as_ref().is_some_and(|session| !session.worker.is_finished())
	}

	/// Path of the current session, if one was started and not stopped.
	pub fn watching(&self) -> Option<&PathSpec> {
		self.active.as_ref().map(|session| &session.spec)
	}

	/// Parses `path` and starts watching it in the background.
	///
	/// A malformed path fails here and leaves any running session untouched.
	/// Otherwise a running session is stopped before the new one starts.
	pub async fn start(&mut self, path: &str) -> Result<()> {
		let spec = PathSpec::parse(path).inspect_err(|err| warn!(target = "dcwatch.session", error = %err, "rejected watch path"))?;

		if self.active.is_some() {
			info!(target = "dcwatch.session", path = %spec, "replacing running session");
			self.stop().await;
		}

		let cancel = CancellationToken::new();
		let worker = Worker {
			transport: Arc::clone(&self.transport),
			config: self.config.clone(),
			relay: self.relay.clone(),
			spec: spec.clone(),
			cancel: cancel.clone(),
		};
		info!(target = "dcwatch.session", path = %spec, "session started");
		self.active = Some(ActiveSession {
			spec,
			cancel,
			worker: tokio::spawn(worker.run()),
		});
		Ok(())
	}

	/// Cancels the running session and waits until it has released the
	/// subscription and channel. No-op when nothing is running.
	pub async fn stop(&mut self) {
		let Some(session) = self.active.take() else {
			debug!(target = "dcwatch.session", "stop requested with no session");
			return;
		};

		session.cancel.cancel();
		if let Err(err) = session.worker.await {
			error!(target = "dcwatch.session", path = %session.spec, error = %err, "session worker panicked");
		}
		info!(target = "dcwatch.session", path = %session.spec, "session stopped");
	}
}

impl Drop for SessionController {
	fn drop(&mut self) {
		if let Some(session) = &self.active {
			session.cancel.cancel();
		}
	}
}

/// How one watch attempt ended.
enum WatchEnd {
	Cancelled,
	Lost(Error),
}

struct Worker {
	transport: Arc<dyn Transport>,
	config: SessionConfig,
	relay: EventRelay,
	spec: PathSpec,
	cancel: CancellationToken,
}

impl Worker {
	async fn run(self) {
		let mut restarts = self.config.discovery_policy.backoff();

		loop {
			let reason = match self.watch(&mut restarts).await {
				WatchEnd::Cancelled => {
					debug!(target = "dcwatch.session", path = %self.spec, "session cancelled");
					return;
				}
				WatchEnd::Lost(reason) => reason,
			};

			warn!(target = "dcwatch.session", path = %self.spec, error = %reason, "event channel lost");
			self.relay.notify(Notification::ChannelLost { reason: reason.to_string() });
			if !self.config.restart_on_channel_loss {
				return;
			}

			let delay = restarts.next_delay();
			info!(target = "dcwatch.session", path = %self.spec, retry_in = ?delay, "restarting discovery");
			if sleep_or_cancel(&self.cancel, delay).await {
				return;
			}
		}
	}

	/// One pass from the gate to channel loss. `restarts` is reset once subscribed.
	async fn watch(&self, restarts: &mut Backoff) -> WatchEnd {
		self.relay.notify(Notification::WaitingForManager);
		if gate::await_available(self.transport.as_ref(), &self.config.availability_policy, &self.cancel)
			.await
			.is_cancelled()
		{
			return WatchEnd::Cancelled;
		}
		self.relay.notify(Notification::ManagerAvailable);

		self.relay.notify(Notification::WaitingForService { path: self.spec.to_string() });
		let service = match discovery::find_service(self.transport.as_ref(), &self.spec, &self.config.discovery_policy, &self.cancel).await {
			Outcome::Completed(service) => service,
			Outcome::Cancelled => return WatchEnd::Cancelled,
		};
		self.relay.notify(Notification::ServiceAvailable { service: service.clone() });

		let mut channel = match EventChannel::open(Arc::clone(&self.transport), self.relay.clone(), &self.cancel).await {
			Ok(Outcome::Completed(channel)) => channel,
			Ok(Outcome::Cancelled) => return WatchEnd::Cancelled,
			Err(err) => return WatchEnd::Lost(err),
		};

		let subscribed = channel
			.subscribe(&service, &self.spec, &self.config.subscription_params)
			.await
			.map(|handle| handle.target().clone());
		let end = match subscribed {
			Ok(target) => {
				restarts.reset();
				self.relay.notify(Notification::Subscribed { service, target });
				tokio::select! {
					_ = self.cancel.cancelled() => WatchEnd::Cancelled,
					reason = channel.lost() => WatchEnd::Lost(reason),
				}
			}
			Err(err) => WatchEnd::Lost(err),
		};

		channel.close().await;
		end
	}
}
