//! Event channel manager: owns the persistent event channel and the single
//! subscription registered on it.
//!
//! ```text
//! Closed -> Connecting -> Open -> Closed
//!                 \          \
//!                  +-> Failed +-> Failed
//! ```
//!
//! State is driven by the transport's lifecycle callbacks and published on a
//! [`watch`] channel so the session can wait for loss.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dc_protocol::SubscriptionTarget;
use dc_runtime::{ChannelListener, Transport};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Outcome;
use crate::discovery::ServiceDescriptor;
use crate::error::{Error, Result};
use crate::path::PathSpec;
use crate::relay::{EventRelay, Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelState {
	Closed,
	Connecting,
	Open,
	Failed,
}

impl ChannelState {
	/// `Closed` or `Failed`.
	pub fn is_terminal(self) -> bool {
		matches!(self, ChannelState::Closed | ChannelState::Failed)
	}
}

impl fmt::Display for ChannelState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ChannelState::Closed => "closed",
			ChannelState::Connecting => "connecting",
			ChannelState::Open => "open",
			ChannelState::Failed => "failed",
		})
	}
}

/// Lifecycle listener handed to the transport.
struct ChannelStateTracker {
	state: watch::Sender<ChannelState>,
	last_error: Mutex<Option<String>>,
	relay: EventRelay,
}

impl ChannelStateTracker {
	fn transition(&self, next: ChannelState) {
		let previous = self.state.send_replace(next);
		if previous == next {
			return;
		}
		debug!(target = "dcwatch.channel", from = %previous, to = %next, "channel state changed");
		self.relay.notify(Notification::ChannelStateChanged(next));
	}

	fn failure_reason(&self) -> Option<String> {
		self.last_error.lock().clone()
	}
}

impl ChannelListener for ChannelStateTracker {
	fn on_open(&self) {
		info!(target = "dcwatch.channel", "event channel open");
		self.transition(ChannelState::Open);
	}

	fn on_close(&self) {
		info!(target = "dcwatch.channel", "event channel closed");
		self.transition(ChannelState::Closed);
	}

	fn on_error(&self, error: &str) {
		warn!(target = "dcwatch.channel", error, "event channel error");
		*self.last_error.lock() = Some(error.to_string());
		self.transition(ChannelState::Failed);
	}
}

/// Opaque token for the active subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
	target: SubscriptionTarget,
	service: ServiceDescriptor,
}

impl SubscriptionHandle {
	pub fn target(&self) -> &SubscriptionTarget {
		&self.target
	}

	pub fn service(&self) -> &ServiceDescriptor {
		&self.service
	}
}

/// An opened event channel.
///
/// Dropping it does not disconnect; call [`EventChannel::close`].
pub struct EventChannel {
	transport: Arc<dyn Transport>,
	tracker: Arc<ChannelStateTracker>,
	state: watch::Receiver<ChannelState>,
	relay: EventRelay,
	subscription: Option<SubscriptionHandle>,
}

impl EventChannel {
	/// Connects the event channel and waits until the transport reports it open.
	///
	/// Returns [`Outcome::Cancelled`] if `cancel` fires while connecting; the
	/// half-open channel is disconnected first.
	pub async fn open(transport: Arc<dyn Transport>, relay: EventRelay, cancel: &CancellationToken) -> Result<Outcome<Self>> {
		let (sender, state) = watch::channel(ChannelState::Closed);
		let tracker = Arc::new(ChannelStateTracker {
			state: sender,
			last_error: Mutex::new(None),
			relay: relay.clone(),
		});
		tracker.transition(ChannelState::Connecting);

		let listener: Arc<dyn ChannelListener> = tracker.clone();
		if let Err(err) = transport.connect_event_channel(listener).await {
			tracker.transition(ChannelState::Failed);
			let reason = tracker.failure_reason().unwrap_or_else(|| err.to_string());
			return Err(Error::ChannelFailed(reason));
		}

		let mut channel = Self {
			transport,
			tracker,
			state,
			relay,
			subscription: None,
		};

		let settled = tokio::select! {
			_ = cancel.cancelled() => None,
			state = channel.settled() => Some(state),
		};
		match settled {
			Some(ChannelState::Open) => Ok(Outcome::Completed(channel)),
			Some(_) => {
				let err = channel.loss();
				channel.disconnect().await;
				Err(err)
			}
			None => {
				debug!(target = "dcwatch.channel", "cancelled while connecting");
				channel.disconnect().await;
				Ok(Outcome::Cancelled)
			}
		}
	}

	pub fn state(&self) -> ChannelState {
		*self.state.borrow()
	}

	pub fn subscription(&self) -> Option<&SubscriptionHandle> {
		self.subscription.as_ref()
	}

	/// Registers the subscription for `spec` on `service`, routing its events
	/// to the relay.
	///
	/// Requires the channel to be [`ChannelState::Open`]. A previous
	/// subscription on this channel is released first.
	pub async fn subscribe(&mut self, service: &ServiceDescriptor, spec: &PathSpec, params: &BTreeMap<String, String>) -> Result<&SubscriptionHandle> {
		let state = self.state();
		if state != ChannelState::Open {
			return Err(Error::NotOpen(state));
		}
		if self.subscription.is_some() {
			self.unsubscribe().await?;
		}

		let target = spec.target(&service.id).with_params(params.clone());
		self.transport
			.add_event_listener(&target, Arc::new(self.relay.clone()))
			.await
			.map_err(|source| Error::SubscribeFailed {
				target: target.to_string(),
				source,
			})?;

		info!(target = "dcwatch.channel", %target, %service, "subscribed");
		Ok(self.subscription.insert(SubscriptionHandle {
			target,
			service: service.clone(),
		}))
	}

	/// Releases the active subscription, if any.
	pub async fn unsubscribe(&mut self) -> Result<()> {
		let Some(handle) = self.subscription.take() else {
			return Ok(());
		};
		self.transport.remove_event_listener(&handle.target).await?;
		debug!(target = "dcwatch.channel", target = %handle.target, "unsubscribed");
		Ok(())
	}

	/// Waits until the channel is closed or fails, returning why.
	pub async fn lost(&mut self) -> Error {
		match self.state.wait_for(|state| state.is_terminal()).await {
			Ok(state) if *state == ChannelState::Failed => {}
			_ => return Error::ChannelClosed,
		}
		self.loss()
	}

	/// Releases the subscription and disconnects.
	///
	/// Both steps are attempted; release failures are logged, not returned.
	pub async fn close(mut self) {
		if let Err(err) = self.unsubscribe().await {
			warn!(target = "dcwatch.channel", error = %err, "failed to release subscription");
		}
		self.disconnect().await;
	}

	async fn disconnect(&self) {
		match self.transport.disconnect_event_channel().await {
			Ok(()) => {}
			Err(dc_runtime::Error::NotConnected) => debug!(target = "dcwatch.channel", "channel already disconnected"),
			Err(err) => warn!(target = "dcwatch.channel", error = %err, "failed to disconnect event channel"),
		}
		self.tracker.transition(ChannelState::Closed);
	}

	async fn settled(&mut self) -> ChannelState {
		match self.state.wait_for(|state| *state != ChannelState::Connecting).await {
			Ok(state) => *state,
			Err(_) => ChannelState::Closed,
		}
	}

	fn loss(&self) -> Error {
		match self.state() {
			ChannelState::Failed => Error::ChannelFailed(self.tracker.failure_reason().unwrap_or_else(|| "unknown error".to_string())),
			_ => Error::ChannelClosed,
		}
	}
}

impl fmt::Debug for EventChannel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventChannel")
			.field("state", &self.state())
			.field("subscription", &self.subscription)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use dc_protocol::EventMessage;
	use dc_runtime::fake::{FakeCall, FakeTransportBuilder};

	use super::*;

	fn spec() -> PathSpec {
		PathSpec::parse("/gotapi/deviceOrientation/onDeviceOrientation").unwrap()
	}

	fn host() -> ServiceDescriptor {
		ServiceDescriptor::new("host.1", "Host")
	}

	fn interval() -> BTreeMap<String, String> {
		BTreeMap::from([("interval".to_string(), "500".to_string())])
	}

	async fn open(transport: Arc<dyn Transport>, relay: &EventRelay) -> EventChannel {
		EventChannel::open(transport, relay.clone(), &CancellationToken::new())
			.await
			.unwrap()
			.completed()
			.unwrap()
	}

	#[tokio::test]
	async fn open_reports_open_state() {
		let (transport, _controller) = FakeTransportBuilder::new().build();
		let relay = EventRelay::default();
		let mut rx = relay.subscribe();

		let channel = open(transport, &relay).await;
		assert_eq!(channel.state(), ChannelState::Open);
		assert_eq!(rx.try_recv().unwrap(), Notification::ChannelStateChanged(ChannelState::Connecting));
		assert_eq!(rx.try_recv().unwrap(), Notification::ChannelStateChanged(ChannelState::Open));
	}

	#[tokio::test]
	async fn connect_failure_carries_listener_reason() {
		let (transport, _controller) = FakeTransportBuilder::new().connect_error("refused").build();
		let err = EventChannel::open(transport, EventRelay::default(), &CancellationToken::new()).await.unwrap_err();
		assert!(matches!(&err, Error::ChannelFailed(reason) if reason == "refused"), "{err}");
	}

	#[tokio::test]
	async fn waits_for_deferred_open() {
		let (transport, controller) = FakeTransportBuilder::new().defer_open().build();
		let opening = tokio::spawn(async move { EventChannel::open(transport, EventRelay::default(), &CancellationToken::new()).await });

		controller.wait_for(|calls| calls.contains(&FakeCall::ConnectEventChannel)).await;
		controller.open_channel();

		let channel = opening.await.unwrap().unwrap().completed().unwrap();
		assert_eq!(channel.state(), ChannelState::Open);
	}

	#[tokio::test]
	async fn cancel_while_connecting_disconnects() {
		let (transport, controller) = FakeTransportBuilder::new().defer_open().build();
		let cancel = CancellationToken::new();
		let opening = tokio::spawn({
			let cancel = cancel.clone();
			async move { EventChannel::open(transport, EventRelay::default(), &cancel).await }
		});

		controller.wait_for(|calls| calls.contains(&FakeCall::ConnectEventChannel)).await;
		cancel.cancel();

		assert!(opening.await.unwrap().unwrap().is_cancelled());
		assert_eq!(controller.count(|call| *call == FakeCall::DisconnectEventChannel), 1);
	}

	#[tokio::test]
	async fn subscribe_builds_target_with_params() {
		let (transport, controller) = FakeTransportBuilder::new().build();
		let relay = EventRelay::default();
		let mut channel = open(transport, &relay).await;

		let handle = channel.subscribe(&host(), &spec(), &interval()).await.unwrap().clone();
		assert_eq!(handle.target().path(), "/gotapi/deviceOrientation/onDeviceOrientation");
		assert_eq!(handle.target().service_id, "host.1");
		assert_eq!(handle.target().params["interval"], "500");
		assert_eq!(handle.service(), &host());
		assert!(controller.calls().contains(&FakeCall::AddEventListener(handle.target().clone())));

		let mut rx = relay.subscribe();
		let event = EventMessage {
			service_id: Some("host.1".into()),
			profile: Some("deviceOrientation".into()),
			attribute: Some("onDeviceOrientation".into()),
			..Default::default()
		};
		assert_eq!(controller.emit_event(event.clone()), 1);
		assert_eq!(rx.try_recv().unwrap(), Notification::Event(event));
	}

	#[tokio::test]
	async fn subscribe_requires_open_channel() {
		let (transport, controller) = FakeTransportBuilder::new().build();
		let mut channel = open(transport, &EventRelay::default()).await;
		controller.close_channel();

		let err = channel.subscribe(&host(), &spec(), &interval()).await.unwrap_err();
		assert!(matches!(err, Error::NotOpen(ChannelState::Closed)), "{err}");
		assert_eq!(controller.count(FakeCall::is_subscribe), 0);
	}

	#[tokio::test]
	async fn subscribe_failure_is_reported() {
		let (transport, _controller) = FakeTransportBuilder::new().subscribe_error("no such attribute").build();
		let mut channel = open(transport, &EventRelay::default()).await;

		let err = channel.subscribe(&host(), &spec(), &interval()).await.unwrap_err();
		assert!(matches!(err, Error::SubscribeFailed { .. }), "{err}");
		assert!(channel.subscription().is_none());
	}

	#[tokio::test]
	async fn close_releases_subscription_then_disconnects() {
		let (transport, controller) = FakeTransportBuilder::new().build();
		let mut channel = open(transport, &EventRelay::default()).await;
		channel.subscribe(&host(), &spec(), &interval()).await.unwrap();

		channel.close().await;
		let tail: Vec<_> = controller.calls().into_iter().rev().take(2).collect();
		assert!(tail[1].is_unsubscribe());
		assert_eq!(tail[0], FakeCall::DisconnectEventChannel);
		assert_eq!(controller.listener_count(), 0);
	}

	#[tokio::test]
	async fn lost_reports_failure_reason() {
		let (transport, controller) = FakeTransportBuilder::new().build();
		let mut channel = open(transport, &EventRelay::default()).await;

		controller.fail_channel("socket reset");
		let err = channel.lost().await;
		assert!(matches!(&err, Error::ChannelFailed(reason) if reason == "socket reset"), "{err}");
	}
}
