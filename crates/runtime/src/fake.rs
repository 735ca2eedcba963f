//! Fake transport for unit testing discovery, subscription, and event relay.
//!
//! Provides an in-memory scripted [`Transport`] so watcher logic can be
//! exercised without a manager.
//!
//! # Example
//!
//! ```ignore
//! let (transport, controller) = FakeTransportBuilder::new()
//!     .unavailable_for(2)
//!     .listing(vec![ServiceEntry::new("host.1", "Host")])
//!     .manifest("host.1", manifest)
//!     .build();
//!
//! // ... start a session against `transport` ...
//!
//! controller.wait_for(|calls| calls.iter().any(FakeCall::is_subscribe)).await;
//! controller.emit_event(event);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use dc_protocol::{EventMessage, Manifest, ServiceEntry, SubscriptionTarget};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::transport::{ChannelListener, EventListener, Transport};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
	Availability,
	ServiceDiscovery,
	ServiceInformation(String),
	ConnectEventChannel,
	DisconnectEventChannel,
	AddEventListener(SubscriptionTarget),
	RemoveEventListener(SubscriptionTarget),
}

impl FakeCall {
	pub fn is_discovery(&self) -> bool {
		matches!(self, FakeCall::ServiceDiscovery)
	}

	pub fn is_subscribe(&self) -> bool {
		matches!(self, FakeCall::AddEventListener(_))
	}

	pub fn is_unsubscribe(&self) -> bool {
		matches!(self, FakeCall::RemoveEventListener(_))
	}
}

#[derive(Default)]
struct FakeState {
	calls: Vec<FakeCall>,
	available: bool,
	unavailable_remaining: usize,
	discovery_failures_remaining: usize,
	listings: VecDeque<Vec<ServiceEntry>>,
	manifests: HashMap<String, Manifest>,
	connect_error: Option<String>,
	open_on_connect: bool,
	subscribe_error: Option<String>,
	channel_listener: Option<Arc<dyn ChannelListener>>,
	event_listeners: Vec<(SubscriptionTarget, Arc<dyn EventListener>)>,
}

/// Builder for creating fake transport instances.
pub struct FakeTransportBuilder {
	state: FakeState,
}

impl FakeTransportBuilder {
	/// A transport that is available, lists nothing, and opens channels at once.
	pub fn new() -> Self {
		Self {
			state: FakeState {
				available: true,
				open_on_connect: true,
				..Default::default()
			},
		}
	}

	/// Fails the first `attempts` availability checks.
	pub fn unavailable_for(mut self, attempts: usize) -> Self {
		self.state.unavailable_remaining = attempts;
		self
	}

	/// Fails every availability check until the controller flips it.
	pub fn unavailable(mut self) -> Self {
		self.state.available = false;
		self
	}

	/// Fails the first `attempts` registry listings.
	pub fn discovery_failures(mut self, attempts: usize) -> Self {
		self.state.discovery_failures_remaining = attempts;
		self
	}

	/// Queues a registry listing; the last queued listing repeats forever.
	pub fn listing(mut self, services: Vec<ServiceEntry>) -> Self {
		self.state.listings.push_back(services);
		self
	}

	/// Sets the manifest returned for `service_id`; services without one are rejected.
	pub fn manifest(mut self, service_id: impl Into<String>, manifest: Manifest) -> Self {
		self.state.manifests.insert(service_id.into(), manifest);
		self
	}

	/// Makes channel connection fail with `reason`.
	pub fn connect_error(mut self, reason: impl Into<String>) -> Self {
		self.state.connect_error = Some(reason.into());
		self
	}

	/// Leaves connected channels in the connecting state until the controller opens them.
	pub fn defer_open(mut self) -> Self {
		self.state.open_on_connect = false;
		self
	}

	/// Makes every subscribe request fail with `reason`.
	pub fn subscribe_error(mut self, reason: impl Into<String>) -> Self {
		self.state.subscribe_error = Some(reason.into());
		self
	}

	/// Builds the transport and a controller sharing its state.
	pub fn build(self) -> (Arc<FakeTransport>, FakeTransportController) {
		let state = Arc::new(Mutex::new(self.state));
		let notify = Arc::new(Notify::new());

		let transport = Arc::new(FakeTransport {
			state: Arc::clone(&state),
			notify: Arc::clone(&notify),
		});
		let controller = FakeTransportController { state, notify };
		(transport, controller)
	}
}

impl Default for FakeTransportBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// In-memory scripted transport.
pub struct FakeTransport {
	state: Arc<Mutex<FakeState>>,
	notify: Arc<Notify>,
}

impl FakeTransport {
	fn record(&self, call: FakeCall) {
		self.state.lock().calls.push(call);
		self.notify.notify_waiters();
	}
}

#[async_trait]
impl Transport for FakeTransport {
	async fn availability(&self) -> Result<()> {
		self.record(FakeCall::Availability);
		let mut state = self.state.lock();
		if state.unavailable_remaining > 0 {
			state.unavailable_remaining -= 1;
			return Err(Error::rejected("availability", "manager starting"));
		}
		if state.available {
			Ok(())
		} else {
			Err(Error::rejected("availability", "manager unavailable"))
		}
	}

	async fn service_discovery(&self) -> Result<Vec<ServiceEntry>> {
		self.record(FakeCall::ServiceDiscovery);
		let mut state = self.state.lock();
		if state.discovery_failures_remaining > 0 {
			state.discovery_failures_remaining -= 1;
			return Err(Error::rejected("servicediscovery", "registry busy"));
		}
		let listing = if state.listings.len() > 1 {
			state.listings.pop_front().unwrap_or_default()
		} else {
			state.listings.front().cloned().unwrap_or_default()
		};
		Ok(listing)
	}

	async fn service_information(&self, service_id: &str) -> Result<Manifest> {
		self.record(FakeCall::ServiceInformation(service_id.to_string()));
		self.state
			.lock()
			.manifests
			.get(service_id)
			.cloned()
			.ok_or_else(|| Error::rejected("serviceinformation", format!("unknown service '{service_id}'")))
	}

	async fn connect_event_channel(&self, listener: Arc<dyn ChannelListener>) -> Result<()> {
		self.record(FakeCall::ConnectEventChannel);
		let (connect_error, open) = {
			let mut state = self.state.lock();
			state.channel_listener = Some(Arc::clone(&listener));
			(state.connect_error.clone(), state.open_on_connect)
		};

		if let Some(reason) = connect_error {
			listener.on_error(&reason);
			return Err(Error::ChannelClosed);
		}
		if open {
			listener.on_open();
		}
		Ok(())
	}

	async fn disconnect_event_channel(&self) -> Result<()> {
		self.record(FakeCall::DisconnectEventChannel);
		let listener = self.state.lock().channel_listener.take();
		match listener {
			Some(listener) => {
				listener.on_close();
				Ok(())
			}
			None => Err(Error::NotConnected),
		}
	}

	async fn add_event_listener(&self, target: &SubscriptionTarget, listener: Arc<dyn EventListener>) -> Result<()> {
		self.record(FakeCall::AddEventListener(target.clone()));
		let mut state = self.state.lock();
		if let Some(reason) = &state.subscribe_error {
			return Err(Error::rejected("subscribe", reason.clone()));
		}
		state.event_listeners.retain(|(existing, _)| existing != target);
		state.event_listeners.push((target.clone(), listener));
		Ok(())
	}

	async fn remove_event_listener(&self, target: &SubscriptionTarget) -> Result<()> {
		self.record(FakeCall::RemoveEventListener(target.clone()));
		self.state.lock().event_listeners.retain(|(existing, _)| existing != target);
		Ok(())
	}
}

/// Controller for scripting the fake and inspecting recorded calls.
#[derive(Clone)]
pub struct FakeTransportController {
	state: Arc<Mutex<FakeState>>,
	notify: Arc<Notify>,
}

impl FakeTransportController {
	/// Snapshot of every call so far, in order.
	pub fn calls(&self) -> Vec<FakeCall> {
		self.state.lock().calls.clone()
	}

	pub fn count(&self, predicate: impl Fn(&FakeCall) -> bool) -> usize {
		self.state.lock().calls.iter().filter(|call| predicate(call)).count()
	}

	/// Waits until `predicate` holds for the recorded calls.
	pub async fn wait_for(&self, predicate: impl Fn(&[FakeCall]) -> bool) {
		loop {
			let notified = self.notify.notified();
			if predicate(&self.state.lock().calls) {
				return;
			}
			notified.await;
		}
	}

	pub fn set_available(&self, available: bool) {
		self.state.lock().available = available;
	}

	/// Replaces all queued listings with `services`.
	pub fn set_listing(&self, services: Vec<ServiceEntry>) {
		let mut state = self.state.lock();
		state.listings.clear();
		state.listings.push_back(services);
	}

	pub fn set_subscribe_error(&self, reason: Option<String>) {
		self.state.lock().subscribe_error = reason;
	}

	/// Number of live event registrations.
	pub fn listener_count(&self) -> usize {
		self.state.lock().event_listeners.len()
	}

	/// Delivers `event` to matching listeners, returning how many were reached.
	pub fn emit_event(&self, event: EventMessage) -> usize {
		let listeners: Vec<Arc<dyn EventListener>> = self
			.state
			.lock()
			.event_listeners
			.iter()
			.filter(|(target, _)| target.matches(&event))
			.map(|(_, listener)| Arc::clone(listener))
			.collect();

		for listener in &listeners {
			listener.on_event(event.clone());
		}
		listeners.len()
	}

	/// Reports the channel open to its listener.
	pub fn open_channel(&self) {
		if let Some(listener) = self.channel_listener() {
			listener.on_open();
		}
	}

	/// Reports a remote close to the channel listener.
	pub fn close_channel(&self) {
		let listener = self.state.lock().channel_listener.take();
		if let Some(listener) = listener {
			listener.on_close();
		}
	}

	/// Reports a channel error to the channel listener.
	pub fn fail_channel(&self, reason: &str) {
		let listener = self.state.lock().channel_listener.take();
		if let Some(listener) = listener {
			listener.on_error(reason);
		}
	}

	fn channel_listener(&self) -> Option<Arc<dyn ChannelListener>> {
		self.state.lock().channel_listener.clone()
	}
}
