//! Event relay: forwards subscribed events and session progress to consumers.
//!
//! Consumers hold a [`broadcast::Receiver`]. Delivery never blocks the
//! transport: a consumer that falls more than the channel capacity behind
//! loses the oldest notifications and sees `RecvError::Lagged`.

use dc_protocol::{EventMessage, SubscriptionTarget};
use dc_runtime::EventListener;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::channel::ChannelState;
use crate::discovery::ServiceDescriptor;

/// Topic of [`Notification::Event`].
pub const EVENT_TOPIC: &str = "event";

pub const DEFAULT_CAPACITY: usize = 256;

/// Progress and data published by a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topic", content = "data", rename_all = "kebab-case")]
pub enum Notification {
	WaitingForManager,
	ManagerAvailable,
	WaitingForService { path: String },
	ServiceAvailable { service: ServiceDescriptor },
	Subscribed { service: ServiceDescriptor, target: SubscriptionTarget },
	Event(EventMessage),
	ChannelStateChanged(ChannelState),
	ChannelLost { reason: String },
}

impl Notification {
	pub fn topic(&self) -> &'static str {
		match self {
			Notification::WaitingForManager => "waiting-for-manager",
			Notification::ManagerAvailable => "manager-available",
			Notification::WaitingForService { .. } => "waiting-for-service",
			Notification::ServiceAvailable { .. } => "service-available",
			Notification::Subscribed { .. } => "subscribed",
			Notification::Event(_) => EVENT_TOPIC,
			Notification::ChannelStateChanged(_) => "channel-state-changed",
			Notification::ChannelLost { .. } => "channel-lost",
		}
	}

	pub fn as_event(&self) -> Option<&EventMessage> {
		match self {
			Notification::Event(event) => Some(event),
			_ => None,
		}
	}
}

/// Fan-out point for [`Notification`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventRelay {
	sender: broadcast::Sender<Notification>,
}

impl EventRelay {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
		self.sender.subscribe()
	}

	pub fn receiver_count(&self) -> usize {
		self.sender.receiver_count()
	}

	/// Publishes `notification`; dropped silently when nobody listens.
	pub fn notify(&self, notification: Notification) {
		let topic = notification.topic();
		match self.sender.send(notification) {
			Ok(receivers) => trace!(target = "dcwatch.relay", topic, receivers, "notified"),
			Err(_) => trace!(target = "dcwatch.relay", topic, "no receivers"),
		}
	}
}

impl Default for EventRelay {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

impl EventListener for EventRelay {
	fn on_event(&self, event: EventMessage) {
		debug!(
			target = "dcwatch.relay",
			service_id = event.service_id.as_deref().unwrap_or_default(),
			attribute = event.attribute.as_deref().unwrap_or_default(),
			"event received"
		);
		self.notify(Notification::Event(event));
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn orientation_event() -> EventMessage {
		serde_json::from_value(json!({
			"serviceId": "host.1",
			"profile": "deviceOrientation",
			"attribute": "onDeviceOrientation",
			"orientation": { "accelerationIncludingGravity": { "x": 1.0, "y": 2.0, "z": 3.0 } }
		}))
		.unwrap()
	}

	#[test]
	fn events_carry_the_event_topic() {
		let relay = EventRelay::default();
		let mut rx = relay.subscribe();
		relay.on_event(orientation_event());

		let notification = rx.try_recv().unwrap();
		assert_eq!(notification.topic(), EVENT_TOPIC);
		assert_eq!(notification.as_event(), Some(&orientation_event()));
	}

	#[test]
	fn order_is_preserved() {
		let relay = EventRelay::default();
		let mut rx = relay.subscribe();
		relay.notify(Notification::WaitingForManager);
		relay.notify(Notification::ManagerAvailable);
		relay.on_event(orientation_event());

		let topics: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|n| n.topic()).collect();
		assert_eq!(topics, ["waiting-for-manager", "manager-available", "event"]);
	}

	#[test]
	fn notify_without_receivers_is_harmless() {
		let relay = EventRelay::new(4);
		relay.notify(Notification::ManagerAvailable);
		assert_eq!(relay.receiver_count(), 0);
	}

	#[test]
	fn serialized_tag_matches_topic() {
		let notifications = [
			Notification::WaitingForService { path: "/gotapi/battery".into() },
			Notification::ChannelStateChanged(ChannelState::Open),
			Notification::Event(orientation_event()),
		];
		for notification in notifications {
			let json = serde_json::to_value(&notification).unwrap();
			assert_eq!(json["topic"], notification.topic());
		}
	}
}
