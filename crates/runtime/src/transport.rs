//! The transport contract.

use std::sync::Arc;

use async_trait::async_trait;
use dc_protocol::{EventMessage, Manifest, ServiceEntry, SubscriptionTarget};

use crate::error::Result;

/// Observer for event-channel lifecycle.
///
/// Callbacks are observational and may run on the transport's own task; they
/// must return quickly.
pub trait ChannelListener: Send + Sync {
	fn on_open(&self);
	fn on_close(&self);
	fn on_error(&self, error: &str);
}

/// Receiver of pushed events for one registration.
///
/// Invoked from the transport's delivery task in delivery order; must not
/// block.
pub trait EventListener: Send + Sync {
	fn on_event(&self, event: EventMessage);
}

/// Request/response and push-event operations offered by a remote manager.
///
/// Every fallible operation maps a non-OK result code to
/// [`Error::Rejected`](crate::Error::Rejected).
#[async_trait]
pub trait Transport: Send + Sync {
	/// Checks whether the manager is up.
	async fn availability(&self) -> Result<()>;

	/// Lists registered services in registry order.
	async fn service_discovery(&self) -> Result<Vec<ServiceEntry>>;

	/// Fetches the capability manifest of one service.
	async fn service_information(&self, service_id: &str) -> Result<Manifest>;

	/// Opens the persistent event channel; lifecycle is reported to `listener`.
	async fn connect_event_channel(&self, listener: Arc<dyn ChannelListener>) -> Result<()>;

	/// Closes the event channel if open.
	async fn disconnect_event_channel(&self) -> Result<()>;

	/// Registers an event subscription and routes matching events to `listener`.
	async fn add_event_listener(&self, target: &SubscriptionTarget, listener: Arc<dyn EventListener>) -> Result<()>;

	/// Cancels an event subscription and drops its listener.
	async fn remove_event_listener(&self, target: &SubscriptionTarget) -> Result<()>;
}
