//! Event WebSocket: greeting, read loop, and event routing.

use std::sync::Arc;

use dc_protocol::{EventMessage, SubscriptionTarget};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Result;
use crate::transport::{ChannelListener, EventListener};

/// Registered event listeners keyed by their subscription target.
pub(crate) type ListenerTable = Arc<RwLock<Vec<(SubscriptionTarget, Arc<dyn EventListener>)>>>;

/// Inserts or replaces the listener for `target`.
pub(crate) fn register(table: &ListenerTable, target: &SubscriptionTarget, listener: Arc<dyn EventListener>) {
	let mut guard = table.write();
	guard.retain(|(existing, _)| existing != target);
	guard.push((target.clone(), listener));
}

/// Removes the listener for `target`, returning whether one was present.
pub(crate) fn unregister(table: &ListenerTable, target: &SubscriptionTarget) -> bool {
	let mut guard = table.write();
	let before = guard.len();
	guard.retain(|(existing, _)| existing != target);
	guard.len() != before
}

/// Delivers `event` to every listener whose target matches, returning the
/// number of listeners reached.
pub(crate) fn dispatch(table: &ListenerTable, event: &EventMessage) -> usize {
	// Listeners run outside the lock so a listener may (un)register.
	let listeners: Vec<Arc<dyn EventListener>> = table
		.read()
		.iter()
		.filter(|(target, _)| target.matches(event))
		.map(|(_, listener)| Arc::clone(listener))
		.collect();

	for listener in &listeners {
		listener.on_event(event.clone());
	}
	listeners.len()
}

enum SocketEnd {
	Closed,
	Failed(String),
}

/// A connected event socket and its read task.
pub(crate) struct EventSocket {
	shutdown: Option<oneshot::Sender<()>>,
	task: JoinHandle<()>,
}

impl EventSocket {
	/// Connects, sends the origin greeting, and spawns the read loop.
	///
	/// `listener.on_open` fires once the greeting is sent. Exactly one of
	/// `on_close` / `on_error` fires when the loop ends.
	pub(crate) async fn connect(url: &Url, origin: &str, table: ListenerTable, listener: Arc<dyn ChannelListener>) -> Result<Self> {
		let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
			Ok((stream, _)) => stream,
			Err(err) => {
				listener.on_error(&err.to_string());
				return Err(err.into());
			}
		};
		let (mut sink, mut source) = stream.split();

		let greeting = serde_json::json!({ "origin": origin }).to_string();
		if let Err(err) = sink.send(Message::Text(greeting.into())).await {
			listener.on_error(&err.to_string());
			return Err(err.into());
		}
		debug!(target = "dcwatch.transport", %url, "event socket open");
		listener.on_open();

		let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
		let task = tokio::spawn(async move {
			let end = loop {
				tokio::select! {
					_ = &mut shutdown_rx => {
						let _ = sink.send(Message::Close(None)).await;
						break SocketEnd::Closed;
					}
					frame = source.next() => match frame {
						Some(Ok(Message::Text(text))) => handle_text(&table, text.as_str()),
						Some(Ok(Message::Close(_))) | None => break SocketEnd::Closed,
						Some(Ok(_)) => {}
						Some(Err(err)) => break SocketEnd::Failed(err.to_string()),
					}
				}
			};

			match end {
				SocketEnd::Closed => listener.on_close(),
				SocketEnd::Failed(reason) => {
					warn!(target = "dcwatch.transport", error = %reason, "event socket failed");
					listener.on_error(&reason);
				}
			}
		});

		Ok(Self {
			shutdown: Some(shutdown_tx),
			task,
		})
	}

	pub(crate) fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Requests a close handshake and waits for the read loop to end.
	pub(crate) async fn close(mut self) {
		if let Some(shutdown) = self.shutdown.take() {
			let _ = shutdown.send(());
		}
		let _ = self.task.await;
	}
}

fn handle_text(table: &ListenerTable, text: &str) {
	let event = match serde_json::from_str::<EventMessage>(text) {
		Ok(event) => event,
		Err(err) => {
			debug!(target = "dcwatch.transport", error = %err, "ignoring non-JSON frame");
			return;
		}
	};

	if !event.is_event() {
		trace!(target = "dcwatch.transport", frame = %text, "ignoring non-event frame");
		return;
	}

	if dispatch(table, &event) == 0 {
		debug!(
			target = "dcwatch.transport",
			service_id = ?event.service_id,
			profile = ?event.profile,
			attribute = ?event.attribute,
			"event matched no listener"
		);
	}
}
