//! HTTP + WebSocket transport for a Device Connect style manager.
//!
//! Requests:
//! * `GET /gotapi/availability`
//! * `GET /gotapi/servicediscovery`
//! * `GET /gotapi/serviceinformation?serviceId=...`
//! * `PUT` / `DELETE /{api}/{profile}[/{interface}]/{attribute}?serviceId=...` to
//!   register or cancel an event subscription
//!
//! Events arrive on `ws(s)://host/gotapi/websocket` after an
//! `{"origin": ...}` greeting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dc_protocol::{
	AvailabilityResponse, CommandResponse, Manifest, ManifestShape, ResponseStatus, ServiceDiscoveryResponse, ServiceEntry, ServiceInformationResponse,
	SubscriptionTarget,
};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{ChannelListener, EventListener, Transport};
use crate::websocket::{self, EventSocket, ListenerTable};

/// Header carrying the application origin on every request.
pub const ORIGIN_HEADER: &str = "X-GotAPI-Origin";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:4035";
pub const DEFAULT_ORIGIN: &str = "dcwatch";

const AVAILABILITY_PATH: &str = "/gotapi/availability";
const SERVICE_DISCOVERY_PATH: &str = "/gotapi/servicediscovery";
const SERVICE_INFORMATION_PATH: &str = "/gotapi/serviceinformation";
const WEBSOCKET_PATH: &str = "/gotapi/websocket";

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
	/// Manager base URL, e.g. `http://localhost:4035`.
	pub endpoint: String,
	/// Origin announced in [`ORIGIN_HEADER`] and the WebSocket greeting.
	pub origin: String,
	/// Per-request timeout.
	pub request_timeout: Duration,
	/// Manifest shape the manager emits.
	pub manifest_shape: ManifestShape,
}

impl Default for HttpTransportConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_ENDPOINT.to_string(),
			origin: DEFAULT_ORIGIN.to_string(),
			request_timeout: Duration::from_secs(5),
			manifest_shape: ManifestShape::default(),
		}
	}
}

/// [`Transport`] over HTTP requests and an event WebSocket.
pub struct HttpTransport {
	config: HttpTransportConfig,
	base: Url,
	http: reqwest::Client,
	listeners: ListenerTable,
	socket: Mutex<Option<EventSocket>>,
}

impl HttpTransport {
	pub fn new(config: HttpTransportConfig) -> Result<Self> {
		let base = Url::parse(&config.endpoint)?;
		if !matches!(base.scheme(), "http" | "https") {
			return Err(Error::Endpoint(format!("expected http(s) URL, got '{}'", config.endpoint)));
		}
		let http = reqwest::Client::builder().timeout(config.request_timeout).build()?;

		Ok(Self {
			config,
			base,
			http,
			listeners: ListenerTable::default(),
			socket: Mutex::new(None),
		})
	}

	pub fn config(&self) -> &HttpTransportConfig {
		&self.config
	}

	fn url(&self, path: &str) -> Result<Url> {
		Ok(self.base.join(path)?)
	}

	fn websocket_url(&self) -> Result<Url> {
		let mut url = self.url(WEBSOCKET_PATH)?;
		let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
		url.set_scheme(scheme)
			.map_err(|_| Error::Endpoint(format!("cannot derive WebSocket URL from '{}'", self.config.endpoint)))?;
		Ok(url)
	}

	fn target_url(&self, target: &SubscriptionTarget) -> Result<Url> {
		let mut url = self.url(&target.path())?;
		{
			let mut query = url.query_pairs_mut();
			query.append_pair("serviceId", &target.service_id);
			for (key, value) in &target.params {
				query.append_pair(key, value);
			}
		}
		Ok(url)
	}

	async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
		let response = request.header(ORIGIN_HEADER, &self.config.origin).send().await?;
		let status = response.status();
		let body = response.text().await?;
		serde_json::from_str(&body).map_err(|err| Error::InvalidResponse(format!("HTTP {status}: {err}")))
	}
}

fn ensure_ok(operation: &'static str, status: &ResponseStatus) -> Result<()> {
	if status.is_ok() {
		Ok(())
	} else {
		Err(Error::Rejected {
			operation,
			code: status.result,
			message: status.describe(),
		})
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn availability(&self) -> Result<()> {
		let url = self.url(AVAILABILITY_PATH)?;
		let response: AvailabilityResponse = self.send_json(self.http.get(url)).await?;
		ensure_ok("availability", &response.status)
	}

	async fn service_discovery(&self) -> Result<Vec<ServiceEntry>> {
		let url = self.url(SERVICE_DISCOVERY_PATH)?;
		let response: ServiceDiscoveryResponse = self.send_json(self.http.get(url)).await?;
		ensure_ok("servicediscovery", &response.status)?;
		Ok(response.entries())
	}

	async fn service_information(&self, service_id: &str) -> Result<Manifest> {
		let mut url = self.url(SERVICE_INFORMATION_PATH)?;
		url.query_pairs_mut().append_pair("serviceId", service_id);
		let response: ServiceInformationResponse = self.send_json(self.http.get(url)).await?;
		ensure_ok("serviceinformation", &response.status)?;

		let shape = self.config.manifest_shape;
		response
			.manifest(shape)
			.ok_or_else(|| Error::InvalidResponse(format!("serviceinformation for '{service_id}' carries no {shape} manifest")))
	}

	async fn connect_event_channel(&self, listener: Arc<dyn ChannelListener>) -> Result<()> {
		let mut slot = self.socket.lock().await;
		if let Some(previous) = slot.take() {
			debug!(target = "dcwatch.transport", finished = previous.is_finished(), "replacing event socket");
			previous.close().await;
		}

		let url = self.websocket_url()?;
		let socket = EventSocket::connect(&url, &self.config.origin, Arc::clone(&self.listeners), listener).await?;
		*slot = Some(socket);
		Ok(())
	}

	async fn disconnect_event_channel(&self) -> Result<()> {
		let socket = self.socket.lock().await.take();
		match socket {
			Some(socket) => {
				socket.close().await;
				Ok(())
			}
			None => Err(Error::NotConnected),
		}
	}

	async fn add_event_listener(&self, target: &SubscriptionTarget, listener: Arc<dyn EventListener>) -> Result<()> {
		let url = self.target_url(target)?;
		// Registered before the request: the manager may push as soon as it accepts.
		websocket::register(&self.listeners, target, listener);

		let result = match self.send_json::<CommandResponse>(self.http.put(url)).await {
			Ok(response) => ensure_ok("subscribe", &response.status),
			Err(err) => Err(err),
		};
		if result.is_err() {
			websocket::unregister(&self.listeners, target);
		} else {
			info!(target = "dcwatch.transport", %target, "event registered");
		}
		result
	}

	async fn remove_event_listener(&self, target: &SubscriptionTarget) -> Result<()> {
		websocket::unregister(&self.listeners, target);

		let url = self.target_url(target)?;
		let response: CommandResponse = self.send_json(self.http.delete(url)).await?;
		ensure_ok("unsubscribe", &response.status)?;
		info!(target = "dcwatch.transport", %target, "event unregistered");
		Ok(())
	}
}
