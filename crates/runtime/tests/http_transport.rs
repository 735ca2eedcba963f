//! Tests for HttpTransport against a local manager stub.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dc_protocol::{EventMessage, Manifest, ManifestShape, SubscriptionTarget};
use dc_runtime::http::ORIGIN_HEADER;
use dc_runtime::{ChannelListener, EventListener, HttpTransport, HttpTransportConfig, Transport};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Notify, mpsc};

#[derive(Default)]
struct ManagerState {
	origins: Mutex<Vec<String>>,
	greetings: Mutex<Vec<String>>,
	subscriptions: Mutex<Vec<HashMap<String, String>>>,
	subscribed: Notify,
	available: Mutex<bool>,
}

type Shared = Arc<ManagerState>;

async fn availability(State(state): State<Shared>, headers: HeaderMap) -> Json<Value> {
	if let Some(origin) = headers.get(ORIGIN_HEADER).and_then(|v| v.to_str().ok()) {
		state.origins.lock().push(origin.to_string());
	}
	if *state.available.lock() {
		Json(json!({ "result": 0, "name": "stub-manager" }))
	} else {
		Json(json!({ "result": 1, "errorCode": 1, "errorMessage": "starting" }))
	}
}

async fn service_discovery() -> Json<Value> {
	Json(json!({
		"result": 0,
		"services": [
			{ "id": "host.1", "name": "Host", "online": true },
			"junk",
			{ "id": "camera.2", "name": "Camera" }
		]
	}))
}

async fn service_information(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
	match query.get("serviceId").map(String::as_str) {
		Some("host.1") => Json(json!({
			"result": 0,
			"supports": ["deviceOrientation"],
			"supportApis": {
				"deviceOrientation": { "paths": { "/onDeviceOrientation": { "put": {} } } }
			}
		})),
		_ => Json(json!({ "result": 1, "errorCode": 6, "errorMessage": "service not found" })),
	}
}

async fn subscribe(State(state): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
	state.subscriptions.lock().push(query);
	state.subscribed.notify_one();
	Json(json!({ "result": 0 }))
}

async fn unsubscribe() -> Json<Value> {
	Json(json!({ "result": 0 }))
}

async fn websocket(State(state): State<Shared>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
	upgrade.on_upgrade(move |socket| push_events(state, socket))
}

async fn push_events(state: Shared, mut socket: WebSocket) {
	if let Some(Ok(Message::Text(greeting))) = socket.recv().await {
		state.greetings.lock().push(greeting.as_str().to_string());
	}
	let _ = socket.send(Message::Text(json!({ "result": 0 }).to_string().into())).await;

	state.subscribed.notified().await;
	let event = json!({
		"serviceId": "host.1",
		"profile": "deviceOrientation",
		"attribute": "onDeviceOrientation",
		"orientation": { "accelerationIncludingGravity": { "x": 0.5, "y": 9.8, "z": -0.1 } }
	});
	let _ = socket.send(Message::Text(event.to_string().into())).await;

	while let Some(Ok(message)) = socket.recv().await {
		if matches!(message, Message::Close(_)) {
			break;
		}
	}
}

async fn spawn_manager(available: bool) -> (String, Shared) {
	let state: Shared = Arc::default();
	*state.available.lock() = available;

	let app = Router::new()
		.route("/gotapi/availability", get(availability))
		.route("/gotapi/servicediscovery", get(service_discovery))
		.route("/gotapi/serviceinformation", get(service_information))
		.route("/gotapi/deviceOrientation/onDeviceOrientation", axum::routing::put(subscribe).delete(unsubscribe))
		.route("/gotapi/websocket", get(websocket))
		.with_state(Arc::clone(&state));

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});

	(format!("http://{addr}"), state)
}

fn transport(endpoint: String) -> HttpTransport {
	HttpTransport::new(HttpTransportConfig {
		endpoint,
		origin: "dcwatch-test".to_string(),
		request_timeout: Duration::from_secs(2),
		manifest_shape: ManifestShape::ProfileMap,
	})
	.unwrap()
}

#[derive(Default)]
struct LifecycleRecorder(Mutex<Vec<String>>);

impl ChannelListener for LifecycleRecorder {
	fn on_open(&self) {
		self.0.lock().push("open".into());
	}
	fn on_close(&self) {
		self.0.lock().push("close".into());
	}
	fn on_error(&self, error: &str) {
		self.0.lock().push(format!("error: {error}"));
	}
}

struct Forwarder(mpsc::UnboundedSender<EventMessage>);

impl EventListener for Forwarder {
	fn on_event(&self, event: EventMessage) {
		let _ = self.0.send(event);
	}
}

#[tokio::test]
async fn availability_reports_result_codes_and_origin() {
	let (endpoint, state) = spawn_manager(true).await;
	let transport = transport(endpoint);
	transport.availability().await.unwrap();
	assert_eq!(state.origins.lock().as_slice(), ["dcwatch-test"]);

	*state.available.lock() = false;
	let err = transport.availability().await.unwrap_err();
	assert!(err.is_rejected(), "expected rejection, got {err}");
}

#[tokio::test]
async fn discovery_and_information_decode_wire_shapes() {
	let (endpoint, _state) = spawn_manager(true).await;
	let transport = transport(endpoint);

	let services = transport.service_discovery().await.unwrap();
	let ids: Vec<_> = services.iter().filter_map(|s| s.id.as_deref()).collect();
	assert_eq!(ids, ["host.1", "camera.2"]);

	let Manifest::ProfileMap(map) = transport.service_information("host.1").await.unwrap() else {
		panic!("expected profile-map manifest");
	};
	assert!(map["deviceOrientation"].has_path("/onDeviceOrientation"));

	assert!(transport.service_information("camera.2").await.unwrap_err().is_rejected());
}

#[tokio::test]
async fn subscribed_events_arrive_over_websocket() {
	let (endpoint, state) = spawn_manager(true).await;
	let transport = transport(endpoint);

	let lifecycle = Arc::new(LifecycleRecorder::default());
	transport.connect_event_channel(lifecycle.clone()).await.unwrap();

	let target = SubscriptionTarget::new("gotapi", "deviceOrientation", "host.1")
		.with_attribute(Some("onDeviceOrientation".into()))
		.with_param("interval", "500");
	let (tx, mut rx) = mpsc::unbounded_channel();
	transport.add_event_listener(&target, Arc::new(Forwarder(tx))).await.unwrap();

	let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
		.await
		.expect("event should arrive")
		.expect("listener channel open");
	assert_eq!(event.service_id.as_deref(), Some("host.1"));
	assert_eq!(event.get("orientation").unwrap()["accelerationIncludingGravity"]["y"], 9.8);

	let subscriptions = state.subscriptions.lock().clone();
	assert_eq!(subscriptions[0]["serviceId"], "host.1");
	assert_eq!(subscriptions[0]["interval"], "500");
	assert!(state.greetings.lock()[0].contains("dcwatch-test"));

	transport.remove_event_listener(&target).await.unwrap();
	transport.disconnect_event_channel().await.unwrap();
	assert_eq!(lifecycle.0.lock().as_slice(), ["open", "close"]);
}

#[tokio::test]
async fn connect_failure_reports_error_to_listener() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let transport = transport(format!("http://{addr}"));
	let lifecycle = Arc::new(LifecycleRecorder::default());
	assert!(transport.connect_event_channel(lifecycle.clone()).await.is_err());

	let events = lifecycle.0.lock().clone();
	assert_eq!(events.len(), 1);
	assert!(events[0].starts_with("error: "));
}
