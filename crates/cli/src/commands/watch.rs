use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dc_runtime::Transport;
use dcwatch::{Notification, SessionConfig, SessionController};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::output::{OutputFormat, render_notification};

/// Watches `path` and prints notifications until `shutdown` resolves.
///
/// Without restart-on-loss, losing the event channel ends the command with an error.
pub async fn execute<W: Write>(
	transport: Arc<dyn Transport>,
	config: SessionConfig,
	path: &str,
	format: OutputFormat,
	out: &mut W,
	shutdown: impl Future<Output = ()>,
) -> Result<()> {
	let restart = config.restart_on_channel_loss;
	let mut session = SessionController::new(transport, config);
	let mut notifications = session.subscribe();
	session.start(path).await.with_context(|| format!("cannot watch {path}"))?;

	let outcome = print_until(&mut notifications, restart, format, out, shutdown).await;
	session.stop().await;
	outcome
}

async fn print_until<W: Write>(
	notifications: &mut tokio::sync::broadcast::Receiver<Notification>,
	restart: bool,
	format: OutputFormat,
	out: &mut W,
	shutdown: impl Future<Output = ()>,
) -> Result<()> {
	tokio::pin!(shutdown);

	loop {
		let received = tokio::select! {
			_ = &mut shutdown => {
				info!(target = "dcwatch", "interrupted");
				return Ok(());
			}
			received = notifications.recv() => received,
		};

		let notification = match received {
			Ok(notification) => notification,
			Err(RecvError::Lagged(skipped)) => {
				warn!(target = "dcwatch", skipped, "output fell behind; notifications dropped");
				continue;
			}
			Err(RecvError::Closed) => return Ok(()),
		};

		writeln!(out, "{}", render_notification(&notification, format)?)?;
		out.flush()?;

		if let Notification::ChannelLost { reason } = &notification {
			if !restart {
				bail!("event channel lost: {reason}");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use dc_protocol::{EventMessage, Manifest, ServiceEntry};
	use dc_runtime::fake::{FakeCall, FakeTransportBuilder};
	use serde_json::json;

	use super::*;

	const PATH: &str = "/gotapi/deviceOrientation/onDeviceOrientation";

	fn manager() -> FakeTransportBuilder {
		FakeTransportBuilder::new()
			.listing(vec![ServiceEntry::new("host.1", "Host")])
			.manifest("host.1", Manifest::CapabilityList(vec!["deviceOrientation".into()]))
	}

	fn orientation_event() -> EventMessage {
		serde_json::from_value(json!({
			"serviceId": "host.1",
			"profile": "deviceOrientation",
			"attribute": "onDeviceOrientation",
			"orientation": { "accelerationIncludingGravity": { "x": 0.1, "y": 9.8, "z": 0.25 } }
		}))
		.unwrap()
	}

	#[tokio::test(start_paused = true)]
	async fn prints_progress_and_events_until_shutdown() {
		let (transport, controller) = manager().build();
		let mut out = Vec::new();

		let shutdown = {
			let controller = controller.clone();
			async move {
				controller.wait_for(|calls| calls.iter().any(FakeCall::is_subscribe)).await;
				tokio::time::sleep(Duration::from_millis(10)).await;
				controller.emit_event(orientation_event());
				tokio::time::sleep(Duration::from_millis(100)).await;
			}
		};
		execute(transport, SessionConfig::default(), PATH, OutputFormat::Text, &mut out, shutdown)
			.await
			.unwrap();

		let printed = String::from_utf8(out).unwrap();
		let lines: Vec<_> = printed.lines().collect();
		assert_eq!(lines.first(), Some(&"waiting for manager"));
		assert!(lines.contains(&"service available: Host (host.1)"), "{printed}");
		assert_eq!(lines.last(), Some(&"x = 0.10, y = 9.80, z = 0.25"));
		assert_eq!(controller.count(FakeCall::is_unsubscribe), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn channel_loss_fails_without_reconnect() {
		let (transport, controller) = manager().build();
		let mut out = Vec::new();

		let shutdown = {
			let controller = controller.clone();
			async move {
				controller.wait_for(|calls| calls.iter().any(FakeCall::is_subscribe)).await;
				tokio::time::sleep(Duration::from_millis(10)).await;
				controller.fail_channel("socket reset");
				std::future::pending::<()>().await;
			}
		};
		let err = execute(transport, SessionConfig::default(), PATH, OutputFormat::Json, &mut out, shutdown)
			.await
			.unwrap_err();
		assert!(err.to_string().contains("socket reset"), "{err}");

		let printed = String::from_utf8(out).unwrap();
		let last: serde_json::Value = serde_json::from_str(printed.lines().last().unwrap()).unwrap();
		assert_eq!(last["topic"], "channel-lost");
	}

	#[tokio::test]
	async fn malformed_path_fails_before_any_request() {
		let (transport, controller) = manager().build();
		let mut out = Vec::new();
		let err = execute(
			transport,
			SessionConfig::default(),
			"deviceOrientation",
			OutputFormat::Text,
			&mut out,
			std::future::pending(),
		)
		.await
		.unwrap_err();

		assert!(format!("{err:#}").contains("Malformed path"), "{err:#}");
		assert!(controller.calls().is_empty());
		assert!(out.is_empty());
	}
}
