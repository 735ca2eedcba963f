//! Rendering of notifications and command results.

use std::fmt;

use anyhow::Result;
use clap::ValueEnum;
use dc_protocol::EventMessage;
use dcwatch::Notification;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// One JSON document per line
	Json,
}

impl fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

/// `orientation.accelerationIncludingGravity` of a device orientation event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Acceleration {
	pub x: f64,
	pub y: f64,
	pub z: f64,
}

impl Acceleration {
	pub fn from_event(event: &EventMessage) -> Option<Self> {
		let acceleration = event.get("orientation")?.get("accelerationIncludingGravity")?;
		let axis = |name: &str| acceleration.get(name).and_then(|value| value.as_f64());
		Some(Self {
			x: axis("x")?,
			y: axis("y")?,
			z: axis("z")?,
		})
	}
}

impl fmt::Display for Acceleration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "x = {:.2}, y = {:.2}, z = {:.2}", self.x, self.y, self.z)
	}
}

pub fn render_notification(notification: &Notification, format: OutputFormat) -> Result<String> {
	if format == OutputFormat::Json {
		return Ok(serde_json::to_string(notification)?);
	}

	Ok(match notification {
		Notification::WaitingForManager => "waiting for manager".to_string(),
		Notification::ManagerAvailable => "manager available".to_string(),
		Notification::WaitingForService { path } => format!("waiting for a service supporting {path}"),
		Notification::ServiceAvailable { service } => format!("service available: {service}"),
		Notification::Subscribed { target, .. } => format!("subscribed: {target}"),
		Notification::Event(event) => match Acceleration::from_event(event) {
			Some(acceleration) => acceleration.to_string(),
			None => serde_json::to_string(event)?,
		},
		Notification::ChannelStateChanged(state) => format!("channel {state}"),
		Notification::ChannelLost { reason } => format!("channel lost: {reason}"),
	})
}

/// Renders any serializable result: pretty JSON, or `text` for text output.
pub fn render_value<T: Serialize>(value: &T, format: OutputFormat, text: impl FnOnce(&T) -> String) -> Result<String> {
	match format {
		OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
		OutputFormat::Text => Ok(text(value)),
	}
}
