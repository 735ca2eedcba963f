use std::io::Write;

use anyhow::{Result, bail};
use dc_runtime::Transport;
use serde::Serialize;

use crate::output::{OutputFormat, render_value};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PingReport<'a> {
	endpoint: &'a str,
	available: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

/// One availability check. Fails when the manager is not available.
pub async fn execute<W: Write>(transport: &dyn Transport, endpoint: &str, format: OutputFormat, out: &mut W) -> Result<()> {
	let error = transport.availability().await.err().map(|err| err.to_string());
	let report = PingReport {
		endpoint,
		available: error.is_none(),
		error,
	};

	let rendered = render_value(&report, format, |report| match &report.error {
		None => format!("{} is available", report.endpoint),
		Some(error) => format!("{} is not available: {error}", report.endpoint),
	})?;
	writeln!(out, "{rendered}")?;

	if !report.available {
		bail!("manager at {endpoint} is not available");
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use dc_runtime::fake::FakeTransportBuilder;

	use super::*;

	#[tokio::test]
	async fn reports_available_manager() {
		let (transport, _controller) = FakeTransportBuilder::new().build();
		let mut out = Vec::new();
		execute(transport.as_ref(), "http://localhost:4035", OutputFormat::Text, &mut out).await.unwrap();
		assert_eq!(String::from_utf8(out).unwrap(), "http://localhost:4035 is available\n");
	}

	#[tokio::test]
	async fn unavailable_manager_is_an_error() {
		let (transport, _controller) = FakeTransportBuilder::new().unavailable().build();
		let mut out = Vec::new();
		assert!(execute(transport.as_ref(), "http://localhost:4035", OutputFormat::Json, &mut out).await.is_err());

		let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
		assert_eq!(report["available"], false);
		assert!(report["error"].as_str().unwrap().contains("unavailable"));
	}
}
