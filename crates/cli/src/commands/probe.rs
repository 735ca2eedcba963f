use std::io::Write;

use anyhow::{Context, Result};
use dc_runtime::Transport;
use dcwatch::{PathSpec, ServiceDescriptor};
use serde::Serialize;

use crate::output::{OutputFormat, render_value};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceSupport {
	service: ServiceDescriptor,
	supported: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport {
	path: String,
	services: Vec<ServiceSupport>,
	/// What `watch` would pick: the first supporting service in registry order.
	first_match: Option<ServiceDescriptor>,
}

/// Probes every registered service for `path` in one pass.
pub async fn execute<W: Write>(transport: &dyn Transport, path: &str, format: OutputFormat, out: &mut W) -> Result<()> {
	let spec = PathSpec::parse(path)?;
	let entries = transport.service_discovery().await.context("listing services")?;

	let mut services = Vec::new();
	for (id, name) in entries.iter().filter_map(|entry| entry.identity()) {
		services.push(ServiceSupport {
			service: ServiceDescriptor::new(id, name),
			supported: dcwatch::supports(transport, id, &spec).await,
		});
	}
	let first_match = services.iter().find(|s| s.supported).map(|s| s.service.clone());
	let report = ProbeReport {
		path: spec.to_string(),
		services,
		first_match,
	};

	let rendered = render_value(&report, format, render_text)?;
	writeln!(out, "{rendered}")?;
	Ok(())
}

fn render_text(report: &ProbeReport) -> String {
	let mut lines: Vec<String> = report
		.services
		.iter()
		.map(|entry| format!("{}  {}", if entry.supported { "yes" } else { "no " }, entry.service))
		.collect();
	lines.push(match &report.first_match {
		Some(service) => format!("{} -> {service}", report.path),
		None => format!("{}: no supporting service", report.path),
	});
	lines.join("\n")
}
