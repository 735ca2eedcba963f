use std::io::Write;

use anyhow::{Context, Result};
use dc_protocol::ServiceEntry;
use dc_runtime::Transport;

use crate::output::{OutputFormat, render_value};

/// Prints one registry listing.
pub async fn execute<W: Write>(transport: &dyn Transport, format: OutputFormat, out: &mut W) -> Result<()> {
	let services = transport.service_discovery().await.context("listing services")?;
	let rendered = render_value(&services, format, |services| table(services))?;
	writeln!(out, "{rendered}")?;
	Ok(())
}

fn table(services: &[ServiceEntry]) -> String {
	if services.is_empty() {
		return "no services registered".to_string();
	}

	let cell = |value: Option<&str>| value.filter(|v| !v.is_empty()).unwrap_or("-").to_string();
	let rows: Vec<[String; 3]> = services
		.iter()
		.map(|service| {
			let online = match service.online {
				Some(true) => "online",
				Some(false) => "offline",
				None => "-",
			};
			[cell(service.id.as_deref()), cell(service.name.as_deref()), online.to_string()]
		})
		.collect();

	let id_width = rows.iter().map(|row| row[0].len()).max().unwrap_or(0).max("ID".len());
	let name_width = rows.iter().map(|row| row[1].len()).max().unwrap_or(0).max("NAME".len());

	let mut lines = vec![format!("{:<id_width$}  {:<name_width$}  STATUS", "ID", "NAME")];
	lines.extend(rows.iter().map(|[id, name, online]| format!("{id:<id_width$}  {name:<name_width$}  {online}")));
	lines.join("\n")
}
