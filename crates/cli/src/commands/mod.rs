mod ping;
mod probe;
mod services;
pub mod watch;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use dc_runtime::HttpTransport;

use crate::cli::{Cli, Commands};
use crate::config::{ConfigFile, Overrides, Settings};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let file = ConfigFile::discover(cli.config.as_deref())?;
	let (interval_ms, reconnect) = match &cli.command {
		Commands::Watch { interval, reconnect, .. } => (*interval, *reconnect),
		_ => (None, false),
	};
	let settings = Settings::resolve(
		file,
		Overrides {
			endpoint: cli.endpoint,
			origin: cli.origin,
			manifest_shape: cli.manifest_shape,
			interval_ms,
			reconnect,
		},
	);

	let endpoint = settings.transport.endpoint.clone();
	let transport = Arc::new(HttpTransport::new(settings.transport).with_context(|| format!("invalid endpoint {endpoint}"))?);
	let mut out = io::stdout();

	match cli.command {
		Commands::Watch { path, .. } => {
			let shutdown = async {
				if let Err(err) = tokio::signal::ctrl_c().await {
					tracing::warn!(target = "dcwatch", error = %err, "cannot listen for Ctrl-C");
					std::future::pending::<()>().await;
				}
			};
			watch::execute(transport, settings.session, &path, cli.format, &mut out, shutdown).await
		}
		Commands::Services => services::execute(transport.as_ref(), cli.format, &mut out).await,
		Commands::Probe { path } => probe::execute(transport.as_ref(), &path, cli.format, &mut out).await,
		Commands::Ping => ping::execute(transport.as_ref(), &endpoint, cli.format, &mut out).await,
	}
}
