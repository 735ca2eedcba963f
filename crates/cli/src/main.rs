use clap::Parser;
use dcwatch_cli::cli::Cli;
use dcwatch_cli::{commands, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		let message = format!("{err:#}");
		error!(target = "dcwatch", error = %message, "command failed");
		std::process::exit(1);
	}
}
