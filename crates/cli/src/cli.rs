use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use dc_protocol::ManifestShape;

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "dcwatch")]
#[command(about = "Find a Device Connect service by capability path and stream its events")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = ArgAction::Count)]
	pub verbose: u8,

	/// Config file (defaults to <config dir>/dcwatch/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Manager base URL
	#[arg(long, global = true, value_name = "URL")]
	pub endpoint: Option<String>,

	/// Origin announced to the manager
	#[arg(long, global = true, value_name = "NAME")]
	pub origin: Option<String>,

	/// Manifest shape the manager emits (profile-map or capability-list)
	#[arg(long, global = true, value_name = "SHAPE")]
	pub manifest_shape: Option<ManifestShape>,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
	/// Watch PATH and print notifications until Ctrl-C
	Watch {
		/// Capability path, e.g. /gotapi/deviceOrientation/onDeviceOrientation
		path: String,

		/// Event interval requested from the service (ms)
		#[arg(long, value_name = "MS")]
		interval: Option<u64>,

		/// Rediscover and resubscribe when the event channel is lost
		#[arg(long)]
		reconnect: bool,
	},

	/// List registered services
	#[command(alias = "ls")]
	Services,

	/// Report which registered services support PATH
	Probe { path: String },

	/// Check whether the manager is available
	Ping,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_watch_with_options() {
		let cli = Cli::try_parse_from([
			"dcwatch",
			"-vv",
			"--endpoint",
			"http://10.0.0.2:4035",
			"watch",
			"/gotapi/deviceOrientation/onDeviceOrientation",
			"--interval",
			"200",
			"--reconnect",
		])
		.unwrap();

		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.endpoint.as_deref(), Some("http://10.0.0.2:4035"));
		assert_eq!(
			cli.command,
			Commands::Watch {
				path: "/gotapi/deviceOrientation/onDeviceOrientation".into(),
				interval: Some(200),
				reconnect: true,
			}
		);
	}

	#[test]
	fn global_flags_follow_subcommand() {
		let cli = Cli::try_parse_from(["dcwatch", "services", "--format", "json", "--origin", "lab", "-v"]).unwrap();
		assert_eq!(cli.command, Commands::Services);
		assert_eq!(cli.format, OutputFormat::Json);
		assert_eq!(cli.origin.as_deref(), Some("lab"));
		assert_eq!(cli.verbose, 1);
	}

	#[test]
	fn manifest_shape_is_parsed() {
		let cli = Cli::try_parse_from(["dcwatch", "--manifest-shape", "capability-list", "ping"]).unwrap();
		assert_eq!(cli.manifest_shape, Some(ManifestShape::CapabilityList));
		assert!(Cli::try_parse_from(["dcwatch", "--manifest-shape", "tree", "ping"]).is_err());
	}

	#[test]
	fn watch_requires_a_path() {
		assert!(Cli::try_parse_from(["dcwatch", "watch"]).is_err());
	}

	#[test]
	fn services_alias() {
		let cli = Cli::try_parse_from(["dcwatch", "ls"]).unwrap();
		assert_eq!(cli.command, Commands::Services);
	}
}
