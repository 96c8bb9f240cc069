//! Command-line client for the campaign registry.
//!
//! Connects a wallet to the configured network, lists campaigns and runs
//! campaign creation and donations through the transaction pipeline.

use campaign_config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod factory_registry;

/// Command-line arguments for the campaign client.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "CAMPAIGN_CONFIG", default_value = "config/campaigns.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show wallet, network and contract state
	Status,
	/// Request account access from the wallet
	Connect,
	/// Move the wallet to the configured network
	SwitchNetwork,
	/// List campaigns
	List {
		/// Show closed campaigns instead of open ones
		#[arg(long)]
		closed: bool,
		/// Print JSON instead of a table
		#[arg(long)]
		json: bool,
	},
	/// Create a campaign
	Create {
		#[arg(long)]
		title: String,
		#[arg(long)]
		description: String,
		/// Funding target in native units, e.g. 1.5
		#[arg(long)]
		price: String,
		/// URI of an already uploaded image
		#[arg(long, conflicts_with = "image_file", required_unless_present = "image_file")]
		image: Option<String>,
		/// Local image to upload first
		#[arg(long)]
		image_file: Option<PathBuf>,
		/// Days until the campaign closes
		#[arg(long, default_value_t = 365)]
		days: u64,
	},
	/// Donate to a campaign
	Donate {
		/// Campaign index in the registry
		id: u64,
		/// Amount in native units, e.g. 0.25
		amount: String,
	},
	/// Follow wallet, transaction and cache events until interrupted
	Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let path = args.config.to_string_lossy();
	let config = Config::from_file(&path).await?;
	tracing::info!("Loaded configuration [{}]", config.app.id);

	let engine = factory_registry::build_engine_from_config(config)?;

	match args.command {
		Command::Status => commands::status(&engine).await?,
		Command::Connect => commands::connect(&engine).await?,
		Command::SwitchNetwork => commands::switch_network(&engine).await?,
		Command::List { closed, json } => commands::list(&engine, closed, json).await?,
		Command::Create {
			title,
			description,
			price,
			image,
			image_file,
			days,
		} => {
			let image = match (image, image_file) {
				(Some(uri), _) => commands::ImageSource::Uri(uri),
				(None, Some(path)) => commands::ImageSource::File(path),
				(None, None) => return Err("Please upload an image".into()),
			};
			let request = commands::CreateRequest {
				title,
				description,
				price,
				image,
				days,
			};
			commands::create(&engine, request).await?
		},
		Command::Donate { id, amount } => commands::donate(&engine, id, &amount).await?,
		Command::Watch => commands::watch(&engine).await?,
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE_CONFIG: &str = include_str!("../../../config/campaigns.toml");

	fn write_sample(dir: &tempfile::TempDir, contents: &str) -> String {
		let path = dir.path().join("campaigns.toml");
		std::fs::write(&path, contents).unwrap();
		path.to_string_lossy().into_owned()
	}

	#[test]
	fn test_sample_config_has_no_fallback_key() {
		let value: toml::Value = toml::from_str(SAMPLE_CONFIG).unwrap();
		let key = &value["wallet"]["implementations"]["json_rpc"]["private_key"];
		assert_eq!(key.as_str(), Some("${CAMPAIGN_PRIVATE_KEY}"));
	}

	#[tokio::test]
	async fn test_sample_config_requires_signing_key() {
		let dir = tempfile::tempdir().unwrap();
		let input = SAMPLE_CONFIG.replace("CAMPAIGN_PRIVATE_KEY", "CAMPAIGN_KEY_NEVER_SET");
		let path = write_sample(&dir, &input);

		let err = Config::from_file(&path).await.unwrap_err();
		assert!(err.to_string().contains("CAMPAIGN_KEY_NEVER_SET"));
	}

	#[tokio::test]
	async fn test_sample_config_builds_an_engine() {
		let dir = tempfile::tempdir().unwrap();
		let key = format!("0x{}", "11".repeat(32));
		let path = write_sample(&dir, &SAMPLE_CONFIG.replace("${CAMPAIGN_PRIVATE_KEY}", &key));

		let config = Config::from_file(&path).await.unwrap();
		assert_eq!(config.network.chain_id, 545);

		let engine = factory_registry::build_engine_from_config(config).unwrap();
		assert!(engine.session().has_provider());
		assert!(!engine.gateway().is_bound());
	}

	#[test]
	fn test_args_parse_donation() {
		let args = Args::try_parse_from(["campaigns", "donate", "3", "0.25"]).unwrap();

		assert_eq!(args.config, PathBuf::from("config/campaigns.toml"));
		assert_eq!(args.log_level, "info");
		assert!(matches!(
			args.command,
			Command::Donate { id: 3, ref amount } if amount == "0.25"
		));
	}

	#[test]
	fn test_create_needs_exactly_one_image_source() {
		let base = [
			"campaigns",
			"create",
			"--title",
			"Reef",
			"--description",
			"Restore the reef",
			"--price",
			"1.5",
		];
		assert!(Args::try_parse_from(base).is_err());

		let with_uri = base.iter().copied().chain(["--image", "ipfs://reef"]);
		let args = Args::try_parse_from(with_uri).unwrap();
		assert!(matches!(args.command, Command::Create { days: 365, .. }));

		let both = base
			.iter()
			.copied()
			.chain(["--image", "ipfs://reef", "--image-file", "reef.png"]);
		assert!(Args::try_parse_from(both).is_err());
	}

	#[test]
	fn test_list_flags() {
		let args =
			Args::try_parse_from(["campaigns", "-l", "debug", "list", "--closed"]).unwrap();

		assert_eq!(args.log_level, "debug");
		assert!(matches!(
			args.command,
			Command::List {
				closed: true,
				json: false
			}
		));
	}
}
