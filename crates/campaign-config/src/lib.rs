//! Configuration for the campaign client.
//!
//! Configuration is read from TOML. `${VAR}` and `${VAR:-default}` references
//! are resolved from the environment before parsing, and every parsed
//! configuration is validated before it is handed out.
//!
//! ## Modular Configuration Support
//!
//! A file may pull in others with `include = ["network.toml", "wallet.toml"]`.
//! Each top-level section must appear in exactly one file.

mod loader;

use campaign_types::{Address, ChainDescriptor};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The full error repeats the whole input; keep only the message.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Largest number of decimals an amount can be presented with.
const MAX_CURRENCY_DECIMALS: u8 = 28;

/// Top-level client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this client instance.
	pub app: AppConfig,
	/// The one chain the client is allowed to write on.
	pub network: ChainDescriptor,
	/// Deployed campaign registry.
	pub contract: ContractConfig,
	/// Wallet provider selection.
	pub wallet: WalletConfig,
	/// Confirmation and stability timing.
	#[serde(default)]
	pub transactions: TransactionsConfig,
	/// Asset upload service. Creating campaigns from local image files
	/// requires it.
	pub upload: Option<UploadConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
	pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractConfig {
	/// Address of the campaign registry on the expected chain.
	pub address: Address,
}

/// Selects and configures the wallet provider implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Implementation name to raw configuration table.
	pub implementations: HashMap<String, toml::Value>,
}

/// Timing of the write pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionsConfig {
	/// Give up waiting for inclusion after this long.
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
	/// Delay between receipt polls.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Delay between the two chain samples of the stability check.
	#[serde(default = "default_stability_window_ms")]
	pub stability_window_ms: u64,
	/// Blocks on top of the inclusion block before a write counts as confirmed.
	#[serde(default = "default_min_confirmations")]
	pub min_confirmations: u64,
}

fn default_confirmation_timeout_seconds() -> u64 {
	300
}

fn default_poll_interval_ms() -> u64 {
	2000
}

fn default_stability_window_ms() -> u64 {
	1000
}

fn default_min_confirmations() -> u64 {
	1
}

impl Default for TransactionsConfig {
	fn default() -> Self {
		Self {
			confirmation_timeout_seconds: default_confirmation_timeout_seconds(),
			poll_interval_ms: default_poll_interval_ms(),
			stability_window_ms: default_stability_window_ms(),
			min_confirmations: default_min_confirmations(),
		}
	}
}

impl TransactionsConfig {
	pub fn confirmation_timeout(&self) -> Duration {
		Duration::from_secs(self.confirmation_timeout_seconds)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn stability_window(&self) -> Duration {
		Duration::from_millis(self.stability_window_ms)
	}
}

/// Selects and configures the asset upload implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME`, or with `default` for
/// `${VAR_NAME:-default}` when the variable is unset. Inputs above 1MB are
/// rejected before the regex runs.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Raw configuration table of the selected wallet implementation.
	pub fn wallet_implementation(&self) -> Result<&toml::Value, ConfigError> {
		self.wallet
			.implementations
			.get(&self.wallet.primary)
			.ok_or_else(|| {
				ConfigError::Validation(format!(
					"Primary wallet '{}' not found in implementations",
					self.wallet.primary
				))
			})
	}

	/// Raw configuration table of the selected upload implementation, if an
	/// upload section is present.
	pub fn upload_implementation(&self) -> Option<(&str, &toml::Value)> {
		let upload = self.upload.as_ref()?;
		upload
			.implementations
			.get(&upload.primary)
			.map(|table| (upload.primary.as_str(), table))
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.app.id.trim().is_empty() {
			return Err(ConfigError::Validation("App ID cannot be empty".into()));
		}

		self.validate_network()?;

		if self.contract.address == Address::ZERO {
			return Err(ConfigError::Validation(
				"Contract address cannot be the zero address".into(),
			));
		}

		if self.wallet.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Wallet primary implementation cannot be empty".into(),
			));
		}
		self.wallet_implementation()?;

		let tx = &self.transactions;
		if tx.confirmation_timeout_seconds == 0 || tx.confirmation_timeout_seconds > 3600 {
			return Err(ConfigError::Validation(
				"confirmation_timeout_seconds must be between 1 and 3600".into(),
			));
		}
		if tx.poll_interval_ms < 100 {
			return Err(ConfigError::Validation(
				"poll_interval_ms must be at least 100".into(),
			));
		}
		if tx.stability_window_ms > 60_000 {
			return Err(ConfigError::Validation(
				"stability_window_ms cannot exceed 60000".into(),
			));
		}
		if tx.min_confirmations == 0 {
			return Err(ConfigError::Validation(
				"min_confirmations must be at least 1".into(),
			));
		}
		if tx.min_confirmations > 100 {
			return Err(ConfigError::Validation(
				"min_confirmations cannot exceed 100".into(),
			));
		}

		if let Some(upload) = &self.upload {
			if !upload.implementations.contains_key(&upload.primary) {
				return Err(ConfigError::Validation(format!(
					"Primary upload '{}' not found in implementations",
					upload.primary
				)));
			}
		}

		Ok(())
	}

	fn validate_network(&self) -> Result<(), ConfigError> {
		let network = &self.network;
		if network.chain_id == 0 {
			return Err(ConfigError::Validation(
				"Network chain_id must be greater than 0".into(),
			));
		}
		if network.name.trim().is_empty() {
			return Err(ConfigError::Validation("Network name cannot be empty".into()));
		}
		if network.rpc_urls.is_empty() {
			return Err(ConfigError::Validation(format!(
				"Network {} must have at least one rpc_url",
				network.chain_id
			)));
		}
		if let Some(bad) = network
			.rpc_urls
			.iter()
			.chain(network.explorer_urls.iter())
			.find(|url| !url.starts_with("http://") && !url.starts_with("https://"))
		{
			return Err(ConfigError::Validation(format!(
				"Network URL '{}' must use http or https",
				bad
			)));
		}
		if network.native_currency.symbol.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Native currency symbol cannot be empty".into(),
			));
		}
		if network.native_currency.decimals > MAX_CURRENCY_DECIMALS {
			return Err(ConfigError::Validation(format!(
				"Native currency decimals cannot exceed {}",
				MAX_CURRENCY_DECIMALS
			)));
		}
		Ok(())
	}
}

/// Parses TOML, resolving environment variables first and validating after.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) const BASE_CONFIG: &str = r#"
[app]
id = "campaigns-test"

[network]
chain_id = 545
name = "Flow EVM Testnet"
rpc_urls = ["https://testnet.evm.nodes.onflow.org"]
explorer_urls = ["https://evm-testnet.flowscan.io"]
[network.native_currency]
name = "FLOW"
symbol = "FLOW"
decimals = 18

[contract]
address = "0xec8a14c5ddc18c63c4da7d46893fa7d39aefd459"

[wallet]
primary = "json_rpc"
[wallet.implementations.json_rpc]
rpc_url = "https://testnet.evm.nodes.onflow.org"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("CAMPAIGN_TEST_HOST", "localhost");
		std::env::set_var("CAMPAIGN_TEST_PORT", "8545");

		let input = "url = \"http://${CAMPAIGN_TEST_HOST}:${CAMPAIGN_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("CAMPAIGN_TEST_HOST");
		std::env::remove_var("CAMPAIGN_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${CAMPAIGN_MISSING_VAR:-fallback}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${CAMPAIGN_MISSING_VAR}\"");
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("CAMPAIGN_MISSING_VAR"));
	}

	#[test]
	fn test_base_config_parses_with_defaults() {
		let config: Config = BASE_CONFIG.parse().unwrap();

		assert_eq!(config.app.id, "campaigns-test");
		assert_eq!(config.network.chain_id, 545);
		assert_eq!(config.network.native_currency.decimals, 18);
		assert_eq!(config.transactions.poll_interval(), Duration::from_millis(2000));
		assert_eq!(config.transactions.stability_window(), Duration::from_secs(1));
		assert_eq!(config.transactions.min_confirmations, 1);
		assert!(config.upload.is_none());
		assert!(config.wallet_implementation().is_ok());
	}

	#[test]
	fn test_secret_from_env_default() {
		let input = format!(
			"{}private_key = \"${{CAMPAIGN_TEST_KEY:-0xabc}}\"\n",
			BASE_CONFIG
		);
		let config: Config = input.parse().unwrap();
		let wallet = config.wallet_implementation().unwrap();
		assert_eq!(wallet.get("private_key").and_then(|v| v.as_str()), Some("0xabc"));
	}

	#[test]
	fn test_unknown_wallet_primary_rejected() {
		let input = BASE_CONFIG.replace("primary = \"json_rpc\"", "primary = \"injected\"");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary wallet 'injected'"));
	}

	#[test]
	fn test_zero_contract_rejected() {
		let input = BASE_CONFIG.replace(
			"0xec8a14c5ddc18c63c4da7d46893fa7d39aefd459",
			"0x0000000000000000000000000000000000000000",
		);
		assert!(input.parse::<Config>().is_err());
	}

	#[test]
	fn test_network_without_rpc_rejected() {
		let input = BASE_CONFIG.replace(
			"rpc_urls = [\"https://testnet.evm.nodes.onflow.org\"]",
			"rpc_urls = []",
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("at least one rpc_url"));
	}

	#[test]
	fn test_transaction_bounds() {
		let input = format!("{}\n[transactions]\nmin_confirmations = 0\n", BASE_CONFIG);
		assert!(input.parse::<Config>().is_err());

		let input = format!("{}\n[transactions]\npoll_interval_ms = 10\n", BASE_CONFIG);
		assert!(input.parse::<Config>().is_err());

		let input = format!(
			"{}\n[transactions]\nconfirmation_timeout_seconds = 60\n",
			BASE_CONFIG
		);
		let config: Config = input.parse().unwrap();
		assert_eq!(config.transactions.confirmation_timeout(), Duration::from_secs(60));
	}

	#[test]
	fn test_upload_primary_must_exist() {
		let input = format!(
			"{}\n[upload]\nprimary = \"pinata\"\n[upload.implementations.other]\n",
			BASE_CONFIG
		);
		assert!(input.parse::<Config>().is_err());

		let input = format!(
			"{}\n[upload]\nprimary = \"pinata\"\n\
			 [upload.implementations.pinata]\njwt = \"token\"\n",
			BASE_CONFIG
		);
		let config: Config = input.parse().unwrap();
		let (name, table) = config.upload_implementation().unwrap();
		assert_eq!(name, "pinata");
		assert_eq!(table.get("jwt").and_then(|v| v.as_str()), Some("token"));
	}
}
