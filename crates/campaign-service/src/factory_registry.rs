//! Registry of wallet and upload implementations.
//!
//! Every implementation a crate exposes through `get_all_implementations` is
//! registered once. The engine is then built from the names the
//! configuration actually selects.

use campaign_config::Config;
use campaign_core::{CampaignBuilder, CampaignEngine, CampaignFactories};
use campaign_upload::UploadFactory;
use campaign_wallet::WalletFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct FactoryRegistry {
	pub wallet: HashMap<String, WalletFactory>,
	pub upload: HashMap<String, UploadFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			wallet: HashMap::new(),
			upload: HashMap::new(),
		}
	}

	pub fn register_wallet(&mut self, name: impl Into<String>, factory: WalletFactory) {
		self.wallet.insert(name.into(), factory);
	}

	pub fn register_upload(&mut self, name: impl Into<String>, factory: UploadFactory) {
		self.upload.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in campaign_wallet::get_all_implementations() {
			tracing::debug!("Registering wallet implementation: {}", name);
			registry.register_wallet(name, factory);
		}

		for (name, factory) in campaign_upload::get_all_implementations() {
			tracing::debug!("Registering upload implementation: {}", name);
			registry.register_upload(name, factory);
		}

		registry
	})
}

/// Picks the registered factories for the implementation names in `names`.
macro_rules! build_factories {
	($registry:expr, $names:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $names {
			match $registry.$registry_field.get(name) {
				Some(factory) => {
					factories.insert(name.clone(), *factory);
				},
				None => {
					let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
					available.sort();
					return Err(format!(
						"Unknown {} implementation '{}'. Available: [{}]",
						$type_name,
						name,
						available.join(", ")
					)
					.into());
				},
			}
		}
		factories
	}};
}

pub fn build_engine_from_config(
	config: Config,
) -> Result<CampaignEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let wallet_factories = build_factories!(
		registry,
		config.wallet.implementations.keys(),
		wallet,
		"wallet"
	);
	let upload_factories = build_factories!(
		registry,
		config.upload.iter().flat_map(|upload| upload.implementations.keys()),
		upload,
		"upload"
	);

	let factories = CampaignFactories {
		wallet_factories,
		upload_factories,
	};
	Ok(CampaignBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	const CONFIG: &str = r#"
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
rpc_url = "http://localhost:8545"
chain_id = 545
"#;

	#[test]
	fn test_registry_knows_every_implementation() {
		let registry = get_registry();
		assert!(registry.wallet.contains_key("json_rpc"));
		assert!(registry.upload.contains_key("pinata"));
	}

	#[tokio::test]
	async fn test_build_engine_without_upload() {
		let config: Config = CONFIG.parse().unwrap();

		let engine = build_engine_from_config(config).unwrap();

		assert_eq!(engine.config().app.id, "campaigns-test");
		assert!(engine.session().has_provider());
		assert!(!engine.gateway().is_bound());
	}

	#[tokio::test]
	async fn test_build_engine_with_pinata() {
		let input = format!(
			"{}\n[upload]\nprimary = \"pinata\"\n[upload.implementations.pinata]\n\
			 jwt = \"token\"\ngateway = \"gateway.test\"\n",
			CONFIG
		);
		let config: Config = input.parse().unwrap();

		assert!(build_engine_from_config(config).is_ok());
	}

	#[tokio::test]
	async fn test_unknown_implementation_is_named() {
		let input = CONFIG.replace("json_rpc", "injected");
		let config: Config = input.parse().unwrap();

		let err = build_engine_from_config(config).err().unwrap().to_string();
		assert!(err.contains("Unknown wallet implementation 'injected'"));
		assert!(err.contains("json_rpc"));
	}
}
