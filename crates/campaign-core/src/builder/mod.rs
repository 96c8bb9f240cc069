//! Builder for the campaign engine.
//!
//! Wallet providers and upload backends are created from their
//! `[*.implementations.<name>]` tables through registered factory functions.

use crate::engine::{event_bus::EventBus, CampaignEngine};
use crate::notify::TracingNotifier;
use campaign_config::Config;
use campaign_types::{NotificationSink, SessionClock};
use campaign_upload::{UploadError, UploadInterface, UploadService};
use campaign_wallet::{WalletError, WalletProvider, WalletSession};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Factory functions by implementation name.
pub struct CampaignFactories<WF, UF> {
	pub wallet_factories: HashMap<String, WF>,
	pub upload_factories: HashMap<String, UF>,
}

pub struct CampaignBuilder {
	config: Config,
	provider: Option<Arc<dyn WalletProvider>>,
	notifier: Option<Arc<dyn NotificationSink>>,
}

impl CampaignBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			provider: None,
			notifier: None,
		}
	}

	/// Uses `provider` instead of the configured wallet implementation.
	pub fn with_provider(mut self, provider: Arc<dyn WalletProvider>) -> Self {
		self.provider = Some(provider);
		self
	}

	pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	pub fn build<WF, UF>(
		self,
		factories: CampaignFactories<WF, UF>,
	) -> Result<CampaignEngine, BuilderError>
	where
		WF: Fn(&toml::Value) -> Result<Box<dyn WalletProvider>, WalletError>,
		UF: Fn(&toml::Value) -> Result<Box<dyn UploadInterface>, UploadError>,
	{
		let provider = match self.provider.clone() {
			Some(provider) => provider,
			None => self.create_wallet(&factories.wallet_factories)?,
		};
		let upload = self.create_upload(&factories.upload_factories)?;

		let session = Arc::new(WalletSession::new(
			Some(provider),
			Arc::new(SessionClock::new()),
		));
		let notifier = self
			.notifier
			.unwrap_or_else(|| Arc::new(TracingNotifier) as Arc<dyn NotificationSink>);

		Ok(CampaignEngine::new(
			self.config,
			session,
			upload,
			EventBus::default(),
			notifier,
		))
	}

	fn create_wallet<WF>(
		&self,
		factories: &HashMap<String, WF>,
	) -> Result<Arc<dyn WalletProvider>, BuilderError>
	where
		WF: Fn(&toml::Value) -> Result<Box<dyn WalletProvider>, WalletError>,
	{
		let name = &self.config.wallet.primary;
		let factory = factories.get(name).ok_or_else(|| {
			BuilderError::Config(format!("Unknown wallet implementation '{}'", name))
		})?;
		let wallet_config = self
			.config
			.wallet_implementation()
			.map_err(|e| BuilderError::Config(e.to_string()))?;

		match factory(wallet_config) {
			Ok(provider) => {
				tracing::info!(component = "wallet", implementation = %name, "Loaded");
				Ok(Arc::from(provider))
			},
			Err(e) => {
				tracing::error!(
					component = "wallet",
					implementation = %name,
					error = %e,
					"Failed to create wallet implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create wallet implementation '{}': {}",
					name, e
				)))
			},
		}
	}

	fn create_upload<UF>(
		&self,
		factories: &HashMap<String, UF>,
	) -> Result<Option<Arc<UploadService>>, BuilderError>
	where
		UF: Fn(&toml::Value) -> Result<Box<dyn UploadInterface>, UploadError>,
	{
		let Some(upload_config) = &self.config.upload else {
			return Ok(None);
		};

		let mut implementations: HashMap<String, Arc<dyn UploadInterface>> = HashMap::new();
		for (name, config) in &upload_config.implementations {
			let Some(factory) = factories.get(name) else {
				tracing::warn!(
					component = "upload",
					implementation = %name,
					"No such implementation"
				);
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					let is_primary = &upload_config.primary == name;
					tracing::info!(
						component = "upload",
						implementation = %name,
						enabled = %is_primary,
						"Loaded"
					);
					implementations.insert(name.clone(), Arc::from(implementation));
				},
				Err(e) => {
					tracing::error!(
						component = "upload",
						implementation = %name,
						error = %e,
						"Failed to create upload implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create upload implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if !implementations.contains_key(&upload_config.primary) {
			return Err(BuilderError::Config(format!(
				"Primary upload '{}' failed to load",
				upload_config.primary
			)));
		}
		Ok(Some(Arc::new(UploadService::new(
			implementations,
			upload_config.primary.clone(),
		))))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{ALICE, CONFIG};
	use campaign_upload::implementations::pinata;
	use campaign_wallet::implementations::mock::MockProvider;

	type WalletFn = fn(&toml::Value) -> Result<Box<dyn WalletProvider>, WalletError>;
	type UploadFn = fn(&toml::Value) -> Result<Box<dyn UploadInterface>, UploadError>;

	fn mock_wallet(_: &toml::Value) -> Result<Box<dyn WalletProvider>, WalletError> {
		Ok(Box::new(MockProvider::on_chain(545, ALICE)))
	}

	fn failing_wallet(_: &toml::Value) -> Result<Box<dyn WalletProvider>, WalletError> {
		Err(WalletError::InvalidConfig("rpc_url is required".to_string()))
	}

	fn factories(wallet: WalletFn) -> CampaignFactories<WalletFn, UploadFn> {
		let mut wallet_factories = HashMap::new();
		wallet_factories.insert("json_rpc".to_string(), wallet);
		let mut upload_factories = HashMap::new();
		upload_factories.insert("pinata".to_string(), pinata::create_upload as UploadFn);
		CampaignFactories {
			wallet_factories,
			upload_factories,
		}
	}

	#[tokio::test]
	async fn test_build_with_configured_wallet() {
		let engine = CampaignBuilder::new(CONFIG.parse().unwrap())
			.build(factories(mock_wallet))
			.unwrap();

		assert!(engine.session().has_provider());
		assert!(matches!(
			engine.upload_image(std::path::Path::new("reef.png")).await,
			Err(crate::EngineError::UploadNotConfigured)
		));
	}

	#[test]
	fn test_wallet_factory_failure_is_reported() {
		let err = CampaignBuilder::new(CONFIG.parse().unwrap())
			.build(factories(failing_wallet))
			.err()
			.unwrap();

		assert!(err.to_string().contains("rpc_url is required"));
	}

	#[test]
	fn test_injected_provider_skips_factories() {
		let engine = CampaignBuilder::new(CONFIG.parse().unwrap())
			.with_provider(Arc::new(MockProvider::on_chain(545, ALICE)))
			.build(factories(failing_wallet))
			.unwrap();

		assert!(engine.session().has_provider());
	}

	#[test]
	fn test_upload_primary_must_load() {
		let input = format!(
			"{}\n[upload]\nprimary = \"pinata\"\n[upload.implementations.pinata]\n\
			 jwt = \"\"\ngateway = \"gateway.test\"\n",
			CONFIG
		);

		let err = CampaignBuilder::new(input.parse().unwrap())
			.build(factories(mock_wallet))
			.err()
			.unwrap();

		assert!(err.to_string().contains("pinata"));
	}
}
