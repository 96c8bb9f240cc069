//! Campaign engine: owns the session and wires every component to it.
//!
//! The engine is the single dispatcher for wallet events. Each
//! [`SessionTransition`] is applied to the session, the network is
//! re-validated, the contract gateway is rebound (or unbound) and the
//! campaign cache is invalidated, in that order.

pub mod event_bus;

use crate::classify::MSG_NO_PROVIDER;
use crate::handlers::TransactionOrchestrator;
use crate::monitoring::TransactionMonitor;
use campaign_cache::{CacheError, CampaignCache};
use campaign_config::Config;
use campaign_gateway::ContractGateway;
use campaign_types::{
	truncate_id, Address, AppEvent, NetworkStatus, NotificationSink, SessionClock, SessionEvent,
	WalletState,
};
use campaign_upload::{UploadError, UploadService};
use campaign_wallet::{NetworkGuard, SessionTransition, WalletError, WalletSession};
use event_bus::EventBus;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error(transparent)]
	Wallet(#[from] WalletError),
	#[error(transparent)]
	Cache(#[from] CacheError),
	#[error(transparent)]
	Upload(#[from] UploadError),
	#[error("Asset upload is not configured")]
	UploadNotConfigured,
}

pub struct CampaignEngine {
	config: Config,
	clock: Arc<SessionClock>,
	session: Arc<WalletSession>,
	guard: Arc<NetworkGuard>,
	gateway: Arc<ContractGateway>,
	cache: Arc<CampaignCache>,
	orchestrator: Arc<TransactionOrchestrator>,
	upload: Option<Arc<UploadService>>,
	event_bus: EventBus,
	notifier: Arc<dyn NotificationSink>,
}

impl CampaignEngine {
	pub fn new(
		config: Config,
		session: Arc<WalletSession>,
		upload: Option<Arc<UploadService>>,
		event_bus: EventBus,
		notifier: Arc<dyn NotificationSink>,
	) -> Self {
		let clock = session.clock();
		let guard = Arc::new(NetworkGuard::new(config.network.clone(), session.clone()));
		let gateway = Arc::new(ContractGateway::new(
			config.network.native_currency.decimals,
			clock.clone(),
		));
		let cache = Arc::new(CampaignCache::new(gateway.clone(), clock.clone()));
		let monitor = TransactionMonitor::new(gateway.clone(), clock.clone(), &config.transactions);
		let orchestrator = Arc::new(TransactionOrchestrator::new(
			session.clone(),
			guard.clone(),
			gateway.clone(),
			cache.clone(),
			monitor,
			event_bus.clone(),
			notifier.clone(),
			config.transactions.stability_window(),
		));

		Self {
			config,
			clock,
			session,
			guard,
			gateway,
			cache,
			orchestrator,
			upload,
			event_bus,
			notifier,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn session(&self) -> &Arc<WalletSession> {
		&self.session
	}

	pub fn guard(&self) -> &Arc<NetworkGuard> {
		&self.guard
	}

	pub fn gateway(&self) -> &Arc<ContractGateway> {
		&self.gateway
	}

	pub fn cache(&self) -> &Arc<CampaignCache> {
		&self.cache
	}

	pub fn orchestrator(&self) -> &Arc<TransactionOrchestrator> {
		&self.orchestrator
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Picks up an existing wallet authorization without prompting.
	#[instrument(skip_all)]
	pub async fn initialize(&self) -> Result<WalletState, EngineError> {
		if !self.session.has_provider() {
			self.notifier.error(MSG_NO_PROVIDER);
			return Ok(self.session.state());
		}

		if let Some(address) = self.session.restore().await? {
			self.publish_account(address);
			if self.revalidate().await {
				self.refresh_quietly().await;
			}
		}
		Ok(self.session.state())
	}

	/// Asks the wallet for account access and binds the registry.
	#[instrument(skip_all)]
	pub async fn connect(&self) -> Result<Address, EngineError> {
		let address = match self.session.connect().await {
			Ok(address) => address,
			Err(e) => {
				self.notifier.error(&format!("Failed to connect wallet: {}", e));
				return Err(e.into());
			},
		};
		self.notifier.success("Wallet connected successfully!");
		self.publish_account(address);

		if self.revalidate().await {
			self.refresh_quietly().await;
		}
		Ok(address)
	}

	pub fn disconnect(&self) {
		let token = self.session.disconnect();
		self.publish(SessionEvent::Disconnected { token });
		self.rebind();
		self.notifier.info("Wallet disconnected");
	}

	/// Moves the wallet to the configured network and rebinds on success.
	#[instrument(skip_all)]
	pub async fn switch_network(&self) -> Result<NetworkStatus, EngineError> {
		match self.guard.switch_network().await {
			Ok(status) => {
				self.notifier.success(&format!(
					"Successfully switched to {}!",
					self.guard.expected().name
				));
				self.publish_chain(&status);
				if self.rebind() {
					self.cache.invalidate();
				}
				Ok(status)
			},
			Err(e) => {
				self.notifier.error(&e.to_string());
				Err(e.into())
			},
		}
	}

	/// Pins a local image and returns its content URI.
	pub async fn upload_image(&self, path: &Path) -> Result<String, EngineError> {
		let upload = self.upload.as_ref().ok_or(EngineError::UploadNotConfigured)?;
		upload.upload_file(path).await.map_err(|e| {
			self.notifier.error("Failed to upload image");
			e.into()
		})
	}

	/// Applies one wallet event and brings the rest of the client in line.
	#[instrument(skip_all, fields(transition = ?transition))]
	pub async fn handle_transition(&self, transition: SessionTransition) {
		let state = self.session.apply(&transition);
		match &transition {
			SessionTransition::AccountsChanged(address) => self.publish_account(*address),
			SessionTransition::Disconnected => {
				self.publish(SessionEvent::Disconnected { token: state.token });
				self.notifier.info("Wallet disconnected");
			},
			SessionTransition::ChainChanged(_) => {},
		}

		let bound = if state.connected {
			self.revalidate().await
		} else {
			if matches!(transition, SessionTransition::ChainChanged(_)) {
				let status = NetworkStatus::evaluate(
					self.guard.expected().chain_id,
					state.chain_id,
					state.token,
				);
				self.publish_chain(&status);
			}
			self.rebind()
		};

		if bound {
			self.cache.invalidate();
		}
	}

	/// Dispatches wallet events until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			let _ = tokio::signal::ctrl_c().await;
		})
		.await
	}

	/// Dispatches wallet events and forwards cache events until `shutdown`.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		let mut transitions = self.session.subscribe()?;
		let mut cache_events = self.cache.subscribe();
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				Some(transition) = transitions.recv() => {
					self.handle_transition(transition).await;
				}
				Ok(event) = cache_events.recv() => {
					self.event_bus.publish(AppEvent::Cache(event)).ok();
				}
				_ = &mut shutdown => {
					tracing::info!("Shutting down");
					break;
				}
			}
		}
		Ok(())
	}

	/// Checks the active chain, then rebinds. Returns whether a binding exists.
	async fn revalidate(&self) -> bool {
		match self.guard.check().await {
			Ok(status) => {
				self.publish_chain(&status);
				if !status.is_valid {
					self.notifier.warning(&self.guard.expected().mismatch_hint());
				}
			},
			Err(e) => tracing::warn!(error = %e, "Network check failed"),
		}
		self.rebind()
	}

	/// Binds the registry for the current identity, or drops the binding when
	/// the session is disconnected or on the wrong chain.
	fn rebind(&self) -> bool {
		let state = self.session.state();
		let status = self.guard.status();
		let token = self.clock.current();

		let target = match (state.address, status.current_chain_id) {
			(Some(signer), Some(chain_id))
				if state.connected
					&& status.is_valid && status.token == token
					&& state.token == token =>
			{
				Some((signer, chain_id))
			},
			_ => None,
		};
		let provider = self.session.provider().ok();

		match (target, provider) {
			(Some((signer, chain_id)), Some(provider)) => {
				let contract = self.config.contract.address;
				let bound = self.gateway.bind(contract, signer, chain_id, provider);
				self.publish(SessionEvent::GatewayBound {
					contract,
					signer,
					chain_id,
					token: bound.token,
				});
				true
			},
			_ => {
				self.gateway.unbind();
				self.publish(SessionEvent::GatewayUnbound { token });
				false
			},
		}
	}

	async fn refresh_quietly(&self) {
		if let Err(e) = self.cache.refresh().await {
			tracing::warn!(error = %e, "Initial campaign fetch failed");
		}
	}

	fn publish_account(&self, address: Address) {
		tracing::info!(address = %truncate_id(&address.to_string()), "Account active");
		self.publish(SessionEvent::AccountChanged {
			address,
			token: self.clock.current(),
		});
	}

	fn publish_chain(&self, status: &NetworkStatus) {
		self.publish(SessionEvent::ChainChanged {
			chain_id: status.current_chain_id,
			valid: status.is_valid,
			token: status.token,
		});
	}

	fn publish(&self, event: SessionEvent) {
		self.event_bus.publish(AppEvent::Session(event)).ok();
	}
}
