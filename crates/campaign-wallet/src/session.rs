//! Wallet session: the connected identity and its change stream.
//!
//! The session is the only writer of [`WalletState`]. Every identity change
//! (connect, disconnect, account switch, chain switch) advances the shared
//! [`SessionClock`] so in-flight work started under the old identity can
//! recognize itself as stale.

use crate::{ProviderEvent, WalletError, WalletProvider};
use arc_swap::ArcSwap;
use campaign_types::{
	parse_chain_id, truncate_id, Address, SessionClock, SessionToken, WalletState,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Identity change delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
	/// The first authorized account is now this address.
	AccountsChanged(Address),
	/// The wallet reported a new chain, as received.
	ChainChanged(String),
	/// The wallet no longer exposes any account.
	Disconnected,
}

impl From<ProviderEvent> for SessionTransition {
	fn from(event: ProviderEvent) -> Self {
		match event {
			ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
				Some(address) => SessionTransition::AccountsChanged(*address),
				None => SessionTransition::Disconnected,
			},
			ProviderEvent::ChainChanged(raw) => SessionTransition::ChainChanged(raw),
		}
	}
}

pub struct WalletSession {
	provider: Option<Arc<dyn WalletProvider>>,
	clock: Arc<SessionClock>,
	state: ArcSwap<WalletState>,
	subscribed: AtomicBool,
}

impl WalletSession {
	/// Creates a session over an optional provider. Without a provider every
	/// provider-backed operation fails with `ProviderUnavailable`.
	pub fn new(provider: Option<Arc<dyn WalletProvider>>, clock: Arc<SessionClock>) -> Self {
		let token = clock.current();
		Self {
			provider,
			clock,
			state: ArcSwap::from_pointee(WalletState::disconnected(None, token)),
			subscribed: AtomicBool::new(false),
		}
	}

	pub fn provider(&self) -> Result<Arc<dyn WalletProvider>, WalletError> {
		self.provider.clone().ok_or(WalletError::ProviderUnavailable)
	}

	pub fn has_provider(&self) -> bool {
		self.provider.is_some()
	}

	pub fn clock(&self) -> Arc<SessionClock> {
		self.clock.clone()
	}

	pub fn token(&self) -> SessionToken {
		self.clock.current()
	}

	pub fn state(&self) -> WalletState {
		self.state.load().as_ref().clone()
	}

	pub fn current_address(&self) -> Option<Address> {
		self.state.load().address
	}

	pub fn current_chain_id(&self) -> Option<u64> {
		self.state.load().chain_id
	}

	pub fn is_connected(&self) -> bool {
		self.state.load().connected
	}

	/// Asks the wallet for authorization and returns the first account.
	pub async fn connect(&self) -> Result<Address, WalletError> {
		let provider = self.provider()?;
		let accounts = self
			.accounts(provider.as_ref(), "eth_requestAccounts")
			.await?;
		let address = accounts.first().copied().ok_or(WalletError::NoAccount)?;
		let chain_id = self.read_chain_id(provider.as_ref()).await?;

		let token = self.clock.advance();
		self.state.store(Arc::new(WalletState {
			address: Some(address),
			connected: true,
			chain_id,
			token,
		}));

		tracing::info!(
			address = %truncate_id(&address.to_string()),
			chain_id = ?chain_id,
			token = %token,
			"Wallet connected"
		);
		Ok(address)
	}

	/// Restores an existing authorization without prompting the user.
	///
	/// Returns `None` when the wallet has not authorized this client.
	pub async fn restore(&self) -> Result<Option<Address>, WalletError> {
		let provider = self.provider()?;
		let accounts = self.accounts(provider.as_ref(), "eth_accounts").await?;
		let chain_id = self.read_chain_id(provider.as_ref()).await?;

		let token = self.clock.advance();
		let state = match accounts.first() {
			Some(address) => WalletState {
				address: Some(*address),
				connected: true,
				chain_id,
				token,
			},
			None => WalletState::disconnected(chain_id, token),
		};
		let address = state.address;
		self.state.store(Arc::new(state));

		tracing::debug!(
			restored = address.is_some(),
			token = %token,
			"Wallet session restored"
		);
		Ok(address)
	}

	/// Forgets the connected account locally. The wallet is not contacted.
	pub fn disconnect(&self) -> SessionToken {
		let token = self.clock.advance();
		let chain_id = self.current_chain_id();
		self.state
			.store(Arc::new(WalletState::disconnected(chain_id, token)));
		tracing::info!(token = %token, "Wallet disconnected");
		token
	}

	/// Starts forwarding provider events as [`SessionTransition`]s.
	///
	/// Only one subscriber may exist: the dispatcher that applies them.
	pub fn subscribe(
		&self,
	) -> Result<mpsc::UnboundedReceiver<SessionTransition>, WalletError> {
		let provider = self.provider()?;
		if self.subscribed.swap(true, Ordering::SeqCst) {
			return Err(WalletError::AlreadySubscribed);
		}

		let mut events = provider.subscribe();
		let (tx, rx) = mpsc::unbounded_channel();

		tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(event) => {
						if tx.send(SessionTransition::from(event)).is_err() {
							break;
						}
					},
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Dropped wallet events");
					},
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
			tracing::debug!("Wallet event stream ended");
		});

		Ok(rx)
	}

	/// Applies an identity change and returns the state it produced.
	pub fn apply(&self, transition: &SessionTransition) -> WalletState {
		let previous = self.state();
		let token = self.clock.advance();

		let next = match transition {
			SessionTransition::AccountsChanged(address) => WalletState {
				address: Some(*address),
				connected: true,
				chain_id: previous.chain_id,
				token,
			},
			SessionTransition::ChainChanged(raw) => WalletState {
				chain_id: parse_chain_id(raw),
				token,
				..previous
			},
			SessionTransition::Disconnected => {
				WalletState::disconnected(previous.chain_id, token)
			},
		};

		self.state.store(Arc::new(next.clone()));
		tracing::debug!(?transition, token = %token, "Session transition applied");
		next
	}

	async fn accounts(
		&self,
		provider: &dyn WalletProvider,
		method: &str,
	) -> Result<Vec<Address>, WalletError> {
		let value = provider
			.request(method, json!([]))
			.await
			.map_err(WalletError::from_provider)?;
		serde_json::from_value(value).map_err(|e| WalletError::InvalidResponse {
			method: method.to_string(),
			message: e.to_string(),
		})
	}

	async fn read_chain_id(
		&self,
		provider: &dyn WalletProvider,
	) -> Result<Option<u64>, WalletError> {
		let value = provider
			.request("eth_chainId", json!([]))
			.await
			.map_err(WalletError::from_provider)?;
		Ok(value.as_str().and_then(parse_chain_id))
	}
}
