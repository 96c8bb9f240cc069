//! Network guard: keeps writes on the configured chain.
//!
//! The guard compares the wallet's active chain with the expected
//! [`ChainDescriptor`], asks the wallet to switch (adding the chain first if
//! the wallet does not know it) and offers a two-sample stability check for
//! use right before a write.

use crate::{codes, WalletError, WalletSession};
use arc_swap::ArcSwap;
use campaign_types::{parse_chain_id, ChainDescriptor, NetworkStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub struct NetworkGuard {
	expected: ChainDescriptor,
	session: Arc<WalletSession>,
	status: ArcSwap<NetworkStatus>,
}

impl NetworkGuard {
	pub fn new(expected: ChainDescriptor, session: Arc<WalletSession>) -> Self {
		let status = NetworkStatus::evaluate(
			expected.chain_id,
			session.current_chain_id(),
			session.token(),
		);
		Self {
			expected,
			session,
			status: ArcSwap::from_pointee(status),
		}
	}

	pub fn expected(&self) -> &ChainDescriptor {
		&self.expected
	}

	/// Last recorded status.
	pub fn status(&self) -> NetworkStatus {
		self.status.load().as_ref().clone()
	}

	/// True if `chain_id` names the expected chain, in hex or decimal.
	pub fn validate(&self, chain_id: &str) -> bool {
		self.expected.matches(chain_id)
	}

	/// Error carrying the corrective hint for the configured network.
	pub fn mismatch(&self) -> WalletError {
		WalletError::NetworkMismatch {
			hint: self.expected.mismatch_hint(),
		}
	}

	/// Reads the active chain and records the resulting status.
	pub async fn check(&self) -> Result<NetworkStatus, WalletError> {
		let token = self.session.token();
		let raw = self.active_chain().await?;
		let status =
			NetworkStatus::evaluate(self.expected.chain_id, parse_chain_id(&raw), token);

		if self.session.clock().is_current(token) {
			self.status.store(Arc::new(status.clone()));
		}
		if !status.is_valid {
			tracing::warn!(
				expected = self.expected.chain_id,
				current = ?status.current_chain_id,
				"Wallet is on an unexpected network"
			);
		}
		Ok(status)
	}

	/// Asks the wallet to move to the expected chain.
	///
	/// A wallet that does not know the chain (4902) is sent the full chain
	/// description first. Any failure, and a wallet that still reports another
	/// chain afterwards, ends in `NetworkMismatch`.
	pub async fn switch_network(&self) -> Result<NetworkStatus, WalletError> {
		let provider = self.session.provider()?;

		let switched = provider
			.request("wallet_switchEthereumChain", self.expected.switch_params())
			.await;

		if let Err(err) = switched {
			if err.code != codes::UNRECOGNIZED_CHAIN {
				tracing::warn!(code = err.code, error = %err.message, "Network switch failed");
				return Err(self.mismatch());
			}

			tracing::info!(
				chain_id = self.expected.chain_id,
				name = %self.expected.name,
				"Adding network to wallet"
			);
			if let Err(err) = provider
				.request("wallet_addEthereumChain", self.expected.add_chain_params())
				.await
			{
				tracing::warn!(code = err.code, error = %err.message, "Adding network failed");
				return Err(self.mismatch());
			}
		}

		let status = self.check().await?;
		if status.is_valid {
			tracing::info!(chain_id = self.expected.chain_id, "Switched network");
			Ok(status)
		} else {
			Err(self.mismatch())
		}
	}

	/// Samples the active chain twice, `window` apart.
	///
	/// Only reports stability when both samples name the expected chain.
	/// Concurrent calls are not serialized against each other.
	pub async fn ensure_stable(&self, window: Duration) -> Result<bool, WalletError> {
		let first = self.active_chain().await?;
		if !self.validate(&first) {
			return Ok(false);
		}

		tokio::time::sleep(window).await;

		let second = self.active_chain().await?;
		let stable = first == second && self.validate(&second);
		if !stable {
			tracing::warn!(
				first = %first,
				second = %second,
				"Network changed during stability window"
			);
		}
		Ok(stable)
	}

	async fn active_chain(&self) -> Result<String, WalletError> {
		let provider = self.session.provider()?;
		let value = provider
			.request("eth_chainId", json!([]))
			.await
			.map_err(WalletError::from_provider)?;
		value
			.as_str()
			.map(str::to_string)
			.ok_or_else(|| WalletError::InvalidResponse {
				method: "eth_chainId".to_string(),
				message: format!("expected a string, got {}", value),
			})
	}
}
