//! Wallet session management for the campaign client.
//!
//! A wallet provider exposes the EIP-1193 surface: JSON-RPC style requests
//! plus an event stream for account and chain changes. On top of it this
//! crate builds the [`WalletSession`], which owns the connected identity, and
//! the [`NetworkGuard`], which checks and corrects the active chain.

use async_trait::async_trait;
use campaign_types::{Address, ConfigSchema, ImplementationRegistry};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub mod guard;
pub mod session;

pub mod implementations {
	pub mod json_rpc;
	#[cfg(any(test, feature = "testing"))]
	pub mod mock;
}

pub use guard::NetworkGuard;
pub use session::{SessionTransition, WalletSession};

/// EIP-1193 and JSON-RPC error codes the client reacts to.
pub mod codes {
	pub const USER_REJECTED: i64 = 4001;
	pub const UNAUTHORIZED: i64 = 4100;
	pub const UNSUPPORTED_METHOD: i64 = 4200;
	pub const DISCONNECTED: i64 = 4900;
	pub const CHAIN_DISCONNECTED: i64 = 4901;
	pub const UNRECOGNIZED_CHAIN: i64 = 4902;
	pub const EXECUTION_REVERTED: i64 = 3;
	pub const SERVER_ERROR: i64 = -32000;
	pub const INVALID_PARAMS: i64 = -32602;
	pub const INTERNAL_ERROR: i64 = -32603;
}

/// Error returned by a provider request, in EIP-1193 shape.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Provider error {code}: {message}")]
pub struct ProviderError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<serde_json::Value>,
}

impl ProviderError {
	pub fn new(code: i64, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			data: None,
		}
	}

	pub fn user_rejected() -> Self {
		Self::new(codes::USER_REJECTED, "User rejected the request.")
	}

	/// The request never produced a JSON-RPC answer.
	pub fn transport(message: impl Into<String>) -> Self {
		Self::new(codes::INTERNAL_ERROR, message)
	}

	pub fn is_user_rejection(&self) -> bool {
		self.code == codes::USER_REJECTED
	}
}

/// Unsolicited provider notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
	/// Authorized accounts changed. Empty means the wallet disconnected.
	AccountsChanged(Vec<Address>),
	/// Active chain changed, as the raw hex chain id.
	ChainChanged(String),
}

/// Errors surfaced by the session and the network guard.
#[derive(Debug, Clone, Error)]
pub enum WalletError {
	#[error("No wallet provider available")]
	ProviderUnavailable,
	#[error("Connection request was rejected by user")]
	UserRejected,
	#[error("{hint}")]
	NetworkMismatch { hint: String },
	#[error("No account authorized")]
	NoAccount,
	#[error("Session events already subscribed")]
	AlreadySubscribed,
	#[error("Invalid response to {method}: {message}")]
	InvalidResponse { method: String, message: String },
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
	#[error(transparent)]
	Provider(#[from] ProviderError),
}

impl WalletError {
	/// Maps a provider error, singling out user rejections.
	pub fn from_provider(err: ProviderError) -> Self {
		if err.is_user_rejection() {
			WalletError::UserRejected
		} else {
			WalletError::Provider(err)
		}
	}
}

/// Interface every wallet provider implementation exposes.
#[async_trait]
pub trait WalletProvider: Send + Sync {
	/// Schema of this implementation's configuration table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Sends one request, e.g. `eth_chainId` or `eth_sendTransaction`.
	async fn request(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, ProviderError>;

	/// Receiver of account and chain change notifications.
	fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

pub type WalletFactory = fn(&toml::Value) -> Result<Box<dyn WalletProvider>, WalletError>;

pub trait WalletRegistry: ImplementationRegistry<Factory = WalletFactory> {}

/// All wallet provider implementations selectable from configuration.
pub fn get_all_implementations() -> Vec<(&'static str, WalletFactory)> {
	use implementations::json_rpc;

	vec![(json_rpc::Registry::NAME, json_rpc::Registry::factory())]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_user_rejection_is_singled_out() {
		assert!(matches!(
			WalletError::from_provider(ProviderError::user_rejected()),
			WalletError::UserRejected
		));
		assert!(matches!(
			WalletError::from_provider(ProviderError::new(codes::SERVER_ERROR, "boom")),
			WalletError::Provider(ProviderError { code: -32000, .. })
		));
	}

	#[test]
	fn test_provider_error_deserializes_rpc_payload() {
		let err: ProviderError = serde_json::from_str(
			r#"{"code": 3, "message": "execution reverted", "data": "0x08c379a0"}"#,
		)
		.unwrap();
		assert_eq!(err.code, codes::EXECUTION_REVERTED);
		assert_eq!(err.data, Some(serde_json::json!("0x08c379a0")));
	}

	#[test]
	fn test_registry_lists_json_rpc() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["json_rpc"]);
	}
}
