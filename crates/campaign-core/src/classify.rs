//! Classification of write-path failures.
//!
//! Every way a registry write can fail is first collected into a
//! [`WriteFailure`] and then tagged by [`classify`] with exactly one
//! [`ErrorKind`] and the message shown to the user.

use campaign_gateway::GatewayError;
use campaign_types::{ClassifiedError, ErrorKind};
use campaign_wallet::{codes, ProviderError, WalletError};
use thiserror::Error;

pub const MSG_USER_REJECTED: &str = "Transaction was rejected by user";
pub const MSG_INSUFFICIENT_BALANCE: &str = "Insufficient balance for donation";
pub const MSG_INSUFFICIENT_FUNDS: &str = "Insufficient funds to cover this transaction";
pub const MSG_WOULD_FAIL: &str = "Transaction would fail. Please check your input values";
pub const MSG_NOT_INITIALIZED: &str = "Contract not initialized. Please connect your wallet";
pub const MSG_NO_PROVIDER: &str = "No wallet provider found. Please install a wallet";
pub const MSG_REVERTED: &str = "Transaction reverted";
pub const MSG_STALE: &str = "Wallet or network changed before the transaction completed";
pub const MSG_UNKNOWN: &str = "Transaction failed. Please try again";

/// A failure somewhere between input validation and confirmation.
#[derive(Debug, Error)]
pub enum WriteFailure {
	#[error(transparent)]
	Wallet(#[from] WalletError),
	#[error(transparent)]
	Gateway(#[from] GatewayError),
	/// The chain changed between the two stability samples.
	#[error("Network changed while preparing the transaction")]
	UnstableNetwork { hint: String },
	/// The local balance check before a donation failed.
	#[error("Balance too low for donation")]
	InsufficientBalance,
	#[error("Transaction reverted in block {block_number}")]
	Reverted { block_number: u64 },
	#[error("No confirmation after {seconds} seconds")]
	ConfirmationTimeout { seconds: u64 },
	/// The identity the write was submitted under is no longer current.
	#[error("Session changed while the transaction was in flight")]
	StaleSession,
}

pub fn classify(failure: &WriteFailure) -> ClassifiedError {
	match failure {
		WriteFailure::Wallet(err) => classify_wallet(err),
		WriteFailure::Gateway(err) => classify_gateway(err),
		WriteFailure::UnstableNetwork { hint } => {
			ClassifiedError::new(ErrorKind::NetworkMismatch, hint.clone())
		},
		WriteFailure::InsufficientBalance => {
			ClassifiedError::new(ErrorKind::InsufficientFunds, MSG_INSUFFICIENT_BALANCE)
		},
		WriteFailure::Reverted { .. } => {
			ClassifiedError::new(ErrorKind::TransactionReverted, MSG_REVERTED)
		},
		WriteFailure::StaleSession => ClassifiedError::new(ErrorKind::StaleSession, MSG_STALE),
		WriteFailure::ConfirmationTimeout { .. } => unknown(failure),
	}
}

fn classify_wallet(err: &WalletError) -> ClassifiedError {
	match err {
		WalletError::ProviderUnavailable => {
			ClassifiedError::new(ErrorKind::ProviderUnavailable, MSG_NO_PROVIDER)
		},
		WalletError::UserRejected => {
			ClassifiedError::new(ErrorKind::UserRejected, MSG_USER_REJECTED)
		},
		WalletError::NetworkMismatch { hint } => {
			ClassifiedError::new(ErrorKind::NetworkMismatch, hint.clone())
		},
		WalletError::NoAccount => {
			ClassifiedError::new(ErrorKind::ContractNotInitialized, MSG_NOT_INITIALIZED)
		},
		WalletError::Provider(provider) => classify_provider(provider, false),
		WalletError::AlreadySubscribed
		| WalletError::InvalidResponse { .. }
		| WalletError::InvalidConfig(_) => unknown(err),
	}
}

fn classify_gateway(err: &GatewayError) -> ClassifiedError {
	match err {
		GatewayError::NotInitialized => {
			ClassifiedError::new(ErrorKind::ContractNotInitialized, MSG_NOT_INITIALIZED)
		},
		GatewayError::StaleBinding => ClassifiedError::new(ErrorKind::StaleSession, MSG_STALE),
		GatewayError::GasEstimation(provider) => classify_provider(provider, true),
		GatewayError::Provider(provider) => classify_provider(provider, false),
		GatewayError::InvalidInput(_) | GatewayError::Decode { .. } => unknown(err),
	}
}

/// Reads the EIP-1193 code first and falls back to well-known node messages.
fn classify_provider(err: &ProviderError, estimating: bool) -> ClassifiedError {
	let message = err.message.to_lowercase();

	if err.is_user_rejection() || message.contains("user denied") {
		return ClassifiedError::new(ErrorKind::UserRejected, MSG_USER_REJECTED);
	}
	if message.contains("insufficient funds") {
		return ClassifiedError::new(ErrorKind::InsufficientFunds, MSG_INSUFFICIENT_FUNDS);
	}
	if estimating
		|| err.code == codes::EXECUTION_REVERTED
		|| message.contains("execution reverted")
		|| message.contains("gas required exceeds")
		|| message.contains("cannot estimate gas")
	{
		return ClassifiedError::new(ErrorKind::GasEstimationFailure, MSG_WOULD_FAIL);
	}
	if err.code == codes::DISCONNECTED || err.code == codes::CHAIN_DISCONNECTED {
		return ClassifiedError::new(ErrorKind::ProviderUnavailable, MSG_NO_PROVIDER);
	}
	unknown(err)
}

fn unknown(err: &dyn std::error::Error) -> ClassifiedError {
	tracing::error!(error = %err, "Unclassified write failure");
	ClassifiedError::new(ErrorKind::UnknownRpcError, MSG_UNKNOWN)
}
