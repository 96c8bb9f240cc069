//! Error taxonomy for wallet and contract writes.
//!
//! Raw provider and contract failures are classified exactly once, at the
//! transaction orchestrator, into an [`ErrorKind`]. Local input validation is
//! kept separate in [`InvalidInput`] and never enters the taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed wallet or contract operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
	/// No wallet provider is present.
	ProviderUnavailable,
	/// The user declined the request in their wallet.
	UserRejected,
	/// The wallet is on a different chain than the configured one.
	NetworkMismatch,
	/// The account cannot cover value plus gas.
	InsufficientFunds,
	/// The node refused to estimate gas, usually because the call would revert.
	GasEstimationFailure,
	/// No contract binding exists for the current identity.
	ContractNotInitialized,
	/// The transaction was mined but reverted.
	TransactionReverted,
	/// The wallet or chain changed while the operation was in flight.
	StaleSession,
	/// Anything not covered above.
	UnknownRpcError,
}

impl ErrorKind {
	/// Recoverable kinds are fixed by a user action and leave other state alone.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, ErrorKind::NetworkMismatch | ErrorKind::ProviderUnavailable)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::ProviderUnavailable => "provider_unavailable",
			ErrorKind::UserRejected => "user_rejected",
			ErrorKind::NetworkMismatch => "network_mismatch",
			ErrorKind::InsufficientFunds => "insufficient_funds",
			ErrorKind::GasEstimationFailure => "gas_estimation_failure",
			ErrorKind::ContractNotInitialized => "contract_not_initialized",
			ErrorKind::TransactionReverted => "transaction_reverted",
			ErrorKind::StaleSession => "stale_session",
			ErrorKind::UnknownRpcError => "unknown_rpc_error",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A failure tagged with exactly one taxonomy value and a readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
	pub kind: ErrorKind,
	pub message: String,
}

impl ClassifiedError {
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}
}

/// Input rejected before any request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
	#[error("Please enter a title")]
	EmptyTitle,
	#[error("Please enter a description")]
	EmptyDescription,
	#[error("Please upload an image")]
	MissingImage,
	#[error("Amount must be greater than 0")]
	NonPositiveAmount,
	#[error("Deadline {deadline} is not in the future")]
	DeadlineInPast { deadline: u64 },
	#[error("A campaign cannot run for {days} days")]
	DurationOutOfRange { days: u64 },
	#[error("Invalid amount '{value}': {reason}")]
	MalformedAmount { value: String, reason: String },
}
