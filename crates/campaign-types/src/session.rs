//! Session identity types.
//!
//! Every change of wallet account or chain advances a shared [`SessionClock`].
//! Asynchronous work captures the [`SessionToken`] current at its start and
//! drops its result when the clock has moved on in the meantime.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stamp identifying one wallet/chain identity epoch.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SessionToken(pub u64);

impl fmt::Display for SessionToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Shared, monotonically increasing source of session tokens.
///
/// One clock is created per application session and handed to every component
/// that performs work spanning a suspension point.
#[derive(Debug, Default)]
pub struct SessionClock {
	current: AtomicU64,
}

impl SessionClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the token of the identity epoch currently in force.
	pub fn current(&self) -> SessionToken {
		SessionToken(self.current.load(Ordering::SeqCst))
	}

	/// Starts a new identity epoch and returns its token.
	pub fn advance(&self) -> SessionToken {
		SessionToken(self.current.fetch_add(1, Ordering::SeqCst) + 1)
	}

	/// True if no identity change happened since `token` was captured.
	pub fn is_current(&self, token: SessionToken) -> bool {
		self.current() == token
	}
}

/// Last known wallet identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
	/// First authorized account, if any.
	pub address: Option<Address>,
	/// Whether the user has authorized this client.
	pub connected: bool,
	/// Chain the provider reported last.
	pub chain_id: Option<u64>,
	/// Token stamped when this state was written.
	pub token: SessionToken,
}

impl WalletState {
	/// A disconnected state that remembers the last seen chain.
	pub fn disconnected(chain_id: Option<u64>, token: SessionToken) -> Self {
		Self {
			address: None,
			connected: false,
			chain_id,
			token,
		}
	}
}

/// Result of comparing the active chain to the expected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
	pub expected_chain_id: u64,
	pub current_chain_id: Option<u64>,
	pub is_valid: bool,
	pub token: SessionToken,
}

impl NetworkStatus {
	pub fn evaluate(
		expected_chain_id: u64,
		current_chain_id: Option<u64>,
		token: SessionToken,
	) -> Self {
		Self {
			expected_chain_id,
			current_chain_id,
			is_valid: current_chain_id == Some(expected_chain_id),
			token,
		}
	}
}
