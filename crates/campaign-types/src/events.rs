//! Event types for inter-component communication.
//!
//! Events are published on the engine's event bus after every session change,
//! transaction transition and cache update. They are informational: state is
//! owned by the components, never by event consumers.

use crate::session::SessionToken;
use crate::transaction::TransactionRecord;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Main event type, grouped by the component that produces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
	Session(SessionEvent),
	Transaction(TransactionEvent),
	Cache(CacheEvent),
}

/// Wallet identity, network and contract binding changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
	/// An account was authorized or switched to.
	AccountChanged {
		address: Address,
		token: SessionToken,
	},
	/// The wallet reported a new chain.
	ChainChanged {
		chain_id: Option<u64>,
		valid: bool,
		token: SessionToken,
	},
	/// The session lost its account.
	Disconnected { token: SessionToken },
	/// A new contract handle replaced the previous one.
	GatewayBound {
		contract: Address,
		signer: Address,
		chain_id: u64,
		token: SessionToken,
	},
	/// The contract handle was dropped.
	GatewayUnbound { token: SessionToken },
}

/// Transaction lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransactionEvent {
	/// The write is waiting for the wallet.
	Submitting { record: TransactionRecord },
	/// The wallet accepted the write and returned a hash.
	Pending { record: TransactionRecord },
	/// The write was included successfully.
	Confirmed { record: TransactionRecord },
	/// The write ended without effect.
	Failed { record: TransactionRecord },
}

impl TransactionEvent {
	pub fn record(&self) -> &TransactionRecord {
		match self {
			TransactionEvent::Submitting { record }
			| TransactionEvent::Pending { record }
			| TransactionEvent::Confirmed { record }
			| TransactionEvent::Failed { record } => record,
		}
	}
}

/// Campaign cache updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CacheEvent {
	/// The snapshot was marked stale and a refresh scheduled.
	Invalidated,
	/// A fetch replaced the snapshot.
	Refreshed { sequence: u64, campaigns: usize },
	/// A fetch result was dropped.
	Discarded { sequence: u64, reason: String },
}
