//! Transaction records tracked by the orchestrator.
//!
//! A record is created when a write is handed to the wallet and ends in
//! `Confirmed` or `Failed`. Terminal records are never revived; a retry is a
//! new record.

use crate::errors::ClassifiedError;
use crate::session::SessionToken;
use crate::utils::current_timestamp;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Which registry write a record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
	CreateCampaign,
	Donate,
}

/// Lifecycle position of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
	/// Waiting for the wallet to accept the call.
	Submitting,
	/// Accepted by the wallet, waiting for inclusion.
	PendingConfirmation,
	/// Included and successful.
	Confirmed,
	/// Rejected, reverted, timed out or superseded.
	Failed,
}

impl TransactionStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, TransactionStatus::Confirmed | TransactionStatus::Failed)
	}
}

/// A single write and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
	/// Locally generated identifier.
	pub id: String,
	pub kind: TransactionKind,
	pub status: TransactionStatus,
	/// Hash assigned once the wallet accepted the call.
	pub hash: Option<B256>,
	/// Present only when `status` is `Failed`.
	pub error: Option<ClassifiedError>,
	/// Block of inclusion once confirmed.
	pub block_number: Option<u64>,
	/// Session token captured at submission.
	pub token: SessionToken,
	pub created_at: u64,
	pub updated_at: u64,
}

impl TransactionRecord {
	/// Creates a record in `Submitting`.
	pub fn new(kind: TransactionKind, token: SessionToken) -> Self {
		let now = current_timestamp();
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			kind,
			status: TransactionStatus::Submitting,
			hash: None,
			error: None,
			block_number: None,
			token,
			created_at: now,
			updated_at: now,
		}
	}
}
