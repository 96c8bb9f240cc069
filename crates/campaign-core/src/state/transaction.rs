//! Transaction record store and lifecycle table.
//!
//! Records move `Submitting -> PendingConfirmation -> Confirmed` or end in
//! `Failed` from either non-terminal state. Every change goes through
//! [`TransactionStore::transition`], which rejects moves the table does not
//! list, so a terminal record is never revived.

use campaign_types::{current_timestamp, TransactionRecord, TransactionStatus};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionStateError {
	#[error("Invalid state transition from {from:?} to {to:?}")]
	InvalidTransition {
		from: TransactionStatus,
		to: TransactionStatus,
	},
	#[error("Transaction not found: {0}")]
	NotFound(String),
}

static TRANSITIONS: Lazy<HashMap<TransactionStatus, HashSet<TransactionStatus>>> =
	Lazy::new(|| {
		use TransactionStatus::*;

		let mut table = HashMap::new();
		table.insert(Submitting, HashSet::from([PendingConfirmation, Failed]));
		table.insert(PendingConfirmation, HashSet::from([Confirmed, Failed]));
		table.insert(Confirmed, HashSet::new());
		table.insert(Failed, HashSet::new());
		table
	});

pub fn is_valid_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|allowed| allowed.contains(&to))
}

/// In-memory records of every write made in this process.
#[derive(Default)]
pub struct TransactionStore {
	records: DashMap<String, TransactionRecord>,
}

impl TransactionStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, record: TransactionRecord) {
		self.records.insert(record.id.clone(), record);
	}

	pub fn get(&self, id: &str) -> Option<TransactionRecord> {
		self.records.get(id).map(|entry| entry.value().clone())
	}

	/// All records, oldest first.
	pub fn list(&self) -> Vec<TransactionRecord> {
		let mut records: Vec<_> = self.records.iter().map(|e| e.value().clone()).collect();
		records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
		records
	}

	/// Moves a record to `to`, applying `update` to it in the same step.
	pub fn transition<F>(
		&self,
		id: &str,
		to: TransactionStatus,
		update: F,
	) -> Result<TransactionRecord, TransactionStateError>
	where
		F: FnOnce(&mut TransactionRecord),
	{
		let mut entry = self
			.records
			.get_mut(id)
			.ok_or_else(|| TransactionStateError::NotFound(id.to_string()))?;
		let record = entry.value_mut();

		if !is_valid_transition(record.status, to) {
			return Err(TransactionStateError::InvalidTransition {
				from: record.status,
				to,
			});
		}

		update(record);
		record.status = to;
		record.updated_at = current_timestamp();
		Ok(record.clone())
	}
}
