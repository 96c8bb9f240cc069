//! Confirmation polling for submitted writes.
//!
//! Polls the receipt of a pending write until it is included with enough
//! confirmations, reverts, times out, or the session it was submitted under
//! is superseded. The session check runs after every suspension, so a write
//! is never reported confirmed against a binding that no longer holds.

use crate::classify::WriteFailure;
use campaign_config::TransactionsConfig;
use campaign_gateway::{ContractGateway, GatewayError};
use campaign_types::{truncate_id, SessionClock, SessionToken, B256};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub struct TransactionMonitor {
	gateway: Arc<ContractGateway>,
	clock: Arc<SessionClock>,
	poll_interval: Duration,
	timeout: Duration,
	min_confirmations: u64,
}

impl TransactionMonitor {
	pub fn new(
		gateway: Arc<ContractGateway>,
		clock: Arc<SessionClock>,
		settings: &TransactionsConfig,
	) -> Self {
		Self {
			gateway,
			clock,
			poll_interval: settings.poll_interval(),
			timeout: settings.confirmation_timeout(),
			min_confirmations: settings.min_confirmations.max(1),
		}
	}

	/// Waits for `hash` and returns its inclusion block.
	#[instrument(skip_all, fields(tx_hash = %truncate_id(&hash.to_string()), token = %token))]
	pub async fn wait_for_confirmation(
		&self,
		hash: B256,
		token: SessionToken,
	) -> Result<u64, WriteFailure> {
		let started = tokio::time::Instant::now();

		loop {
			self.ensure_current(token)?;
			if started.elapsed() > self.timeout {
				tracing::warn!(
					timeout_secs = self.timeout.as_secs(),
					"Transaction monitoring timeout reached"
				);
				return Err(WriteFailure::ConfirmationTimeout {
					seconds: self.timeout.as_secs(),
				});
			}

			match self.gateway.receipt(hash).await {
				Ok(Some(receipt)) => {
					self.ensure_current(token)?;
					if !receipt.success {
						return Err(WriteFailure::Reverted {
							block_number: receipt.block_number,
						});
					}
					if self.confirmed(receipt.block_number, token).await? {
						tracing::info!(block = receipt.block_number, "Confirmed");
						return Ok(receipt.block_number);
					}
				},
				Ok(None) => {
					tracing::debug!(
						elapsed_secs = started.elapsed().as_secs(),
						"Waiting for transaction to be mined"
					);
				},
				Err(GatewayError::StaleBinding) => return Err(WriteFailure::StaleSession),
				Err(e) => {
					tracing::warn!(error = %e, "Checking transaction status failed");
				},
			}

			tokio::time::sleep(self.poll_interval).await;
		}
	}

	async fn confirmed(&self, included_in: u64, token: SessionToken) -> Result<bool, WriteFailure> {
		if self.min_confirmations <= 1 {
			return Ok(true);
		}
		let latest = match self.gateway.block_number().await {
			Ok(latest) => latest,
			Err(GatewayError::StaleBinding) => return Err(WriteFailure::StaleSession),
			Err(e) => {
				tracing::warn!(error = %e, "Reading block number failed");
				return Ok(false);
			},
		};
		self.ensure_current(token)?;
		Ok(latest.saturating_sub(included_in) + 1 >= self.min_confirmations)
	}

	fn ensure_current(&self, token: SessionToken) -> Result<(), WriteFailure> {
		if self.clock.is_current(token) {
			Ok(())
		} else {
			Err(WriteFailure::StaleSession)
		}
	}
}
