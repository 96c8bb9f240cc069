//! Write pipeline for registry transactions.
//!
//! A write is validated locally, checked against the expected network, held
//! for the stability window and prepared through the gateway before a record
//! exists. From then on a background task drives it through submission and
//! confirmation while the caller watches the record through a
//! [`TransactionTicket`]. Every failure is classified once, here.

use crate::classify::{classify, WriteFailure};
use crate::engine::event_bus::EventBus;
use crate::monitoring::TransactionMonitor;
use crate::state::TransactionStore;
use campaign_cache::CampaignCache;
use campaign_gateway::{ContractGateway, GatewayError, WriteCall};
use campaign_types::{
	current_timestamp, truncate_id, AppEvent, CampaignDraft, ClassifiedError, ErrorKind,
	InvalidInput, NotificationSink, SessionToken, TransactionEvent, TransactionKind,
	TransactionRecord, TransactionStatus, U256,
};
use campaign_wallet::{NetworkGuard, WalletSession};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::instrument;

pub const MSG_CONFIRM_IN_WALLET: &str = "Please confirm the transaction in your wallet...";
pub const MSG_SENT: &str = "Transaction sent! Waiting for confirmation...";
pub const MSG_DONATED: &str = "Donation successful!";
pub const MSG_CREATED: &str = "NFT minted successfully!";

/// Why a write was refused before a record was created.
#[derive(Debug, Error)]
pub enum OrchestratorError {
	#[error(transparent)]
	InvalidInput(#[from] InvalidInput),
	#[error("{}", .0.message)]
	Rejected(ClassifiedError),
}

impl OrchestratorError {
	/// Taxonomy value, absent for local validation failures.
	pub fn kind(&self) -> Option<ErrorKind> {
		match self {
			OrchestratorError::InvalidInput(_) => None,
			OrchestratorError::Rejected(err) => Some(err.kind),
		}
	}
}

/// Handle on a write that has been handed to the background pipeline.
#[derive(Debug)]
pub struct TransactionTicket {
	/// The record as it was when the write started.
	pub record: TransactionRecord,
	updates: watch::Receiver<TransactionRecord>,
}

impl TransactionTicket {
	pub fn id(&self) -> &str {
		&self.record.id
	}

	pub fn latest(&self) -> TransactionRecord {
		self.updates.borrow().clone()
	}

	pub fn updates(&self) -> watch::Receiver<TransactionRecord> {
		self.updates.clone()
	}

	/// Resolves once the record reaches `Confirmed` or `Failed`.
	pub async fn wait(mut self) -> TransactionRecord {
		if let Ok(record) = self.updates.wait_for(|r| r.status.is_terminal()).await {
			return record.clone();
		}
		self.updates.borrow().clone()
	}
}

pub struct TransactionOrchestrator {
	session: Arc<WalletSession>,
	guard: Arc<NetworkGuard>,
	gateway: Arc<ContractGateway>,
	cache: Arc<CampaignCache>,
	monitor: TransactionMonitor,
	store: TransactionStore,
	event_bus: EventBus,
	notifier: Arc<dyn NotificationSink>,
	stability_window: Duration,
}

impl TransactionOrchestrator {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		session: Arc<WalletSession>,
		guard: Arc<NetworkGuard>,
		gateway: Arc<ContractGateway>,
		cache: Arc<CampaignCache>,
		monitor: TransactionMonitor,
		event_bus: EventBus,
		notifier: Arc<dyn NotificationSink>,
		stability_window: Duration,
	) -> Self {
		Self {
			session,
			guard,
			gateway,
			cache,
			monitor,
			store: TransactionStore::new(),
			event_bus,
			notifier,
			stability_window,
		}
	}

	pub fn get(&self, id: &str) -> Option<TransactionRecord> {
		self.store.get(id)
	}

	pub fn list(&self) -> Vec<TransactionRecord> {
		self.store.list()
	}

	/// Starts a `createCampaign` write for `draft`.
	#[instrument(skip_all, fields(title = %draft.title))]
	pub async fn create_campaign(
		self: &Arc<Self>,
		draft: CampaignDraft,
	) -> Result<TransactionTicket, OrchestratorError> {
		let kind = TransactionKind::CreateCampaign;
		draft.validate(current_timestamp())?;
		let token = self.session.token();

		self.preflight(token).await.map_err(|f| self.reject(kind, f))?;
		let call = self
			.gateway
			.create_campaign(&draft, token)
			.map_err(|e| self.reject(kind, e.into()))?;

		Ok(self.launch(call))
	}

	/// Starts a donation of `amount_minor` to `campaign_id`.
	#[instrument(skip_all, fields(campaign_id = campaign_id, amount = %amount_minor))]
	pub async fn donate(
		self: &Arc<Self>,
		campaign_id: u64,
		amount_minor: U256,
	) -> Result<TransactionTicket, OrchestratorError> {
		let kind = TransactionKind::Donate;
		if amount_minor.is_zero() {
			return Err(InvalidInput::NonPositiveAmount.into());
		}
		let token = self.session.token();

		self.preflight(token).await.map_err(|f| self.reject(kind, f))?;
		let call = self
			.gateway
			.donate(campaign_id, amount_minor, token)
			.map_err(|e| self.reject(kind, e.into()))?;

		let balance = self
			.gateway
			.native_balance(call.request.from)
			.await
			.map_err(|e| self.reject(kind, e.into()))?;
		if !self.session.clock().is_current(token) {
			return Err(self.reject(kind, WriteFailure::StaleSession));
		}
		if balance < amount_minor {
			return Err(self.reject(kind, WriteFailure::InsufficientBalance));
		}

		Ok(self.launch(call))
	}

	/// Network check immediately before a write started under `token`.
	///
	/// Any identity change while the checks are suspended, even one that
	/// lands back on the expected chain, refuses the write.
	async fn preflight(&self, token: SessionToken) -> Result<(), WriteFailure> {
		let clock = self.session.clock();
		let status = self.guard.check().await?;
		if !clock.is_current(token) {
			return Err(WriteFailure::StaleSession);
		}
		if !status.is_valid {
			return Err(self.guard.mismatch().into());
		}
		if !self.guard.ensure_stable(self.stability_window).await? {
			return Err(WriteFailure::UnstableNetwork {
				hint: self.guard.expected().mismatch_hint(),
			});
		}
		if !clock.is_current(token) {
			return Err(WriteFailure::StaleSession);
		}
		Ok(())
	}

	fn reject(&self, kind: TransactionKind, failure: WriteFailure) -> OrchestratorError {
		if let WriteFailure::Gateway(GatewayError::InvalidInput(input)) = failure {
			return OrchestratorError::InvalidInput(input);
		}

		let error = classify(&failure);
		tracing::warn!(kind = %error.kind, error = %failure, "Write refused");
		self.notifier.error(&failure_text(kind, &error));
		OrchestratorError::Rejected(error)
	}

	fn launch(self: &Arc<Self>, call: WriteCall) -> TransactionTicket {
		let record = call.record.clone();
		self.store.insert(record.clone());
		self.publish(TransactionEvent::Submitting {
			record: record.clone(),
		});
		self.notifier.info(MSG_CONFIRM_IN_WALLET);

		let (updates_tx, updates) = watch::channel(record.clone());
		let orchestrator = self.clone();
		tokio::spawn(async move {
			orchestrator.drive(call, updates_tx).await;
		});

		TransactionTicket { record, updates }
	}

	#[instrument(
		skip_all,
		fields(tx_id = %truncate_id(&call.record.id), kind = ?call.record.kind)
	)]
	async fn drive(&self, call: WriteCall, updates: watch::Sender<TransactionRecord>) {
		let id = call.record.id.as_str();
		let kind = call.record.kind;
		let token = call.record.token;
		let clock = self.session.clock();

		let hash = match self.gateway.send(&call).await {
			Ok(hash) if clock.is_current(token) => hash,
			Ok(hash) => {
				tracing::warn!(
					tx_hash = %truncate_id(&hash.to_string()),
					"Hash arrived after the session changed"
				);
				return self.fail(id, kind, WriteFailure::StaleSession, &updates);
			},
			Err(_) if !clock.is_current(token) => {
				return self.fail(id, kind, WriteFailure::StaleSession, &updates);
			},
			Err(e) => return self.fail(id, kind, e.into(), &updates),
		};

		let pending = self.store.transition(id, TransactionStatus::PendingConfirmation, |r| {
			r.hash = Some(hash);
		});
		match pending {
			Ok(record) => {
				self.publish(TransactionEvent::Pending {
					record: record.clone(),
				});
				self.notifier.info(MSG_SENT);
				updates.send_replace(record);
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to record pending transaction");
				return;
			},
		}

		match self.monitor.wait_for_confirmation(hash, token).await {
			Ok(block_number) => self.confirm(id, kind, block_number, &updates),
			Err(failure) => self.fail(id, kind, failure, &updates),
		}
	}

	fn confirm(
		&self,
		id: &str,
		kind: TransactionKind,
		block_number: u64,
		updates: &watch::Sender<TransactionRecord>,
	) {
		let confirmed = self.store.transition(id, TransactionStatus::Confirmed, |r| {
			r.block_number = Some(block_number);
		});
		let record = match confirmed {
			Ok(record) => record,
			Err(e) => {
				tracing::error!(error = %e, "Failed to record confirmation");
				return;
			},
		};

		tracing::info!(block = block_number, "Transaction confirmed");
		self.publish(TransactionEvent::Confirmed {
			record: record.clone(),
		});
		self.notifier.success(match kind {
			TransactionKind::CreateCampaign => MSG_CREATED,
			TransactionKind::Donate => MSG_DONATED,
		});
		self.cache.invalidate();
		updates.send_replace(record);
	}

	fn fail(
		&self,
		id: &str,
		kind: TransactionKind,
		failure: WriteFailure,
		updates: &watch::Sender<TransactionRecord>,
	) {
		let error = classify(&failure);
		let failed = self.store.transition(id, TransactionStatus::Failed, |r| {
			r.error = Some(error.clone());
		});
		let record = match failed {
			Ok(record) => record,
			Err(e) => {
				tracing::error!(error = %e, "Failed to record transaction failure");
				return;
			},
		};

		tracing::warn!(kind = %error.kind, error = %failure, "Transaction failed");
		self.publish(TransactionEvent::Failed {
			record: record.clone(),
		});
		self.notifier.error(&failure_text(kind, &error));
		updates.send_replace(record);
	}

	fn publish(&self, event: TransactionEvent) {
		self.event_bus.publish(AppEvent::Transaction(event)).ok();
	}
}

fn failure_text(kind: TransactionKind, error: &ClassifiedError) -> String {
	match kind {
		TransactionKind::CreateCampaign => format!("Failed to mint NFT: {}", error.message),
		TransactionKind::Donate => format!("Donation failed: {}", error.message),
	}
}
