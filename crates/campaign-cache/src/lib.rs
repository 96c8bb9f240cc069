//! Cached view of the campaign registry.
//!
//! The cache keeps the last good snapshot of `getCampaigns()` and serves the
//! open/closed partitions from it, evaluated at read time. Every fetch is
//! stamped with a sequence number and the session token; a result is applied
//! only if no later fetch has been applied and the identity it was computed
//! under is still current. Readers never see an empty list while a refresh is
//! in flight.

use arc_swap::ArcSwap;
use campaign_gateway::{ContractGateway, GatewayError};
use campaign_types::{Campaign, CacheEvent, SessionClock, SessionToken};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum CacheError {
	#[error(transparent)]
	Gateway(#[from] GatewayError),
}

/// Why a fetched snapshot was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
	/// A fetch that started later was applied first.
	Superseded,
	/// The wallet identity changed while the fetch was outstanding.
	SessionChanged,
}

impl DiscardReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			DiscardReason::Superseded => "superseded by a newer fetch",
			DiscardReason::SessionChanged => "session changed during fetch",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
	Applied { sequence: u64, campaigns: usize },
	Discarded { sequence: u64, reason: DiscardReason },
}

pub struct CampaignCache {
	gateway: Arc<ContractGateway>,
	clock: Arc<SessionClock>,
	snapshot: ArcSwap<Vec<Campaign>>,
	next_sequence: AtomicU64,
	/// Highest sequence whose result replaced the snapshot.
	applied: Mutex<u64>,
	stale: AtomicBool,
	/// Last sequence handed out before the most recent invalidation.
	invalidated_at: AtomicU64,
	events: broadcast::Sender<CacheEvent>,
}

impl CampaignCache {
	pub fn new(gateway: Arc<ContractGateway>, clock: Arc<SessionClock>) -> Self {
		let (events, _) = broadcast::channel(64);
		Self {
			gateway,
			clock,
			snapshot: ArcSwap::from_pointee(Vec::new()),
			next_sequence: AtomicU64::new(0),
			applied: Mutex::new(0),
			stale: AtomicBool::new(true),
			invalidated_at: AtomicU64::new(0),
			events,
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
		self.events.subscribe()
	}

	/// Last good snapshot, in registry order.
	pub fn snapshot(&self) -> Arc<Vec<Campaign>> {
		self.snapshot.load_full()
	}

	pub fn get(&self, id: u64) -> Option<Campaign> {
		self.snapshot.load().iter().find(|c| c.id == id).cloned()
	}

	/// Campaigns still accepting donations at `now`.
	pub fn get_open(&self, now: u64) -> Vec<Campaign> {
		self.partition(now, true)
	}

	/// Campaigns that reached their target or passed their deadline at `now`.
	pub fn get_closed(&self, now: u64) -> Vec<Campaign> {
		self.partition(now, false)
	}

	fn partition(&self, now: u64, open: bool) -> Vec<Campaign> {
		self.snapshot
			.load()
			.iter()
			.filter(|c| c.is_open_at(now) == open)
			.cloned()
			.collect()
	}

	/// True until a fetch started after the last invalidation is applied.
	pub fn is_stale(&self) -> bool {
		self.stale.load(Ordering::SeqCst)
	}

	/// Fetches the registry and applies the result if it is still the newest.
	pub async fn refresh(&self) -> Result<RefreshOutcome, CacheError> {
		let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
		let token = self.clock.current();

		let campaigns = match self.gateway.list_campaigns().await {
			Ok(campaigns) => campaigns,
			Err(GatewayError::StaleBinding) => {
				return Ok(self.discard(sequence, DiscardReason::SessionChanged));
			},
			Err(e) => {
				tracing::warn!(sequence, error = %e, "Campaign fetch failed");
				return Err(e.into());
			},
		};

		Ok(self.apply(sequence, token, campaigns))
	}

	fn apply(
		&self,
		sequence: u64,
		token: SessionToken,
		campaigns: Vec<Campaign>,
	) -> RefreshOutcome {
		if !self.clock.is_current(token) {
			return self.discard(sequence, DiscardReason::SessionChanged);
		}

		let mut applied = self.applied.lock().unwrap_or_else(|p| p.into_inner());
		if sequence <= *applied {
			drop(applied);
			return self.discard(sequence, DiscardReason::Superseded);
		}
		*applied = sequence;

		let count = campaigns.len();
		self.snapshot.store(Arc::new(campaigns));
		if sequence > self.invalidated_at.load(Ordering::SeqCst) {
			self.stale.store(false, Ordering::SeqCst);
		}
		drop(applied);

		tracing::debug!(sequence, campaigns = count, "Campaign snapshot replaced");
		let _ = self.events.send(CacheEvent::Refreshed {
			sequence,
			campaigns: count,
		});
		RefreshOutcome::Applied {
			sequence,
			campaigns: count,
		}
	}

	fn discard(&self, sequence: u64, reason: DiscardReason) -> RefreshOutcome {
		tracing::debug!(sequence, reason = reason.as_str(), "Campaign fetch discarded");
		let _ = self.events.send(CacheEvent::Discarded {
			sequence,
			reason: reason.as_str().to_string(),
		});
		RefreshOutcome::Discarded { sequence, reason }
	}

	/// Marks the snapshot stale and schedules a refresh.
	///
	/// Readers keep the previous snapshot until the refresh lands.
	pub fn invalidate(self: &Arc<Self>) -> JoinHandle<()> {
		self.invalidated_at
			.store(self.next_sequence.load(Ordering::SeqCst), Ordering::SeqCst);
		self.stale.store(true, Ordering::SeqCst);
		let _ = self.events.send(CacheEvent::Invalidated);

		let cache = self.clone();
		tokio::spawn(async move {
			if let Err(e) = cache.refresh().await {
				tracing::warn!(error = %e, "Scheduled campaign refresh failed");
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::Bytes;
	use alloy_sol_types::SolCall;
	use campaign_gateway::contract::{getCampaignsCall, CampaignEntry};
	use campaign_types::{Address, U256};
	use campaign_wallet::implementations::mock::MockProvider;
	use campaign_wallet::WalletProvider;
	use serde_json::json;

	const ONE: u128 = 1_000_000_000_000_000_000;
	const NOW: u64 = 1_000;

	fn entry(title: &str, target: u128, collected: u128, deadline: u64) -> CampaignEntry {
		CampaignEntry {
			owner: Address::repeat_byte(0x22),
			title: title.to_string(),
			description: String::new(),
			target: U256::from(target),
			deadline: U256::from(deadline),
			amountCollected: U256::from(collected),
			image: String::new(),
		}
	}

	fn registry(entries: Vec<CampaignEntry>) -> serde_json::Value {
		json!(Bytes::from(getCampaignsCall::abi_encode_returns(&(entries,))))
	}

	fn cache() -> (Arc<CampaignCache>, Arc<MockProvider>, Arc<SessionClock>) {
		let clock = Arc::new(SessionClock::new());
		let mock = Arc::new(MockProvider::on_chain(545, Address::repeat_byte(0xa1)));
		let gateway = Arc::new(ContractGateway::new(18, clock.clone()));
		gateway.bind(
			Address::repeat_byte(0xcc),
			Address::repeat_byte(0xa1),
			545,
			mock.clone() as Arc<dyn WalletProvider>,
		);
		(
			Arc::new(CampaignCache::new(gateway, clock.clone())),
			mock,
			clock,
		)
	}

	#[tokio::test]
	async fn test_partitions_at_read_time() {
		let (cache, mock, _) = cache();
		mock.on(
			"eth_call",
			Ok(registry(vec![
				entry("running", 10 * ONE, ONE, NOW + 100),
				entry("funded", ONE, 2 * ONE, NOW + 100),
				entry("expired", 10 * ONE, 0, NOW - 1),
			])),
		);

		cache.refresh().await.unwrap();
		let open: Vec<_> = cache.get_open(NOW).into_iter().map(|c| c.title).collect();
		let closed: Vec<_> = cache.get_closed(NOW).into_iter().map(|c| c.title).collect();
		assert_eq!(open, vec!["running"]);
		assert_eq!(closed, vec!["funded", "expired"]);

		// The same snapshot reads differently once the deadline passes.
		assert!(cache.get_open(NOW + 100).is_empty());
		assert_eq!(cache.get(1).unwrap().title, "funded");
	}

	#[test]
	fn test_older_sequence_never_overwrites_newer() {
		let (cache, _, clock) = cache();
		let token = clock.current();

		let newer = cache.apply(2, token, vec![]);
		assert_eq!(newer, RefreshOutcome::Applied { sequence: 2, campaigns: 0 });

		let older = cache.apply(1, token, vec![]);
		assert_eq!(
			older,
			RefreshOutcome::Discarded {
				sequence: 1,
				reason: DiscardReason::Superseded
			}
		);
	}

	#[tokio::test]
	async fn test_result_dropped_after_identity_change() {
		let (cache, mock, clock) = cache();
		mock.on("eth_call", Ok(registry(vec![entry("a", ONE, 0, NOW)])));
		let gate = mock.hold("eth_call");

		let pending = {
			let cache = cache.clone();
			tokio::spawn(async move { cache.refresh().await })
		};
		while mock.count("eth_call") == 0 {
			tokio::task::yield_now().await;
		}
		clock.advance();
		gate.notify_one();

		assert!(matches!(
			pending.await.unwrap().unwrap(),
			RefreshOutcome::Discarded {
				reason: DiscardReason::SessionChanged,
				..
			}
		));
		assert!(cache.snapshot().is_empty());
	}

	#[tokio::test]
	async fn test_invalidate_keeps_last_good_snapshot() {
		let (cache, mock, _) = cache();
		mock.on("eth_call", Ok(registry(vec![entry("first", ONE, 0, NOW)])));
		cache.refresh().await.unwrap();
		assert!(!cache.is_stale());

		mock.on(
			"eth_call",
			Ok(registry(vec![
				entry("first", ONE, 0, NOW),
				entry("second", ONE, 0, NOW),
			])),
		);
		let gate = mock.hold("eth_call");
		let mut events = cache.subscribe();

		let refresh = cache.invalidate();
		assert!(cache.is_stale());
		assert_eq!(cache.snapshot().len(), 1);
		assert!(matches!(events.recv().await.unwrap(), CacheEvent::Invalidated));

		gate.notify_one();
		refresh.await.unwrap();
		assert_eq!(cache.snapshot().len(), 2);
		assert!(!cache.is_stale());
		assert!(matches!(
			events.recv().await.unwrap(),
			CacheEvent::Refreshed { campaigns: 2, .. }
		));
	}

	#[tokio::test]
	async fn test_failed_fetch_keeps_snapshot() {
		let (cache, mock, _) = cache();
		mock.push("eth_call", Ok(registry(vec![entry("kept", ONE, 0, NOW)])));
		cache.refresh().await.unwrap();

		// No sticky response: the next call fails with an unsupported-method error.
		assert!(cache.refresh().await.is_err());
		assert_eq!(cache.snapshot()[0].title, "kept");
	}
}
