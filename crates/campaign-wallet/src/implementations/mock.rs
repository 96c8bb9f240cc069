//! Scriptable in-memory wallet provider for tests.
//!
//! Responses are configured per method, either sticky (`on`) or one-shot
//! (`push`, consumed before sticky ones). A method can be held with `hold`
//! until the test releases it, which lets tests change identity while a
//! request is outstanding.

use crate::{codes, ProviderError, ProviderEvent, WalletProvider};
use async_trait::async_trait;
use campaign_types::{Address, ConfigSchema, Schema, SchemaError};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};

type Response = Result<Value, ProviderError>;

pub struct MockProvider {
	sticky: Mutex<HashMap<String, Response>>,
	queued: Mutex<HashMap<String, VecDeque<Response>>>,
	holds: Mutex<HashMap<String, Arc<Notify>>>,
	calls: Mutex<Vec<(String, Value)>>,
	events: broadcast::Sender<ProviderEvent>,
}

impl Default for MockProvider {
	fn default() -> Self {
		Self::new()
	}
}

impl MockProvider {
	pub fn new() -> Self {
		let (events, _) = broadcast::channel(64);
		Self {
			sticky: Mutex::new(HashMap::new()),
			queued: Mutex::new(HashMap::new()),
			holds: Mutex::new(HashMap::new()),
			calls: Mutex::new(Vec::new()),
			events,
		}
	}

	/// A provider on `chain_id` with `account` already authorized.
	pub fn on_chain(chain_id: u64, account: Address) -> Self {
		let mock = Self::new();
		mock.on("eth_chainId", Ok(json!(format!("0x{:x}", chain_id))));
		mock.on("eth_accounts", Ok(json!([account])));
		mock.on("eth_requestAccounts", Ok(json!([account])));
		mock
	}

	/// Answers every `method` request with `response`.
	pub fn on(&self, method: &str, response: Response) {
		lock(&self.sticky).insert(method.to_string(), response);
	}

	/// Answers the next `method` request with `response`.
	pub fn push(&self, method: &str, response: Response) {
		lock(&self.queued)
			.entry(method.to_string())
			.or_default()
			.push_back(response);
	}

	/// Blocks `method` requests until the returned handle is notified.
	pub fn hold(&self, method: &str) -> Arc<Notify> {
		let gate = Arc::new(Notify::new());
		lock(&self.holds).insert(method.to_string(), gate.clone());
		gate
	}

	pub fn emit(&self, event: ProviderEvent) {
		let _ = self.events.send(event);
	}

	pub fn calls(&self) -> Vec<(String, Value)> {
		lock(&self.calls).clone()
	}

	pub fn count(&self, method: &str) -> usize {
		lock(&self.calls).iter().filter(|(m, _)| m == method).count()
	}

	fn respond(&self, method: &str) -> Response {
		if let Some(response) = lock(&self.queued)
			.get_mut(method)
			.and_then(|queue| queue.pop_front())
		{
			return response;
		}
		lock(&self.sticky).get(method).cloned().unwrap_or_else(|| {
			Err(ProviderError::new(
				codes::UNSUPPORTED_METHOD,
				format!("Method {} not scripted", method),
			))
		})
	}
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct MockSchema;

impl ConfigSchema for MockSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

#[async_trait]
impl WalletProvider for MockProvider {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockSchema)
	}

	async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
		lock(&self.calls).push((method.to_string(), params));

		let gate = lock(&self.holds).get(method).cloned();
		if let Some(gate) = gate {
			gate.notified().await;
		}

		self.respond(method)
	}

	fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
		self.events.subscribe()
	}
}
