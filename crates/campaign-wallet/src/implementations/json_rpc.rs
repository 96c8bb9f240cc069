//! Wallet provider backed by a plain JSON-RPC node.
//!
//! Requests are forwarded over HTTP. The wallet-only methods are emulated
//! locally: chain switching moves between endpoints the provider knows,
//! `wallet_addEthereumChain` teaches it new ones, and with a configured
//! private key accounts and `eth_sendTransaction` are served by a local
//! signer through an alloy provider.

use crate::{
	codes, ProviderError, ProviderEvent, WalletError, WalletFactory, WalletProvider,
	WalletRegistry,
};
use alloy_network::EthereumWallet;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use campaign_types::{
	parse_chain_id, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SchemaError,
	SecretString,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
struct Endpoint {
	chain_id: Option<u64>,
	url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
	#[serde(default)]
	result: Option<Value>,
	#[serde(default)]
	error: Option<ProviderError>,
}

pub struct JsonRpcWallet {
	client: reqwest::Client,
	active: RwLock<Endpoint>,
	/// Chains this provider can switch to, by chain id.
	known: RwLock<HashMap<u64, String>>,
	signer: Option<PrivateKeySigner>,
	events: broadcast::Sender<ProviderEvent>,
	next_id: AtomicU64,
}

impl JsonRpcWallet {
	pub fn new(
		rpc_url: String,
		chain_id: Option<u64>,
		private_key: Option<SecretString>,
		timeout: Duration,
	) -> Result<Self, WalletError> {
		let signer = private_key
			.map(|key| {
				key.with_exposed(|k| k.trim_start_matches("0x").parse::<PrivateKeySigner>())
					.map_err(|_| WalletError::InvalidConfig("Invalid private key".to_string()))
			})
			.transpose()?;

		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| WalletError::InvalidConfig(format!("HTTP client: {}", e)))?;

		let mut known = HashMap::new();
		if let Some(id) = chain_id {
			known.insert(id, rpc_url.clone());
		}

		let (events, _) = broadcast::channel(64);

		Ok(Self {
			client,
			active: RwLock::new(Endpoint {
				chain_id,
				url: rpc_url,
			}),
			known: RwLock::new(known),
			signer,
			events,
			next_id: AtomicU64::new(1),
		})
	}

	fn endpoint(&self) -> Endpoint {
		self.active
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.clone()
	}

	fn set_endpoint(&self, endpoint: Endpoint) {
		*self
			.active
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner()) = endpoint;
	}

	fn known_url(&self, chain_id: u64) -> Option<String> {
		self.known
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.get(&chain_id)
			.cloned()
	}

	fn remember(&self, chain_id: u64, url: String) {
		self.known
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.insert(chain_id, url);
	}

	async fn forward(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
		let url = self.endpoint().url;
		let body = json!({
			"jsonrpc": "2.0",
			"id": self.next_id.fetch_add(1, Ordering::Relaxed),
			"method": method,
			"params": params,
		});

		let response = self
			.client
			.post(&url)
			.json(&body)
			.send()
			.await
			.map_err(|e| ProviderError::transport(format!("RPC request failed: {}", e)))?;
		let envelope: RpcResponse = response
			.json()
			.await
			.map_err(|e| ProviderError::transport(format!("Invalid RPC response: {}", e)))?;

		if let Some(error) = envelope.error {
			tracing::debug!(method, code = error.code, error = %error.message, "RPC error");
			return Err(error);
		}
		Ok(envelope.result.unwrap_or(Value::Null))
	}

	async fn chain_id(&self) -> Result<u64, ProviderError> {
		let endpoint = self.endpoint();
		if let Some(id) = endpoint.chain_id {
			return Ok(id);
		}

		let raw = self.forward("eth_chainId", json!([])).await?;
		let id = raw
			.as_str()
			.and_then(parse_chain_id)
			.ok_or_else(|| ProviderError::transport(format!("Invalid chain id {}", raw)))?;

		self.remember(id, endpoint.url.clone());
		if self.endpoint().url == endpoint.url {
			self.set_endpoint(Endpoint {
				chain_id: Some(id),
				url: endpoint.url,
			});
		}
		Ok(id)
	}

	async fn accounts(&self) -> Result<Value, ProviderError> {
		match &self.signer {
			Some(signer) => Ok(json!([signer.address()])),
			None => self.forward("eth_accounts", json!([])).await,
		}
	}

	fn activate(&self, chain_id: u64, url: String) {
		self.set_endpoint(Endpoint {
			chain_id: Some(chain_id),
			url,
		});
		tracing::info!(chain_id, "Switched RPC endpoint");
		let _ = self
			.events
			.send(ProviderEvent::ChainChanged(format!("0x{:x}", chain_id)));
	}

	async fn switch_chain(&self, params: &Value) -> Result<Value, ProviderError> {
		let target = requested_chain(params)?;
		if self.chain_id().await.ok() == Some(target) {
			return Ok(Value::Null);
		}

		match self.known_url(target) {
			Some(url) => {
				self.activate(target, url);
				Ok(Value::Null)
			},
			None => Err(ProviderError::new(
				codes::UNRECOGNIZED_CHAIN,
				format!(
					"Unrecognized chain ID \"0x{:x}\". \
					 Try adding the chain using wallet_addEthereumChain first.",
					target
				),
			)),
		}
	}

	async fn add_chain(&self, params: &Value) -> Result<Value, ProviderError> {
		let target = requested_chain(params)?;
		let url = params[0]["rpcUrls"][0]
			.as_str()
			.filter(|url| url.starts_with("http://") || url.starts_with("https://"))
			.ok_or_else(|| {
				ProviderError::new(codes::INVALID_PARAMS, "Expected an http(s) RPC URL")
			})?
			.to_string();

		self.remember(target, url.clone());
		if self.chain_id().await.ok() != Some(target) {
			self.activate(target, url);
		}
		Ok(Value::Null)
	}

	/// Provider that fills and signs with the local key on the active chain.
	async fn signing_provider(
		&self,
		signer: &PrivateKeySigner,
	) -> Result<Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>, ProviderError> {
		let chain_id = self.chain_id().await?;
		let url: reqwest::Url = self
			.endpoint()
			.url
			.parse()
			.map_err(|e| ProviderError::transport(format!("Invalid RPC URL: {}", e)))?;

		let wallet = EthereumWallet::from(signer.clone().with_chain_id(Some(chain_id)));
		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);

		Ok(Arc::new(provider) as Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>)
	}

	async fn send_transaction(
		&self,
		signer: &PrivateKeySigner,
		params: Value,
	) -> Result<Value, ProviderError> {
		let request: TransactionRequest =
			serde_json::from_value(params.get(0).cloned().unwrap_or(Value::Null)).map_err(|e| {
				ProviderError::new(codes::INVALID_PARAMS, format!("Invalid transaction: {}", e))
			})?;

		let provider = self.signing_provider(signer).await?;
		let pending = provider.send_transaction(request).await.map_err(|e| {
			match e.as_error_resp() {
				Some(payload) => ProviderError {
					code: payload.code,
					message: payload.message.to_string(),
					data: payload
						.data
						.as_ref()
						.and_then(|raw| serde_json::from_str(raw.get()).ok()),
				},
				None => ProviderError::transport(e.to_string()),
			}
		})?;

		let hash = *pending.tx_hash();
		tracing::info!(tx_hash = %hash, "Signed and submitted transaction");
		Ok(json!(hash))
	}
}

/// Reads `params[0].chainId` of a wallet chain request.
fn requested_chain(params: &Value) -> Result<u64, ProviderError> {
	params[0]["chainId"]
		.as_str()
		.and_then(parse_chain_id)
		.ok_or_else(|| ProviderError::new(codes::INVALID_PARAMS, "Expected params[0].chainId"))
}

pub struct JsonRpcWalletSchema;

impl JsonRpcWalletSchema {
	pub fn validate_config(config: &toml::Value) -> Result<(), SchemaError> {
		Self.validate(config)
	}
}

impl ConfigSchema for JsonRpcWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let schema = Schema::new(
			vec![Field::new("rpc_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					_ => Err("rpc_url must be an http(s) URL".to_string()),
				}
			})],
			vec![
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let hex = key.strip_prefix("0x").unwrap_or(key);
					if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
						Ok(())
					} else {
						Err("private_key must be 32 bytes of hex".to_string())
					}
				}),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(JsonRpcWalletSchema)
	}

	async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
		match method {
			"eth_accounts" | "eth_requestAccounts" => self.accounts().await,
			"eth_chainId" => Ok(json!(format!("0x{:x}", self.chain_id().await?))),
			"wallet_switchEthereumChain" => self.switch_chain(&params).await,
			"wallet_addEthereumChain" => self.add_chain(&params).await,
			"eth_sendTransaction" => match &self.signer {
				Some(signer) => self.send_transaction(signer, params).await,
				None => self.forward(method, params).await,
			},
			_ => self.forward(method, params).await,
		}
	}

	fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
		self.events.subscribe()
	}
}

/// Builds a [`JsonRpcWallet`] from its configuration table.
pub fn create_wallet(config: &toml::Value) -> Result<Box<dyn WalletProvider>, WalletError> {
	JsonRpcWalletSchema::validate_config(config)
		.map_err(|e| WalletError::InvalidConfig(e.to_string()))?;

	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| WalletError::InvalidConfig("rpc_url is required".to_string()))?
		.to_string();
	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64);
	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from);
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	let wallet = JsonRpcWallet::new(
		rpc_url,
		chain_id,
		private_key,
		Duration::from_secs(timeout),
	)?;
	Ok(Box::new(wallet))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "json_rpc";
	type Factory = WalletFactory;

	fn factory() -> Self::Factory {
		create_wallet
	}
}

impl WalletRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use campaign_types::Address;

	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn config(extra: &str) -> toml::Value {
		toml::from_str(&format!(
			"rpc_url = \"http://127.0.0.1:8545\"\nchain_id = 545\n{}",
			extra
		))
		.unwrap()
	}

	#[test]
	fn test_schema_rejects_bad_tables() {
		let missing: toml::Value = toml::from_str("chain_id = 545").unwrap();
		assert!(JsonRpcWalletSchema::validate_config(&missing).is_err());

		let bad_key = config("private_key = \"0x1234\"");
		assert!(JsonRpcWalletSchema::validate_config(&bad_key).is_err());

		assert!(JsonRpcWalletSchema::validate_config(&config("")).is_ok());
	}

	#[test]
	fn test_invalid_key_does_not_leak() {
		let key = "zz".repeat(32);
		let result = JsonRpcWallet::new(
			"http://127.0.0.1:8545".to_string(),
			None,
			Some(SecretString::from(key.as_str())),
			Duration::from_secs(1),
		);
		let err = result.err().unwrap();
		assert!(!err.to_string().contains(&key));
	}

	#[tokio::test]
	async fn test_local_signer_serves_accounts() {
		let wallet = create_wallet(&config(&format!("private_key = \"{}\"", DEV_KEY))).unwrap();

		let accounts = wallet.request("eth_requestAccounts", json!([])).await.unwrap();
		let accounts: Vec<Address> = serde_json::from_value(accounts).unwrap();
		assert_eq!(
			accounts,
			vec!["0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
				.parse::<Address>()
				.unwrap()]
		);
	}

	#[tokio::test]
	async fn test_switch_to_unknown_chain_is_unrecognized() {
		let wallet = create_wallet(&config("")).unwrap();

		assert_eq!(
			wallet.request("eth_chainId", json!([])).await.unwrap(),
			json!("0x221")
		);
		let err = wallet
			.request("wallet_switchEthereumChain", json!([{ "chainId": "0x1" }]))
			.await
			.unwrap_err();
		assert_eq!(err.code, codes::UNRECOGNIZED_CHAIN);
	}

	#[tokio::test]
	async fn test_add_then_switch_emits_chain_changes() {
		let wallet = create_wallet(&config("")).unwrap();
		let mut events = wallet.subscribe();

		wallet
			.request(
				"wallet_addEthereumChain",
				json!([{ "chainId": "0x1", "rpcUrls": ["http://127.0.0.1:9545"] }]),
			)
			.await
			.unwrap();
		assert_eq!(
			events.recv().await.unwrap(),
			ProviderEvent::ChainChanged("0x1".to_string())
		);

		wallet
			.request("wallet_switchEthereumChain", json!([{ "chainId": "0x221" }]))
			.await
			.unwrap();
		assert_eq!(
			events.recv().await.unwrap(),
			ProviderEvent::ChainChanged("0x221".to_string())
		);
		assert_eq!(
			wallet.request("eth_chainId", json!([])).await.unwrap(),
			json!("0x221")
		);
	}

	#[tokio::test]
	async fn test_switch_to_active_chain_is_silent() {
		let wallet = create_wallet(&config("")).unwrap();
		let mut events = wallet.subscribe();

		wallet
			.request("wallet_switchEthereumChain", json!([{ "chainId": "545" }]))
			.await
			.unwrap();
		assert!(events.try_recv().is_err());
	}
}
