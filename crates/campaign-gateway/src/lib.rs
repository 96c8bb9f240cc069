//! Contract gateway for the campaign registry.
//!
//! The gateway holds at most one [`BoundContract`]: the registry address, the
//! signing account and the chain, stamped with the session token current at
//! bind time. It is replaced wholesale on every identity change and never
//! mutated. Any call made through a binding whose token is no longer current
//! fails closed.

use alloy_primitives::{Address, Bytes, B256, U256};
use arc_swap::ArcSwapOption;
use campaign_types::{
	truncate_id, Campaign, CampaignDraft, InvalidInput, SessionClock, SessionToken,
	TransactionKind, TransactionRecord,
};
use campaign_wallet::{ProviderError, WalletProvider};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

pub mod contract;

/// Errors that can occur while talking to the registry.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
	#[error("Contract not initialized")]
	NotInitialized,
	#[error("Contract binding belongs to a previous session")]
	StaleBinding,
	#[error(transparent)]
	InvalidInput(#[from] InvalidInput),
	/// The node refused to estimate gas for the call.
	#[error("Gas estimation failed: {0}")]
	GasEstimation(ProviderError),
	#[error(transparent)]
	Provider(#[from] ProviderError),
	#[error("Failed to decode {what}: {message}")]
	Decode { what: &'static str, message: String },
}

/// A registry handle for one identity epoch.
pub struct BoundContract {
	pub contract: Address,
	pub signer: Address,
	pub chain_id: u64,
	pub token: SessionToken,
	provider: Arc<dyn WalletProvider>,
}

impl std::fmt::Debug for BoundContract {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BoundContract")
			.field("contract", &self.contract)
			.field("signer", &self.signer)
			.field("chain_id", &self.chain_id)
			.field("token", &self.token)
			.finish()
	}
}

/// Transaction fields handed to `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
	pub from: Address,
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
}

/// A prepared registry write, tracked from `Submitting` on.
#[derive(Debug, Clone)]
pub struct WriteCall {
	pub record: TransactionRecord,
	pub request: CallRequest,
}

/// Inclusion result of a submitted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptStatus {
	pub block_number: u64,
	pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
	block_number: Option<U256>,
	status: Option<U256>,
}

pub struct ContractGateway {
	decimals: u8,
	clock: Arc<SessionClock>,
	bound: ArcSwapOption<BoundContract>,
}

impl ContractGateway {
	/// `decimals` is the native currency precision used for amounts.
	pub fn new(decimals: u8, clock: Arc<SessionClock>) -> Self {
		Self {
			decimals,
			clock,
			bound: ArcSwapOption::empty(),
		}
	}

	pub fn decimals(&self) -> u8 {
		self.decimals
	}

	/// Replaces the current binding with one stamped with the current token.
	pub fn bind(
		&self,
		contract: Address,
		signer: Address,
		chain_id: u64,
		provider: Arc<dyn WalletProvider>,
	) -> Arc<BoundContract> {
		let bound = Arc::new(BoundContract {
			contract,
			signer,
			chain_id,
			token: self.clock.current(),
			provider,
		});
		self.bound.store(Some(bound.clone()));
		tracing::info!(
			contract = %truncate_id(&contract.to_string()),
			signer = %truncate_id(&signer.to_string()),
			chain_id,
			token = %bound.token,
			"Contract bound"
		);
		bound
	}

	pub fn unbind(&self) {
		if self.bound.swap(None).is_some() {
			tracing::info!("Contract unbound");
		}
	}

	/// True if a binding exists and belongs to the current identity.
	pub fn is_bound(&self) -> bool {
		self.binding().is_ok()
	}

	/// The current binding, if it is still valid.
	pub fn binding(&self) -> Result<Arc<BoundContract>, GatewayError> {
		let bound = self.bound.load_full().ok_or(GatewayError::NotInitialized)?;
		if !self.clock.is_current(bound.token) {
			return Err(GatewayError::StaleBinding);
		}
		Ok(bound)
	}

	/// The current binding, provided it was made under `token`.
	pub fn binding_for(&self, token: SessionToken) -> Result<Arc<BoundContract>, GatewayError> {
		let bound = self.binding()?;
		if bound.token != token {
			return Err(GatewayError::StaleBinding);
		}
		Ok(bound)
	}

	fn ensure_current(&self, bound: &BoundContract) -> Result<(), GatewayError> {
		if self.clock.is_current(bound.token) {
			Ok(())
		} else {
			Err(GatewayError::StaleBinding)
		}
	}

	/// Reads every campaign from the registry.
	pub async fn list_campaigns(&self) -> Result<Vec<Campaign>, GatewayError> {
		let bound = self.binding()?;
		let params = json!([
			{
				"from": bound.signer,
				"to": bound.contract,
				"data": contract::encode_get_campaigns(),
			},
			"latest"
		]);

		let result = bound.provider.request("eth_call", params).await?;
		self.ensure_current(&bound)?;

		let data: Bytes = parse(result, "eth_call result")?;
		let campaigns = contract::decode_campaigns(&data, self.decimals)?;
		tracing::debug!(count = campaigns.len(), "Fetched campaigns");
		Ok(campaigns)
	}

	/// Prepares `createCampaign` for the signer bound under `token`.
	pub fn create_campaign(
		&self,
		draft: &CampaignDraft,
		token: SessionToken,
	) -> Result<WriteCall, GatewayError> {
		let bound = self.binding_for(token)?;
		Ok(WriteCall {
			record: TransactionRecord::new(TransactionKind::CreateCampaign, bound.token),
			request: CallRequest {
				from: bound.signer,
				to: bound.contract,
				data: contract::encode_create_campaign(draft),
				value: U256::ZERO,
			},
		})
	}

	/// Prepares `donateToCampaign` carrying `amount_minor` as value, for the
	/// signer bound under `token`.
	pub fn donate(
		&self,
		campaign_id: u64,
		amount_minor: U256,
		token: SessionToken,
	) -> Result<WriteCall, GatewayError> {
		let bound = self.binding_for(token)?;
		if amount_minor.is_zero() {
			return Err(InvalidInput::NonPositiveAmount.into());
		}
		Ok(WriteCall {
			record: TransactionRecord::new(TransactionKind::Donate, bound.token),
			request: CallRequest {
				from: bound.signer,
				to: bound.contract,
				data: contract::encode_donate(campaign_id),
				value: amount_minor,
			},
		})
	}

	/// Hands a prepared write to the wallet and returns its hash.
	///
	/// Gas is estimated first so that calls the node expects to revert are
	/// reported as estimation failures before the wallet prompts.
	pub async fn send(&self, call: &WriteCall) -> Result<B256, GatewayError> {
		let bound = self.binding_for(call.record.token)?;

		let gas: U256 = bound
			.provider
			.request("eth_estimateGas", json!([call.request]))
			.await
			.map_err(GatewayError::GasEstimation)
			.and_then(|value| parse(value, "eth_estimateGas result"))?;
		self.ensure_current(&bound)?;

		let mut tx = serde_json::to_value(&call.request).map_err(|e| GatewayError::Decode {
			what: "transaction request",
			message: e.to_string(),
		})?;
		tx["gas"] = json!(gas);

		let result = bound
			.provider
			.request("eth_sendTransaction", json!([tx]))
			.await?;
		let hash: B256 = parse(result, "transaction hash")?;

		tracing::info!(
			tx_id = %truncate_id(&call.record.id),
			tx_hash = %truncate_id(&hash.to_string()),
			"Write submitted"
		);
		Ok(hash)
	}

	/// Native balance of `address` in minor units.
	pub async fn native_balance(&self, address: Address) -> Result<U256, GatewayError> {
		let bound = self.binding()?;
		let result = bound
			.provider
			.request("eth_getBalance", json!([address, "latest"]))
			.await?;
		parse(result, "balance")
	}

	/// Receipt of `hash`, or `None` while it is not yet included.
	pub async fn receipt(&self, hash: B256) -> Result<Option<ReceiptStatus>, GatewayError> {
		let bound = self.binding()?;
		let result = bound
			.provider
			.request("eth_getTransactionReceipt", json!([hash]))
			.await?;
		if result.is_null() {
			return Ok(None);
		}

		let raw: RawReceipt = parse(result, "receipt")?;
		let Some(block) = raw.block_number else {
			return Ok(None);
		};
		Ok(Some(ReceiptStatus {
			block_number: u64::try_from(block).unwrap_or(u64::MAX),
			success: raw.status.is_some_and(|status| status == U256::from(1)),
		}))
	}

	/// Latest block number.
	pub async fn block_number(&self) -> Result<u64, GatewayError> {
		let bound = self.binding()?;
		let result = bound
			.provider
			.request("eth_blockNumber", json!([]))
			.await?;
		let block: U256 = parse(result, "block number")?;
		Ok(u64::try_from(block).unwrap_or(u64::MAX))
	}
}

fn parse<T>(value: Value, what: &'static str) -> Result<T, GatewayError>
where
	T: serde::de::DeserializeOwned,
{
	serde_json::from_value(value).map_err(|e| GatewayError::Decode {
		what,
		message: e.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contract::tests::{encode_campaigns, entry, ONE};
	use campaign_wallet::codes;
	use campaign_wallet::implementations::mock::MockProvider;

	const SIGNER: Address = Address::repeat_byte(0xa1);
	const REGISTRY: Address = Address::repeat_byte(0xcc);

	fn bound_gateway() -> (ContractGateway, Arc<MockProvider>, Arc<SessionClock>) {
		let clock = Arc::new(SessionClock::new());
		let mock = Arc::new(MockProvider::on_chain(545, SIGNER));
		let gateway = ContractGateway::new(18, clock.clone());
		gateway.bind(REGISTRY, SIGNER, 545, mock.clone() as Arc<dyn WalletProvider>);
		(gateway, mock, clock)
	}

	#[tokio::test]
	async fn test_unbound_gateway_fails_fast() {
		let gateway = ContractGateway::new(18, Arc::new(SessionClock::new()));

		assert!(matches!(
			gateway.list_campaigns().await,
			Err(GatewayError::NotInitialized)
		));
		assert!(matches!(
			gateway.donate(0, U256::from(1), SessionToken(0)),
			Err(GatewayError::NotInitialized)
		));
		assert!(!gateway.is_bound());
	}

	#[tokio::test]
	async fn test_list_campaigns_decodes_registry() {
		let (gateway, mock, _) = bound_gateway();
		mock.on(
			"eth_call",
			Ok(json!(encode_campaigns(vec![entry("reef", ONE, ONE / 2, 500)]))),
		);

		let campaigns = gateway.list_campaigns().await.unwrap();
		assert_eq!(campaigns.len(), 1);
		assert_eq!(campaigns[0].id, 0);
		assert_eq!(campaigns[0].amount_collected.to_string(), "0.5");

		let (_, params) = &mock.calls()[0];
		assert_eq!(params[1], "latest");
		assert_eq!(
			params[0]["to"].as_str().unwrap().to_lowercase(),
			REGISTRY.to_string().to_lowercase()
		);
	}

	#[tokio::test]
	async fn test_binding_goes_stale_after_identity_change() {
		let (gateway, mock, clock) = bound_gateway();
		clock.advance();

		assert!(matches!(
			gateway.list_campaigns().await,
			Err(GatewayError::StaleBinding)
		));
		assert!(mock.calls().is_empty());
	}

	#[tokio::test]
	async fn test_result_discarded_when_identity_changes_mid_call() {
		let (gateway, mock, clock) = bound_gateway();
		mock.on("eth_call", Ok(json!(encode_campaigns(vec![]))));
		let gate = mock.hold("eth_call");

		let gateway = Arc::new(gateway);
		let reader = {
			let gateway = gateway.clone();
			tokio::spawn(async move { gateway.list_campaigns().await })
		};
		while mock.count("eth_call") == 0 {
			tokio::task::yield_now().await;
		}
		clock.advance();
		gate.notify_one();

		assert!(matches!(
			reader.await.unwrap(),
			Err(GatewayError::StaleBinding)
		));
	}

	#[test]
	fn test_zero_donation_is_local() {
		let (gateway, mock, clock) = bound_gateway();
		assert!(matches!(
			gateway.donate(3, U256::ZERO, clock.current()),
			Err(GatewayError::InvalidInput(InvalidInput::NonPositiveAmount))
		));
		assert!(mock.calls().is_empty());
	}

	#[tokio::test]
	async fn test_send_estimates_then_submits() {
		let (gateway, mock, clock) = bound_gateway();
		let hash = B256::repeat_byte(0x42);
		mock.on("eth_estimateGas", Ok(json!("0x5208")));
		mock.on("eth_sendTransaction", Ok(json!(hash)));

		let call = gateway.donate(2, U256::from(ONE), clock.current()).unwrap();
		assert_eq!(call.record.kind, TransactionKind::Donate);
		assert_eq!(gateway.send(&call).await.unwrap(), hash);

		let calls = mock.calls();
		assert_eq!(calls[0].0, "eth_estimateGas");
		assert_eq!(calls[1].0, "eth_sendTransaction");
		assert_eq!(calls[1].1[0]["gas"], "0x5208");
		assert_eq!(calls[1].1[0]["value"], "0xde0b6b3a7640000");
	}

	#[tokio::test]
	async fn test_estimation_failure_is_tagged() {
		let (gateway, mock, clock) = bound_gateway();
		mock.on(
			"eth_estimateGas",
			Err(ProviderError::new(codes::EXECUTION_REVERTED, "execution reverted")),
		);

		let call = gateway.donate(2, U256::from(ONE), clock.current()).unwrap();
		assert!(matches!(
			gateway.send(&call).await,
			Err(GatewayError::GasEstimation(_))
		));
		assert_eq!(mock.count("eth_sendTransaction"), 0);
	}

	#[tokio::test]
	async fn test_send_refuses_call_prepared_under_old_binding() {
		let (gateway, mock, clock) = bound_gateway();
		let call = gateway.donate(2, U256::from(ONE), clock.current()).unwrap();

		clock.advance();
		gateway.bind(REGISTRY, SIGNER, 545, mock.clone() as Arc<dyn WalletProvider>);

		assert!(matches!(
			gateway.send(&call).await,
			Err(GatewayError::StaleBinding)
		));
	}

	#[tokio::test]
	async fn test_identity_change_during_estimate_never_sends() {
		let (gateway, mock, clock) = bound_gateway();
		mock.on("eth_estimateGas", Ok(json!("0x5208")));
		mock.on("eth_sendTransaction", Ok(json!(B256::repeat_byte(0x42))));
		let gate = mock.hold("eth_estimateGas");

		let call = gateway.donate(2, U256::from(ONE), clock.current()).unwrap();
		let gateway = Arc::new(gateway);
		let sender = {
			let gateway = gateway.clone();
			tokio::spawn(async move { gateway.send(&call).await })
		};
		while mock.count("eth_estimateGas") == 0 {
			tokio::task::yield_now().await;
		}
		clock.advance();
		gate.notify_one();

		assert!(matches!(
			sender.await.unwrap(),
			Err(GatewayError::StaleBinding)
		));
		assert_eq!(mock.count("eth_sendTransaction"), 0);
	}

	#[test]
	fn test_prepare_requires_the_callers_token() {
		let (gateway, mock, clock) = bound_gateway();
		let entry_token = clock.current();

		clock.advance();
		let other = Address::repeat_byte(0xb0);
		gateway.bind(REGISTRY, other, 545, mock.clone() as Arc<dyn WalletProvider>);

		let draft = CampaignDraft {
			title: "Reef".to_string(),
			description: "Restore the reef".to_string(),
			target_minor: U256::from(ONE),
			deadline: 1_800_000_000,
			image_ref: "https://gateway/ipfs/reef".to_string(),
		};
		assert!(matches!(
			gateway.create_campaign(&draft, entry_token),
			Err(GatewayError::StaleBinding)
		));
		assert!(matches!(
			gateway.donate(2, U256::from(ONE), entry_token),
			Err(GatewayError::StaleBinding)
		));
		let call = gateway.donate(2, U256::from(ONE), clock.current()).unwrap();
		assert_eq!(call.request.from, other);
	}

	#[tokio::test]
	async fn test_receipt_and_balance() {
		let (gateway, mock, _) = bound_gateway();
		mock.push("eth_getTransactionReceipt", Ok(Value::Null));
		mock.on(
			"eth_getTransactionReceipt",
			Ok(json!({ "blockNumber": "0x10", "status": "0x1" })),
		);
		mock.on("eth_getBalance", Ok(json!("0x64")));

		let hash = B256::repeat_byte(1);
		assert_eq!(gateway.receipt(hash).await.unwrap(), None);
		assert_eq!(
			gateway.receipt(hash).await.unwrap(),
			Some(ReceiptStatus {
				block_number: 16,
				success: true
			})
		);
		assert_eq!(
			gateway.native_balance(SIGNER).await.unwrap(),
			U256::from(100)
		);
	}
}
