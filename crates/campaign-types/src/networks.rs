//! Chain descriptors for the network the client expects to run on.
//!
//! The descriptor doubles as the payload of `wallet_addEthereumChain`
//! (EIP-3085), so wallets that do not know the chain can be taught it.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Native currency of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NativeCurrency {
	pub name: String,
	pub symbol: String,
	pub decimals: u8,
}

/// Full description of the expected chain.
///
/// # Fields
///
/// * `chain_id` - Numeric chain identifier
/// * `name` - Display name used in every corrective message
/// * `native_currency` - Currency used for targets and donations
/// * `rpc_urls` - Endpoints offered to wallets when adding the chain
/// * `explorer_urls` - Block explorers offered to wallets when adding the chain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainDescriptor {
	pub chain_id: u64,
	pub name: String,
	pub native_currency: NativeCurrency,
	pub rpc_urls: Vec<String>,
	#[serde(default)]
	pub explorer_urls: Vec<String>,
}

impl ChainDescriptor {
	/// Chain id in the `0x`-prefixed hex form wallets exchange.
	pub fn hex_chain_id(&self) -> String {
		format!("0x{:x}", self.chain_id)
	}

	/// True if `raw` names this chain, in either hex or decimal form.
	pub fn matches(&self, raw: &str) -> bool {
		parse_chain_id(raw) == Some(self.chain_id)
	}

	/// Parameters for `wallet_switchEthereumChain`.
	pub fn switch_params(&self) -> serde_json::Value {
		json!([{ "chainId": self.hex_chain_id() }])
	}

	/// Parameters for `wallet_addEthereumChain`.
	pub fn add_chain_params(&self) -> serde_json::Value {
		json!([{
			"chainId": self.hex_chain_id(),
			"chainName": self.name,
			"nativeCurrency": {
				"name": self.native_currency.name,
				"symbol": self.native_currency.symbol,
				"decimals": self.native_currency.decimals,
			},
			"rpcUrls": self.rpc_urls,
			"blockExplorerUrls": self.explorer_urls,
		}])
	}

	/// Corrective hint shown whenever the wallet is on another chain.
	pub fn mismatch_hint(&self) -> String {
		format!(
			"Please connect to {} (ChainID {}, {})",
			self.name, self.chain_id, self.native_currency.symbol
		)
	}
}

/// Parses a chain identifier given as `0x`-prefixed hex or as decimal.
pub fn parse_chain_id(raw: &str) -> Option<u64> {
	let raw = raw.trim();
	if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
		u64::from_str_radix(hex, 16).ok()
	} else {
		raw.parse::<u64>().ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn flow_testnet() -> ChainDescriptor {
		ChainDescriptor {
			chain_id: 545,
			name: "Flow EVM Testnet".to_string(),
			native_currency: NativeCurrency {
				name: "FLOW".to_string(),
				symbol: "FLOW".to_string(),
				decimals: 18,
			},
			rpc_urls: vec!["https://testnet.evm.nodes.onflow.org".to_string()],
			explorer_urls: vec!["https://evm-testnet.flowscan.io".to_string()],
		}
	}

	#[test]
	fn test_parse_chain_id_encodings() {
		assert_eq!(parse_chain_id("0x221"), Some(545));
		assert_eq!(parse_chain_id("0X221"), Some(545));
		assert_eq!(parse_chain_id("545"), Some(545));
		assert_eq!(parse_chain_id(" 0x1 "), Some(1));
		assert_eq!(parse_chain_id("0xzz"), None);
		assert_eq!(parse_chain_id(""), None);
	}

	#[test]
	fn test_descriptor_matches_both_forms() {
		let chain = flow_testnet();
		assert!(chain.matches("0x221"));
		assert!(chain.matches("545"));
		assert!(!chain.matches("0x1"));
		assert_eq!(chain.hex_chain_id(), "0x221");
	}

	#[test]
	fn test_add_chain_params_shape() {
		let params = flow_testnet().add_chain_params();
		let entry = &params[0];
		assert_eq!(entry["chainId"], "0x221");
		assert_eq!(entry["chainName"], "Flow EVM Testnet");
		assert_eq!(entry["nativeCurrency"]["decimals"], 18);
		assert_eq!(entry["blockExplorerUrls"][0], "https://evm-testnet.flowscan.io");
	}

	#[test]
	fn test_hint_uses_configured_name() {
		let hint = flow_testnet().mismatch_hint();
		assert_eq!(hint, "Please connect to Flow EVM Testnet (ChainID 545, FLOW)");
	}
}
