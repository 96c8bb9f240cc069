//! Interface of the deployed campaign registry.

use crate::GatewayError;
use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use campaign_types::utils::u256_to_u64;
use campaign_types::{minor_to_decimal_lossy, Campaign, CampaignDraft};

sol! {
	#[derive(Debug, PartialEq, Eq)]
	struct CampaignEntry {
		address owner;
		string title;
		string description;
		uint256 target;
		uint256 deadline;
		uint256 amountCollected;
		string image;
	}

	function getCampaigns() external view returns (CampaignEntry[] memory);

	function createCampaign(
		string title,
		string description,
		uint256 target,
		uint256 deadline,
		string image
	) external returns (uint256);

	function donateToCampaign(uint256 id) external payable;
}

pub fn encode_get_campaigns() -> Bytes {
	getCampaignsCall {}.abi_encode().into()
}

pub fn encode_create_campaign(draft: &CampaignDraft) -> Bytes {
	createCampaignCall {
		title: draft.title.clone(),
		description: draft.description.clone(),
		target: draft.target_minor,
		deadline: U256::from(draft.deadline),
		image: draft.image_ref.clone(),
	}
	.abi_encode()
	.into()
}

pub fn encode_donate(campaign_id: u64) -> Bytes {
	donateToCampaignCall {
		id: U256::from(campaign_id),
	}
	.abi_encode()
	.into()
}

/// Decodes `getCampaigns()` output. Ids are array positions.
///
/// Individual records never fail the batch: amounts beyond decimal range are
/// shown lossily and deadlines beyond `u64` saturate.
pub fn decode_campaigns(data: &[u8], decimals: u8) -> Result<Vec<Campaign>, GatewayError> {
	let entries = getCampaignsCall::abi_decode_returns(data, true)
		.map_err(|e| GatewayError::Decode {
			what: "getCampaigns",
			message: e.to_string(),
		})?
		._0;

	Ok(entries
		.into_iter()
		.enumerate()
		.map(|(index, entry)| to_campaign(index as u64, entry, decimals))
		.collect())
}

fn to_campaign(id: u64, entry: CampaignEntry, decimals: u8) -> Campaign {
	let deadline = u256_to_u64(entry.deadline).unwrap_or_else(|e| {
		tracing::debug!(campaign_id = id, error = %e, "Deadline saturated");
		u64::MAX
	});

	Campaign {
		id,
		owner: entry.owner,
		target_amount: minor_to_decimal_lossy(entry.target, decimals),
		amount_collected: minor_to_decimal_lossy(entry.amountCollected, decimals),
		target_minor: entry.target,
		collected_minor: entry.amountCollected,
		deadline,
		title: entry.title,
		description: entry.description,
		image_ref: entry.image,
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use alloy_primitives::Address;
	use rust_decimal::Decimal;

	pub(crate) const ONE: u128 = 1_000_000_000_000_000_000;

	pub(crate) fn entry(
		title: &str,
		target: u128,
		collected: u128,
		deadline: u64,
	) -> CampaignEntry {
		CampaignEntry {
			owner: Address::repeat_byte(0x11),
			title: title.to_string(),
			description: format!("{} description", title),
			target: U256::from(target),
			deadline: U256::from(deadline),
			amountCollected: U256::from(collected),
			image: format!("https://gateway/ipfs/{}", title),
		}
	}

	pub(crate) fn encode_campaigns(entries: Vec<CampaignEntry>) -> Bytes {
		getCampaignsCall::abi_encode_returns(&(entries,)).into()
	}

	#[test]
	fn test_decode_assigns_positional_ids() {
		let data = encode_campaigns(vec![
			entry("first", ONE, 0, 100),
			entry("second", 2 * ONE, ONE, 200),
		]);

		let campaigns = decode_campaigns(&data, 18).unwrap();
		assert_eq!(campaigns.len(), 2);
		assert_eq!(campaigns[0].id, 0);
		assert_eq!(campaigns[1].id, 1);
		assert_eq!(campaigns[1].title, "second");
		assert_eq!(campaigns[1].target_amount.to_string(), "2");
		assert_eq!(campaigns[1].amount_collected.to_string(), "1");
		assert_eq!(campaigns[1].deadline, 200);
	}

	#[test]
	fn test_oversized_record_does_not_block_the_list() {
		let mut huge = entry("huge", 0, 0, 0);
		huge.target = U256::MAX;
		huge.amountCollected = U256::MAX;
		huge.deadline = U256::MAX;
		let data = encode_campaigns(vec![
			entry("first", ONE, 0, 100),
			huge,
			entry("third", ONE, ONE / 4, 300),
		]);

		let campaigns = decode_campaigns(&data, 18).unwrap();
		assert_eq!(campaigns.len(), 3);
		assert_eq!(campaigns[1].id, 1);
		assert_eq!(campaigns[1].target_minor, U256::MAX);
		assert_eq!(campaigns[1].deadline, u64::MAX);
		assert_eq!(campaigns[1].target_amount, Decimal::MAX);
		assert_eq!(campaigns[2].id, 2);
		assert_eq!(campaigns[2].amount_collected.to_string(), "0.25");
	}

	#[test]
	fn test_decode_rejects_garbage() {
		assert!(matches!(
			decode_campaigns(&[0xde, 0xad], 18),
			Err(GatewayError::Decode { .. })
		));
	}

	#[test]
	fn test_create_call_round_trips_arguments() {
		let draft = CampaignDraft {
			title: "Title".to_string(),
			description: "Body".to_string(),
			target_minor: U256::from(ONE),
			deadline: 1_800_000_000,
			image_ref: "https://gateway/ipfs/cid".to_string(),
		};

		let data = encode_create_campaign(&draft);
		assert_eq!(&data[..4], createCampaignCall::SELECTOR.as_slice());

		let decoded = createCampaignCall::abi_decode(&data, true).unwrap();
		assert_eq!(decoded.title, "Title");
		assert_eq!(decoded.deadline, U256::from(1_800_000_000u64));
	}
}
