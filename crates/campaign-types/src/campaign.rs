//! Campaign records as served to consumers.
//!
//! A campaign is read from the on-chain registry, converted from minor units
//! into decimal amounts and classified as open or closed at read time.

use crate::errors::InvalidInput;
use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Derived funding state of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignStatus {
	/// Still below target and before its deadline.
	Open,
	/// Target reached or deadline passed.
	Closed,
}

/// A campaign as stored by the registry contract.
///
/// Everything except `amount_collected` is immutable after creation. The
/// collected amount may exceed the target; that is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
	/// Position in the registry's campaign array.
	pub id: u64,
	pub owner: Address,
	pub title: String,
	pub description: String,
	/// Target in native-currency units.
	pub target_amount: Decimal,
	/// Collected amount in native-currency units.
	pub amount_collected: Decimal,
	/// Raw on-chain target in minor units.
	pub target_minor: U256,
	/// Raw on-chain collected amount in minor units.
	pub collected_minor: U256,
	/// Deadline as unix seconds.
	pub deadline: u64,
	/// URI of the campaign image.
	pub image_ref: String,
}

impl Campaign {
	/// Classifies the campaign against the caller's clock.
	pub fn status_at(&self, now: u64) -> CampaignStatus {
		if self.collected_minor < self.target_minor && now < self.deadline {
			CampaignStatus::Open
		} else {
			CampaignStatus::Closed
		}
	}

	pub fn is_open_at(&self, now: u64) -> bool {
		self.status_at(now) == CampaignStatus::Open
	}

	/// Funding progress in percent. Over-funded campaigns report more than 100.
	pub fn progress_percent(&self) -> Decimal {
		self.amount_collected
			.checked_div(self.target_amount)
			.and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
			.unwrap_or(Decimal::ZERO)
	}
}

/// User input for a new campaign, before any call leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignDraft {
	pub title: String,
	pub description: String,
	/// Target in minor units.
	pub target_minor: U256,
	/// Deadline as unix seconds.
	pub deadline: u64,
	pub image_ref: String,
}

impl CampaignDraft {
	/// Rejects drafts the registry would refuse, without touching the network.
	pub fn validate(&self, now: u64) -> Result<(), InvalidInput> {
		if self.target_minor.is_zero() {
			return Err(InvalidInput::NonPositiveAmount);
		}
		if self.image_ref.trim().is_empty() {
			return Err(InvalidInput::MissingImage);
		}
		if self.title.trim().is_empty() {
			return Err(InvalidInput::EmptyTitle);
		}
		if self.description.trim().is_empty() {
			return Err(InvalidInput::EmptyDescription);
		}
		if self.deadline <= now {
			return Err(InvalidInput::DeadlineInPast {
				deadline: self.deadline,
			});
		}
		Ok(())
	}
}
