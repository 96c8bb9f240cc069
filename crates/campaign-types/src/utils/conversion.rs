//! Conversions between on-chain integer encodings and domain values.
//!
//! Amounts travel on-chain as integer minor units (wei for an 18-decimal
//! currency) and are presented as decimals. Timestamps travel as `uint256`
//! seconds.

use crate::errors::InvalidInput;
use alloy_primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Largest scale a `Decimal` can carry.
const MAX_SCALE: u8 = 28;

/// Errors converting on-chain integers into domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
	#[error("Value {0} does not fit the target type")]
	Overflow(String),
	#[error("Scale {0} exceeds decimal precision")]
	Scale(u8),
}

/// Converts an integer amount in minor units into a decimal amount.
pub fn minor_to_decimal(value: U256, decimals: u8) -> Result<Decimal, ConversionError> {
	if decimals > MAX_SCALE {
		return Err(ConversionError::Scale(decimals));
	}

	let raw = u128::try_from(value)
		.ok()
		.and_then(|v| i128::try_from(v).ok())
		.ok_or_else(|| ConversionError::Overflow(value.to_string()))?;

	Decimal::try_from_i128_with_scale(raw, decimals as u32)
		.map(|d| d.normalize())
		.map_err(|_| ConversionError::Overflow(value.to_string()))
}

/// Converts minor units into a decimal, dropping low-order digits that do not
/// fit a `Decimal`. Amounts beyond its range saturate at `Decimal::MAX`.
pub fn minor_to_decimal_lossy(value: U256, decimals: u8) -> Decimal {
	let ten = U256::from(10u8);
	let mut value = value;
	let mut scale = decimals;
	while scale > MAX_SCALE {
		value /= ten;
		scale -= 1;
	}

	loop {
		if let Ok(amount) = minor_to_decimal(value, scale) {
			return amount;
		}
		if scale == 0 {
			return Decimal::MAX;
		}
		value /= ten;
		scale -= 1;
	}
}

/// Parses a user-entered decimal amount into minor units.
///
/// Zero, negative and unparseable amounts are rejected locally.
pub fn decimal_to_minor(raw: &str, decimals: u8) -> Result<U256, InvalidInput> {
	let malformed = |reason: &str| InvalidInput::MalformedAmount {
		value: raw.to_string(),
		reason: reason.to_string(),
	};

	let amount = Decimal::from_str(raw.trim()).map_err(|e| malformed(&e.to_string()))?;
	if amount <= Decimal::ZERO {
		return Err(InvalidInput::NonPositiveAmount);
	}
	if decimals > MAX_SCALE {
		return Err(malformed("currency precision is not supported"));
	}

	let factor = Decimal::from_i128_with_scale(10i128.pow(decimals as u32), 0);
	let scaled = amount
		.checked_mul(factor)
		.ok_or_else(|| malformed("amount is too large"))?;
	if !scaled.fract().is_zero() {
		return Err(malformed(&format!(
			"more than {} decimal places",
			decimals
		)));
	}

	scaled
		.trunc()
		.to_u128()
		.map(U256::from)
		.ok_or_else(|| malformed("amount is too large"))
}

/// Narrows a `uint256` timestamp or index to `u64`.
pub fn u256_to_u64(value: U256) -> Result<u64, ConversionError> {
	u64::try_from(value).map_err(|_| ConversionError::Overflow(value.to_string()))
}
