//! Utility functions for amount conversion and display formatting.

pub mod conversion;
pub mod formatting;
pub mod helpers;

pub use conversion::{
	decimal_to_minor, minor_to_decimal, minor_to_decimal_lossy, u256_to_u64, ConversionError,
};
pub use formatting::{short_address, truncate_id, with_0x_prefix};
pub use helpers::current_timestamp;
