//! String formatting utilities for logs and terminal output.

use alloy_primitives::Address;

/// Shortens an identifier or hash for log fields.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

/// Adds a "0x" prefix to a hex string if it does not already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Renders an address as `0x1234...abcd`.
pub fn short_address(address: &Address) -> String {
	let full = address.to_string();
	format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("abc"), "abc");
		assert_eq!(truncate_id("0123456789abcdef"), "01234567..");
	}

	#[test]
	fn test_with_0x_prefix() {
		assert_eq!(with_0x_prefix("221"), "0x221");
		assert_eq!(with_0x_prefix("0x221"), "0x221");
		assert_eq!(with_0x_prefix("0X221"), "0X221");
	}

	#[test]
	fn test_short_address() {
		let address: Address = "0xec8a14c5ddc18c63c4da7d46893fa7d39aefd459".parse().unwrap();
		let short = short_address(&address);
		assert!(short.starts_with("0x"));
		assert_eq!(short.len(), 13);
		assert!(short.to_lowercase().ends_with("d459"));
	}
}
