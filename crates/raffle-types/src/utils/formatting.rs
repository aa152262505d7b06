//! String formatting utilities.
//!
//! Hex prefix handling, hash truncation for log lines and conversion between
//! wei amounts and human readable ether strings.

use alloy_primitives::U256;

/// Decimal places of the native currency.
const ETHER_DECIMALS: usize = 18;

/// Utility function to truncate a hex string for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Formats a wei amount as ether, trimming trailing zeros.
///
/// `10000000000000000` becomes `"0.01"`, `2000000000000000000` becomes `"2"`.
pub fn format_ether(wei: U256) -> String {
	let amount = wei.to_string();

	let (integer_part, decimal_part) = if amount.len() <= ETHER_DECIMALS {
		(
			"0".to_string(),
			format!("{:0>width$}", amount, width = ETHER_DECIMALS),
		)
	} else {
		let split_pos = amount.len() - ETHER_DECIMALS;
		(
			amount[..split_pos].to_string(),
			amount[split_pos..].to_string(),
		)
	};

	let decimal_trimmed = decimal_part.trim_end_matches('0');
	if decimal_trimmed.is_empty() {
		integer_part
	} else {
		format!("{}.{}", integer_part, decimal_trimmed)
	}
}

/// Parses an ether amount such as `"0.01"` into wei.
///
/// Negative amounts and more than 18 fractional digits are refused instead
/// of being folded or truncated.
pub fn parse_ether(ether: &str) -> Result<U256, String> {
	let ether = ether.trim();
	if ether.is_empty() || ether == "." || ether.starts_with('-') {
		return Err(format!("'{}' is not an ether amount", ether));
	}
	if ether
		.split_once('.')
		.is_some_and(|(_, fraction)| fraction.len() > ETHER_DECIMALS)
	{
		return Err(format!(
			"'{}' has more than {} decimal places",
			ether, ETHER_DECIMALS
		));
	}

	alloy_primitives::utils::parse_ether(ether).map_err(|e| format!("'{}': {}", ether, e))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("0x1234567890abcdef"), "0x123456..");
	}

	#[test]
	fn test_prefix_helpers() {
		assert_eq!(with_0x_prefix("abcd"), "0xabcd");
		assert_eq!(with_0x_prefix("0xabcd"), "0xabcd");
		assert_eq!(without_0x_prefix("0Xabcd"), "abcd");
		assert_eq!(without_0x_prefix("abcd"), "abcd");
	}

	#[test]
	fn test_format_ether() {
		assert_eq!(format_ether(U256::from(10_000_000_000_000_000u64)), "0.01");
		assert_eq!(format_ether(U256::from(2_000_000_000_000_000_000u64)), "2");
		assert_eq!(format_ether(U256::from(1_500_000_000_000_000_000u64)), "1.5");
		assert_eq!(format_ether(U256::from(1u64)), "0.000000000000000001");
		assert_eq!(format_ether(U256::ZERO), "0");
	}

	#[test]
	fn test_parse_ether() {
		assert_eq!(
			parse_ether("0.01").unwrap(),
			U256::from(10_000_000_000_000_000u64)
		);
		assert_eq!(
			parse_ether("30").unwrap(),
			U256::from(30_000_000_000_000_000_000u128)
		);
		assert_eq!(parse_ether(".5").unwrap(), U256::from(500_000_000_000_000_000u64));
		assert!(parse_ether("0.0000000000000000001").is_err());
		assert!(parse_ether("1e18").is_err());
		assert!(parse_ether("").is_err());
		assert!(parse_ether("-1").is_err());
		assert!(parse_ether("1.2.3").is_err());
	}
}
