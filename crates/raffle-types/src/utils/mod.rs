//! Utility functions for display formatting and unit conversion.

pub mod formatting;

pub use formatting::{format_ether, parse_ether, truncate_id, with_0x_prefix, without_0x_prefix};
