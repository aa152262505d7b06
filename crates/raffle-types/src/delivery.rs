//! Transaction delivery types.
//!
//! Hashes and receipts returned by the contract transport once an
//! `enterRaffle` transaction has been sent.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(pub B256);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl From<B256> for TransactionHash {
	fn from(hash: B256) -> Self {
		Self(hash)
	}
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Decoded revert reason when `success` is false and the reason could be recovered.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub revert_reason: Option<String>,
}
