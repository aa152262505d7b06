//! Wallet connectivity and chain state.
//!
//! The wallet provider owns this state for the whole process. Everything else
//! in the client only observes it.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Numeric identifier of an EVM network (31337 for a local hardhat node).
pub type ChainId = u64;

/// Snapshot of what the wallet provider currently exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
	/// Whether the wallet is connected and able to sign.
	pub connected: bool,
	/// Chain the wallet is pointed at, if known.
	pub chain_id: Option<ChainId>,
	/// Account that signs transactions.
	pub account: Option<Address>,
}

impl WalletState {
	/// A disconnected wallet with no chain or account.
	pub const fn disconnected() -> Self {
		Self {
			connected: false,
			chain_id: None,
			account: None,
		}
	}

	/// Chain id, only when the wallet is actually connected.
	///
	/// A disconnected wallet may still remember the last chain it saw; callers
	/// that need a usable network should go through this accessor.
	pub fn active_chain(&self) -> Option<ChainId> {
		if self.connected {
			self.chain_id
		} else {
			None
		}
	}
}
