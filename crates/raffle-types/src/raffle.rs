//! Raffle state as seen by the client.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Read-only raffle state fetched from the contract.
///
/// A snapshot is always replaced as a whole. Its fields are only meaningful
/// right after the refresh that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleSnapshot {
	/// Payment required by `enterRaffle`, in wei.
	pub entrance_fee: U256,
	/// Players entered in the current round.
	pub number_of_players: u64,
	/// Winner of the previous round (zero address before the first draw).
	pub recent_winner: Address,
}

impl RaffleSnapshot {
	/// Whether a winner has been drawn at least once.
	pub fn has_winner(&self) -> bool {
		self.recent_winner != Address::ZERO
	}
}

/// Lifecycle of a single `enterRaffle` attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
	#[default]
	Idle,
	/// Request sent to the wallet/RPC, not yet accepted.
	Submitting,
	/// Accepted, waiting for block confirmations.
	Confirming,
	Succeeded,
	Failed,
}

impl TransactionState {
	/// True while an attempt is in flight and a new one must be refused.
	pub fn is_busy(&self) -> bool {
		matches!(self, Self::Submitting | Self::Confirming)
	}
}

impl fmt::Display for TransactionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Idle => "idle",
			Self::Submitting => "submitting",
			Self::Confirming => "confirming",
			Self::Succeeded => "succeeded",
			Self::Failed => "failed",
		};
		f.write_str(name)
	}
}
