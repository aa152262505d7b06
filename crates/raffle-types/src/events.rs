//! Event types for communication between client components.
//!
//! Events flow through the event bus so that presentation layers (the CLI,
//! or any other front end) can react to refreshed state, transaction
//! progress and raffle activity without polling the core.

use crate::{
	Address, ChainId, Notification, RaffleSnapshot, TransactionHash, TransactionReceipt,
	TransactionState, U256,
};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all client events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RaffleEvent {
	/// Events from the state synchronizer.
	Snapshot(SnapshotEvent),
	/// Events from the transaction submitter.
	Transaction(TransactionEvent),
	/// Raffle contract events observed on chain.
	Chain(ChainEvent),
	/// A notification meant for the user.
	Notification(Notification),
}

/// Events related to raffle state refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SnapshotEvent {
	/// A refresh completed and replaced the snapshot.
	Refreshed {
		chain_id: ChainId,
		contract: Address,
		snapshot: RaffleSnapshot,
	},
	/// A refresh failed; the previous snapshot was kept.
	RefreshFailed { chain_id: ChainId, error: String },
}

/// Events related to `enterRaffle` submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransactionEvent {
	/// The submitter moved between lifecycle states.
	StateChanged {
		from: TransactionState,
		to: TransactionState,
	},
	/// The transaction was accepted by the node.
	Pending {
		chain_id: ChainId,
		tx_hash: TransactionHash,
		value: U256,
	},
	/// The transaction reached the required confirmations.
	Confirmed { receipt: TransactionReceipt },
	/// The attempt failed.
	Failed { error: String },
}

/// Raffle contract events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
	/// `RaffleEnter(address indexed player)`.
	PlayerEntered { player: Address, block_number: u64 },
	/// `RequestedRaffleWinner(uint256 indexed requestId)`.
	WinnerRequested { request_id: U256, block_number: u64 },
	/// `WinnerPicked(address indexed winner)`.
	WinnerPicked { winner: Address, block_number: u64 },
}

impl ChainEvent {
	pub fn block_number(&self) -> u64 {
		match self {
			Self::PlayerEntered { block_number, .. }
			| Self::WinnerRequested { block_number, .. }
			| Self::WinnerPicked { block_number, .. } => *block_number,
		}
	}
}
