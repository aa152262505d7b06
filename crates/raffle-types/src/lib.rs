//! Common types for the raffle client.
//!
//! This crate defines the data model shared by every raffle client component:
//! wallet and chain state, the deployed contract address registry, raffle
//! snapshots, transaction lifecycle types, events and notifications. Keeping
//! them in one place lets the wallet, contract and core crates agree on a
//! single vocabulary.

/// Wallet connectivity and chain state.
pub mod chain;
/// Transaction hashes and receipts.
pub mod delivery;
/// Registry of deployed raffle contract addresses per chain.
pub mod deployments;
/// Event types published on the client event bus.
pub mod events;
/// Network configuration types.
pub mod networks;
/// User facing notifications.
pub mod notification;
/// Raffle state snapshot and submitter transaction state.
pub mod raffle;
/// Self-registration of pluggable implementations.
pub mod registry;
/// Secret string wrapper for private keys.
pub mod secret_string;
/// Formatting helpers for hashes and ether amounts.
pub mod utils;
/// Configuration schema validation.
pub mod validation;

pub use alloy_primitives::{Address, B256, U256};
pub use chain::{ChainId, WalletState};
pub use delivery::{TransactionHash, TransactionReceipt};
pub use deployments::{ContractAddressRegistry, RegistryError};
pub use events::{ChainEvent, RaffleEvent, SnapshotEvent, TransactionEvent};
pub use networks::{NetworkConfig, NetworksConfig};
pub use notification::{Notification, NotificationKind, Placement};
pub use raffle::{RaffleSnapshot, TransactionState};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use utils::{format_ether, parse_ether, truncate_id, with_0x_prefix, without_0x_prefix};
pub use validation::*;
