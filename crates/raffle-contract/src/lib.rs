//! Raffle contract access for the raffle client.
//!
//! This module defines the transport used to talk to a deployed raffle: the
//! three read-only getters, the payable `enterRaffle` call, confirmation
//! tracking and event log retrieval. Implementations plug in behind
//! [`RaffleContractInterface`]; [`RaffleContractService`] adds the
//! confirmation policy and turns failed receipts into errors.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use raffle_types::{
	truncate_id, ChainEvent, ChainId, ConfigSchema, ImplementationRegistry, NetworksConfig,
	SecretString, TransactionHash, TransactionReceipt,
};
use thiserror::Error;

pub mod abi;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod simulated;
}

/// Errors that can occur while talking to the raffle contract.
#[derive(Debug, Error)]
pub enum ContractError {
	/// The RPC endpoint could not be reached or returned a transport error.
	#[error("Network error: {0}")]
	Network(String),
	/// The signer refused to sign or send the transaction.
	#[error("Transaction rejected: {0}")]
	Rejected(String),
	/// The contract reverted, during estimation or on chain.
	#[error("Transaction reverted: {reason}")]
	Reverted { reason: String },
	/// No provider is configured for the requested chain.
	#[error("No provider available for chain {0}")]
	NoProviderAvailable(ChainId),
	/// The contract returned data that does not match the ABI.
	#[error("Decode error: {0}")]
	Decode(String),
}

/// Transport for a deployed raffle contract.
///
/// Every call names the chain and the contract address explicitly; the
/// transport holds no notion of a current network.
#[async_trait]
pub trait RaffleContractInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// `getEntranceFee()`, in wei.
	async fn entrance_fee(&self, chain_id: ChainId, contract: Address)
		-> Result<U256, ContractError>;

	/// `getNumberOfPlayers()`.
	async fn number_of_players(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<u64, ContractError>;

	/// `getRecentWinner()`.
	async fn recent_winner(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<Address, ContractError>;

	/// Sends `enterRaffle()` with `value` wei attached.
	///
	/// Returns once the node has accepted the transaction.
	async fn enter_raffle(
		&self,
		chain_id: ChainId,
		contract: Address,
		value: U256,
	) -> Result<TransactionHash, ContractError>;

	/// Waits until the transaction has `confirmations` confirmations.
	///
	/// Waits indefinitely; callers bound the wait. A mined but reverted
	/// transaction yields a receipt with `success == false`.
	async fn wait_for_confirmation(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, ContractError>;

	async fn get_block_number(&self, chain_id: ChainId) -> Result<u64, ContractError>;

	/// Raffle events emitted by `contract` within `from_block..=to_block`.
	async fn get_events(
		&self,
		chain_id: ChainId,
		contract: Address,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ChainEvent>, ContractError>;
}

/// Type alias for contract factory functions.
///
/// Receives the implementation table, the networks section and the wallet's
/// private key.
pub type ContractFactory = fn(
	&toml::Value,
	&NetworksConfig,
	&SecretString,
) -> Result<Box<dyn RaffleContractInterface>, ContractError>;

/// Registry trait for contract implementations.
pub trait ContractRegistry: ImplementationRegistry<Factory = ContractFactory> {}

/// Get all registered contract implementations.
pub fn get_all_implementations() -> Vec<(&'static str, ContractFactory)> {
	use implementations::{evm::alloy, simulated};

	vec![
		(alloy::Registry::NAME, alloy::Registry::factory()),
		(simulated::Registry::NAME, simulated::Registry::factory()),
	]
}

/// Service wrapping a contract implementation with the confirmation policy.
pub struct RaffleContractService {
	implementation: Box<dyn RaffleContractInterface>,
	confirmations: u64,
}

impl RaffleContractService {
	/// `confirmations` is the depth every entry waits for, never below one.
	pub fn new(implementation: Box<dyn RaffleContractInterface>, confirmations: u64) -> Self {
		Self {
			implementation,
			confirmations: confirmations.max(1),
		}
	}

	pub fn confirmations(&self) -> u64 {
		self.confirmations
	}

	pub async fn entrance_fee(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<U256, ContractError> {
		self.implementation.entrance_fee(chain_id, contract).await
	}

	pub async fn number_of_players(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<u64, ContractError> {
		self.implementation.number_of_players(chain_id, contract).await
	}

	pub async fn recent_winner(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<Address, ContractError> {
		self.implementation.recent_winner(chain_id, contract).await
	}

	/// Sends `enterRaffle()` carrying `value` wei.
	pub async fn enter(
		&self,
		chain_id: ChainId,
		contract: Address,
		value: U256,
	) -> Result<TransactionHash, ContractError> {
		let hash = self
			.implementation
			.enter_raffle(chain_id, contract, value)
			.await?;
		tracing::info!(
			chain_id,
			tx_hash = %truncate_id(&hash.to_string()),
			"Submitted enterRaffle"
		);
		Ok(hash)
	}

	/// Waits for the configured confirmations of `hash` on `chain_id`.
	///
	/// A receipt with a failed status becomes [`ContractError::Reverted`].
	pub async fn confirm(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, ContractError> {
		let confirmations = self.confirmations;
		tracing::debug!(
			chain_id,
			confirmations,
			tx_hash = %truncate_id(&hash.to_string()),
			"Waiting for confirmations"
		);

		let receipt = self
			.implementation
			.wait_for_confirmation(chain_id, hash, confirmations)
			.await?;

		if !receipt.success {
			return Err(ContractError::Reverted {
				reason: receipt
					.revert_reason
					.unwrap_or_else(|| "execution reverted".to_string()),
			});
		}
		Ok(receipt)
	}

	pub async fn get_block_number(&self, chain_id: ChainId) -> Result<u64, ContractError> {
		self.implementation.get_block_number(chain_id).await
	}

	pub async fn get_events(
		&self,
		chain_id: ChainId,
		contract: Address,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ChainEvent>, ContractError> {
		self.implementation
			.get_events(chain_id, contract, from_block, to_block)
			.await
	}
}
