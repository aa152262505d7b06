//! JSON-RPC raffle transport built on Alloy.
//!
//! One signing provider per configured network. Reads go through `eth_call`,
//! entries through `eth_sendTransaction` with the provider's recommended
//! fillers (nonce, gas and fees), and events through `eth_getLogs`.

use crate::abi::{decode_chain_event, decode_revert_reason, monitored_event_signatures, IRaffle};
use crate::{ContractError, RaffleContractInterface};
use alloy_consensus::Transaction as _;
use alloy_network::EthereumWallet;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::{BlockId, Filter, TransactionRequest};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use alloy_transport_http::Http;
use async_trait::async_trait;
use raffle_types::{
	truncate_id, ChainEvent, ChainId, ConfigSchema, Field, FieldType, NetworksConfig, Schema,
	SecretString, TransactionHash, TransactionReceipt, ValidationError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// JSON-RPC error code wallets use when the user declines a request (EIP-1193).
const USER_REJECTED_CODE: i64 = 4001;

/// Default interval between receipt polls.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Alloy-based raffle transport supporting several networks.
pub struct AlloyRaffle {
	providers: HashMap<ChainId, HttpProvider>,
	poll_interval: Duration,
}

impl AlloyRaffle {
	/// Builds a signing provider for every network in `network_ids`.
	pub fn new(
		network_ids: Vec<ChainId>,
		networks: &NetworksConfig,
		signer: PrivateKeySigner,
		poll_interval: Duration,
	) -> Result<Self, ContractError> {
		if network_ids.is_empty() {
			return Err(ContractError::Network(
				"At least one network_id must be specified".to_string(),
			));
		}

		let mut providers = HashMap::new();
		for network_id in network_ids {
			let network = networks.get(&network_id).ok_or_else(|| {
				ContractError::Network(format!("Network {} not found in configuration", network_id))
			})?;

			let url = network.rpc_url.parse().map_err(|e| {
				ContractError::Network(format!("Invalid RPC URL for network {}: {}", network_id, e))
			})?;

			let wallet = EthereumWallet::from(signer.clone().with_chain_id(Some(network_id)));
			let provider = ProviderBuilder::new()
				.with_recommended_fillers()
				.wallet(wallet)
				.on_http(url);

			providers.insert(network_id, Arc::new(provider) as HttpProvider);
		}

		Ok(Self {
			providers,
			poll_interval,
		})
	}

	fn get_provider(&self, chain_id: ChainId) -> Result<&HttpProvider, ContractError> {
		self.providers
			.get(&chain_id)
			.ok_or(ContractError::NoProviderAvailable(chain_id))
	}

	/// Performs an `eth_call` of `C` against `contract` and decodes the result.
	async fn call<C>(
		&self,
		chain_id: ChainId,
		contract: Address,
		call: C,
	) -> Result<C::Return, ContractError>
	where
		C: SolCall + Send,
		C::Return: Send,
	{
		let provider = self.get_provider(chain_id)?;
		let request = TransactionRequest::default()
			.to(contract)
			.input(call.abi_encode().into());

		let output = provider.call(&request).await.map_err(|e| {
			ContractError::Network(format!("Failed to call {}: {}", C::SIGNATURE, e))
		})?;

		C::abi_decode_returns(&output, true)
			.map_err(|e| ContractError::Decode(format!("Invalid {} output: {}", C::SIGNATURE, e)))
	}

	/// Recovers the revert reason of a mined, failed transaction by replaying
	/// it against the state of the preceding block.
	async fn replay_revert_reason(
		&self,
		provider: &HttpProvider,
		tx_hash: B256,
		block_number: u64,
	) -> Option<String> {
		let tx = provider.get_transaction_by_hash(tx_hash).await.ok()??;
		let mut request = TransactionRequest::default()
			.from(tx.from)
			.value(tx.value())
			.input(tx.input().clone().into());
		if let Some(to) = tx.to() {
			request = request.to(to);
		}

		match provider
			.call(&request)
			.block(BlockId::number(block_number.saturating_sub(1)))
			.await
		{
			Ok(_) => None,
			Err(e) => {
				let payload = e.as_error_resp()?;
				match payload.as_revert_data() {
					Some(data) => Some(decode_revert_reason(&data)),
					None => Some(payload.message.to_string()),
				}
			},
		}
	}
}

/// Maps a failed `eth_sendTransaction` (or its gas estimation) to an error.
///
/// Code 4001 or a "user rejected/denied" message is a rejection. Revert data,
/// or a message mentioning a revert, is a revert with the decoded reason.
/// Everything else is a network failure.
pub fn classify_send_error(
	code: Option<i64>,
	message: &str,
	revert_data: Option<&[u8]>,
) -> ContractError {
	let lowered = message.to_lowercase();
	if code == Some(USER_REJECTED_CODE)
		|| lowered.contains("user rejected")
		|| lowered.contains("user denied")
	{
		return ContractError::Rejected(message.to_string());
	}

	if let Some(data) = revert_data.filter(|data| !data.is_empty()) {
		return ContractError::Reverted {
			reason: decode_revert_reason(data),
		};
	}

	if lowered.contains("reverted") {
		return ContractError::Reverted {
			reason: revert_reason_from_message(message),
		};
	}

	ContractError::Network(message.to_string())
}

/// Pulls the reason out of node messages such as
/// `execution reverted: Not enough` or
/// `reverted with custom error 'Raffle__NotEnoughETHEntered()'`.
fn revert_reason_from_message(message: &str) -> String {
	if let Some((_, rest)) = message.split_once("custom error '") {
		if let Some((name, _)) = rest.split_once('\'') {
			return name.trim_end_matches("()").to_string();
		}
	}
	if let Some((_, reason)) = message.split_once("execution reverted: ") {
		return reason.trim().to_string();
	}
	message.to_string()
}

/// Configuration schema for the Alloy transport.
pub struct AlloyRaffleSchema;

impl ConfigSchema for AlloyRaffleSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new(
				"network_ids",
				FieldType::Array(Box::new(FieldType::Integer {
					min: Some(1),
					max: None,
				})),
			)
			.with_validator(|value| match value.as_array() {
				Some(arr) if arr.is_empty() => Err("network_ids cannot be empty".to_string()),
				Some(_) => Ok(()),
				None => Err("network_ids must be an array".to_string()),
			})],
			vec![Field::new(
				"poll_interval_ms",
				FieldType::Integer {
					min: Some(100),
					max: Some(60_000),
				},
			)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl RaffleContractInterface for AlloyRaffle {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyRaffleSchema)
	}

	async fn entrance_fee(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<U256, ContractError> {
		let result = self
			.call(chain_id, contract, IRaffle::getEntranceFeeCall {})
			.await?;
		Ok(result.fee)
	}

	async fn number_of_players(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<u64, ContractError> {
		let result = self
			.call(chain_id, contract, IRaffle::getNumberOfPlayersCall {})
			.await?;
		u64::try_from(result.players)
			.map_err(|e| ContractError::Decode(format!("Player count out of range: {}", e)))
	}

	async fn recent_winner(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<Address, ContractError> {
		let result = self
			.call(chain_id, contract, IRaffle::getRecentWinnerCall {})
			.await?;
		Ok(result.winner)
	}

	async fn enter_raffle(
		&self,
		chain_id: ChainId,
		contract: Address,
		value: U256,
	) -> Result<TransactionHash, ContractError> {
		let provider = self.get_provider(chain_id)?;
		let request = TransactionRequest::default()
			.to(contract)
			.value(value)
			.input(Bytes::from(IRaffle::enterRaffleCall {}.abi_encode()).into());

		let pending = provider.send_transaction(request).await.map_err(|e| {
			match e.as_error_resp() {
				Some(payload) => classify_send_error(
					Some(payload.code),
					&payload.message,
					payload.as_revert_data().as_ref().map(|data| &data[..]),
				),
				None => classify_send_error(None, &e.to_string(), None),
			}
		})?;

		let tx_hash = *pending.tx_hash();
		tracing::debug!(
			chain_id,
			tx_hash = %truncate_id(&tx_hash.to_string()),
			"Transaction accepted by node"
		);
		Ok(TransactionHash(tx_hash))
	}

	async fn wait_for_confirmation(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, ContractError> {
		let provider = self.get_provider(chain_id)?;
		let tx_hash = hash.0;

		loop {
			let receipt = match provider.get_transaction_receipt(tx_hash).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
				Err(e) => {
					return Err(ContractError::Network(format!(
						"Failed to get receipt: {}",
						e
					)));
				},
			};

			let current_block = provider.get_block_number().await.map_err(|e| {
				ContractError::Network(format!("Failed to get block number: {}", e))
			})?;
			let tx_block = receipt.block_number.unwrap_or(current_block);
			let current_confirmations = current_block.saturating_sub(tx_block) + 1;

			if current_confirmations >= confirmations {
				let success = receipt.status();
				let revert_reason = if success {
					None
				} else {
					self.replay_revert_reason(provider, tx_hash, tx_block).await
				};

				return Ok(TransactionReceipt {
					hash: TransactionHash(receipt.transaction_hash),
					block_number: tx_block,
					success,
					revert_reason,
				});
			}

			tracing::debug!(
				"Waiting for {} more confirmations...",
				confirmations.saturating_sub(current_confirmations)
			);
			tokio::time::sleep(self.poll_interval).await;
		}
	}

	async fn get_block_number(&self, chain_id: ChainId) -> Result<u64, ContractError> {
		let provider = self.get_provider(chain_id)?;

		provider
			.get_block_number()
			.await
			.map_err(|e| ContractError::Network(format!("Failed to get block number: {}", e)))
	}

	async fn get_events(
		&self,
		chain_id: ChainId,
		contract: Address,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ChainEvent>, ContractError> {
		let provider = self.get_provider(chain_id)?;
		let filter = Filter::new()
			.address(contract)
			.event_signature(monitored_event_signatures())
			.from_block(from_block)
			.to_block(to_block);

		let logs = provider
			.get_logs(&filter)
			.await
			.map_err(|e| ContractError::Network(format!("Failed to get logs: {}", e)))?;

		let mut events = Vec::with_capacity(logs.len());
		for log in logs {
			let block_number = log.block_number.unwrap_or(to_block);
			match decode_chain_event(&log.inner, block_number) {
				Ok(Some(event)) => events.push(event),
				Ok(None) => {},
				Err(e) => tracing::warn!("Skipping undecodable raffle log: {}", e),
			}
		}
		Ok(events)
	}
}

/// Factory function to create the Alloy transport from configuration.
///
/// Configuration parameters:
/// - `network_ids` (required): networks to build providers for
/// - `poll_interval_ms` (optional, default 1000): receipt polling interval
pub fn create_alloy_contract(
	config: &toml::Value,
	networks: &NetworksConfig,
	private_key: &SecretString,
) -> Result<Box<dyn RaffleContractInterface>, ContractError> {
	AlloyRaffleSchema
		.validate(config)
		.map_err(|e| ContractError::Network(format!("Invalid configuration: {}", e)))?;

	let network_ids = config
		.get("network_ids")
		.and_then(|v| v.as_array())
		.map(|arr| {
			arr.iter()
				.filter_map(|v| v.as_integer().map(|i| i as ChainId))
				.collect::<Vec<_>>()
		})
		.ok_or_else(|| ContractError::Network("network_ids is required".to_string()))?;

	let poll_interval = config
		.get("poll_interval_ms")
		.and_then(|v| v.as_integer())
		.map(|ms| ms as u64)
		.unwrap_or(DEFAULT_POLL_INTERVAL_MS);

	let signer: PrivateKeySigner = private_key.with_exposed(|key| {
		key.parse()
			.map_err(|_| ContractError::Network("Invalid private key format".to_string()))
	})?;

	let raffle = AlloyRaffle::new(
		network_ids,
		networks,
		signer,
		Duration::from_millis(poll_interval),
	)?;
	Ok(Box::new(raffle))
}

/// Registry for the HTTP/Alloy implementation.
pub struct Registry;

impl raffle_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = crate::ContractFactory;

	fn factory() -> Self::Factory {
		create_alloy_contract
	}
}

impl crate::ContractRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_sol_types::SolError;
	use raffle_types::NetworkConfig;

	const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[test]
	fn test_user_rejection() {
		let err = classify_send_error(Some(4001), "User rejected the request.", None);
		assert!(matches!(err, ContractError::Rejected(_)));

		let err = classify_send_error(None, "MetaMask Tx Signature: User denied transaction signature.", None);
		assert!(matches!(err, ContractError::Rejected(_)));
	}

	#[test]
	fn test_revert_data_is_decoded() {
		let data = IRaffle::Raffle__NotEnoughETHEntered {}.abi_encode();
		let err = classify_send_error(Some(3), "execution reverted", Some(&data));
		assert!(
			matches!(err, ContractError::Reverted { ref reason } if reason == "Raffle__NotEnoughETHEntered")
		);
	}

	#[test]
	fn test_revert_reason_from_node_message() {
		let err = classify_send_error(
			Some(-32603),
			"Error: VM Exception while processing transaction: reverted with custom error 'Raffle__NotOpen()'",
			None,
		);
		assert!(matches!(err, ContractError::Reverted { ref reason } if reason == "Raffle__NotOpen"));

		let err = classify_send_error(Some(3), "execution reverted: Not enough", None);
		assert!(matches!(err, ContractError::Reverted { ref reason } if reason == "Not enough"));
	}

	#[test]
	fn test_other_errors_are_network() {
		let err = classify_send_error(None, "error sending request for url", None);
		assert!(matches!(err, ContractError::Network(_)));
	}

	#[test]
	fn test_schema() {
		let valid: toml::Value = toml::from_str("network_ids = [31337]\npoll_interval_ms = 500").unwrap();
		assert!(AlloyRaffleSchema.validate(&valid).is_ok());

		let empty: toml::Value = toml::from_str("network_ids = []").unwrap();
		assert!(AlloyRaffleSchema.validate(&empty).is_err());

		let too_fast: toml::Value = toml::from_str("network_ids = [1]\npoll_interval_ms = 1").unwrap();
		assert!(AlloyRaffleSchema.validate(&too_fast).is_err());
	}

	#[test]
	fn test_factory_requires_known_network() {
		let mut networks = NetworksConfig::new();
		networks.insert(
			31337,
			NetworkConfig {
				name: None,
				rpc_url: "http://127.0.0.1:8545".to_string(),
			},
		);
		let key = SecretString::from(HARDHAT_KEY);

		let config: toml::Value = toml::from_str("network_ids = [31337]").unwrap();
		assert!(create_alloy_contract(&config, &networks, &key).is_ok());

		let config: toml::Value = toml::from_str("network_ids = [5]").unwrap();
		assert!(create_alloy_contract(&config, &networks, &key).is_err());
	}
}
