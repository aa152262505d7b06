//! In-process raffle chain.
//!
//! Behaves like a freshly deployed raffle on an automining development node:
//! every address is a raffle, each accepted `enterRaffle` is mined into its
//! own block, and further blocks are mined every `block_time` while someone
//! waits for confirmations. Used by the `simulated` contract implementation
//! and as the stand-in chain in tests, where the hooks below inject failures,
//! delays and reverts.

use crate::{ContractError, RaffleContractInterface};
use alloy_primitives::{keccak256, Address, U256};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use raffle_types::{
	ChainEvent, ChainId, ConfigSchema, Field, FieldType, NetworksConfig, Schema, SecretString,
	TransactionHash, TransactionReceipt, ValidationError,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Default entrance fee: 0.01 ETH.
const DEFAULT_ENTRANCE_FEE_WEI: u64 = 10_000_000_000_000_000;

/// Default interval between mined blocks while confirmations are awaited.
const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(1);

/// A read-only getter of the raffle contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMethod {
	EntranceFee,
	NumberOfPlayers,
	RecentWinner,
}

struct RaffleState {
	entrance_fee: U256,
	players: Vec<Address>,
	recent_winner: Address,
	open: bool,
	request_count: U256,
	events: Vec<ChainEvent>,
}

struct MinedTransaction {
	chain_id: ChainId,
	block_number: u64,
	success: bool,
	revert_reason: Option<String>,
}

struct ChainState {
	default_fee: U256,
	player: Address,
	chain_ids: Option<HashSet<ChainId>>,
	block_time: Duration,
	blocks: HashMap<ChainId, u64>,
	raffles: HashMap<(ChainId, Address), RaffleState>,
	transactions: HashMap<TransactionHash, MinedTransaction>,
	nonce: u64,
	read_failure: Option<ReadMethod>,
	read_delay: Duration,
	reject_next: bool,
	revert_next: Option<String>,
}

impl ChainState {
	fn check_chain(&self, chain_id: ChainId) -> Result<(), ContractError> {
		match &self.chain_ids {
			Some(ids) if !ids.contains(&chain_id) => Err(ContractError::NoProviderAvailable(chain_id)),
			_ => Ok(()),
		}
	}

	fn raffle(&mut self, chain_id: ChainId, contract: Address) -> &mut RaffleState {
		let default_fee = self.default_fee;
		self.raffles
			.entry((chain_id, contract))
			.or_insert_with(|| RaffleState {
				entrance_fee: default_fee,
				players: Vec::new(),
				recent_winner: Address::ZERO,
				open: true,
				request_count: U256::ZERO,
				events: Vec::new(),
			})
	}

	fn mine_block(&mut self, chain_id: ChainId) -> u64 {
		let block = self.blocks.entry(chain_id).or_insert(0);
		*block += 1;
		*block
	}

	fn block_number(&self, chain_id: ChainId) -> u64 {
		self.blocks.get(&chain_id).copied().unwrap_or(0)
	}

	fn next_hash(&mut self, chain_id: ChainId, contract: Address) -> TransactionHash {
		self.nonce += 1;
		let mut preimage = Vec::with_capacity(36);
		preimage.extend_from_slice(&chain_id.to_be_bytes());
		preimage.extend_from_slice(contract.as_slice());
		preimage.extend_from_slice(&self.nonce.to_be_bytes());
		TransactionHash(keccak256(preimage))
	}
}

struct Inner {
	state: Mutex<ChainState>,
	hold: watch::Sender<bool>,
	reads: AtomicUsize,
	submissions: AtomicUsize,
}

/// Simulated raffle chain. Clones share the same chain.
#[derive(Clone)]
pub struct SimulatedRaffle {
	inner: Arc<Inner>,
}

impl Default for SimulatedRaffle {
	fn default() -> Self {
		Self::new()
	}
}

impl SimulatedRaffle {
	/// A chain accepting every chain id, with a 0.01 ETH fee.
	pub fn new() -> Self {
		let (hold, _) = watch::channel(false);
		Self {
			inner: Arc::new(Inner {
				state: Mutex::new(ChainState {
					default_fee: U256::from(DEFAULT_ENTRANCE_FEE_WEI),
					player: Address::ZERO,
					chain_ids: None,
					block_time: DEFAULT_BLOCK_TIME,
					blocks: HashMap::new(),
					raffles: HashMap::new(),
					transactions: HashMap::new(),
					nonce: 0,
					read_failure: None,
					read_delay: Duration::ZERO,
					reject_next: false,
					revert_next: None,
				}),
				hold,
				reads: AtomicUsize::new(0),
				submissions: AtomicUsize::new(0),
			}),
		}
	}

	/// Restricts the chain to the given chain ids.
	pub fn with_chain_ids(self, chain_ids: impl IntoIterator<Item = ChainId>) -> Self {
		self.configure(|state| state.chain_ids = Some(chain_ids.into_iter().collect()))
	}

	/// Fee of raffles not touched yet.
	pub fn with_entrance_fee(self, fee: U256) -> Self {
		self.configure(|state| state.default_fee = fee)
	}

	/// Account recorded as the player of every entry.
	pub fn with_player(self, player: Address) -> Self {
		self.configure(|state| state.player = player)
	}

	pub fn with_block_time(self, block_time: Duration) -> Self {
		self.configure(|state| state.block_time = block_time)
	}

	fn configure(self, f: impl FnOnce(&mut ChainState)) -> Self {
		// Only called while building, before the chain is shared.
		if let Ok(mut state) = self.inner.state.try_lock() {
			f(&mut state);
		}
		self
	}

	pub async fn set_entrance_fee(&self, chain_id: ChainId, contract: Address, fee: U256) {
		self.inner
			.state
			.lock()
			.await
			.raffle(chain_id, contract)
			.entrance_fee = fee;
	}

	/// Opens or closes the raffle for entries.
	pub async fn set_open(&self, chain_id: ChainId, contract: Address, open: bool) {
		self.inner.state.lock().await.raffle(chain_id, contract).open = open;
	}

	/// Draws a winner among the current players and starts a new round.
	///
	/// Emits `RequestedRaffleWinner` and `WinnerPicked` in two new blocks.
	/// Returns `None` when nobody has entered.
	pub async fn pick_winner(&self, chain_id: ChainId, contract: Address) -> Option<Address> {
		let mut state = self.inner.state.lock().await;
		if state.raffle(chain_id, contract).players.is_empty() {
			return None;
		}

		let request_block = state.mine_block(chain_id);
		let pick_block = state.mine_block(chain_id);
		let raffle = state.raffle(chain_id, contract);

		raffle.request_count += U256::from(1);
		let winner = raffle.players[(pick_block as usize) % raffle.players.len()];
		raffle.players.clear();
		raffle.recent_winner = winner;
		raffle.events.push(ChainEvent::WinnerRequested {
			request_id: raffle.request_count,
			block_number: request_block,
		});
		raffle.events.push(ChainEvent::WinnerPicked {
			winner,
			block_number: pick_block,
		});
		Some(winner)
	}

	/// Makes every call to `method` fail with a network error until cleared.
	pub async fn set_read_failure(&self, method: Option<ReadMethod>) {
		self.inner.state.lock().await.read_failure = method;
	}

	/// Delays reads started from now on.
	pub async fn set_read_delay(&self, delay: Duration) {
		self.inner.state.lock().await.read_delay = delay;
	}

	/// While held, confirmation waits do not progress.
	pub fn hold_confirmations(&self, held: bool) {
		self.inner.hold.send_replace(held);
	}

	/// The next `enterRaffle` is refused as if the user declined to sign.
	pub async fn reject_next_submission(&self) {
		self.inner.state.lock().await.reject_next = true;
	}

	/// The next `enterRaffle` is mined but reverts with `reason`.
	pub async fn revert_next_confirmation(&self, reason: impl Into<String>) {
		self.inner.state.lock().await.revert_next = Some(reason.into());
	}

	pub async fn players(&self, chain_id: ChainId, contract: Address) -> Vec<Address> {
		self.inner
			.state
			.lock()
			.await
			.raffle(chain_id, contract)
			.players
			.clone()
	}

	/// Getter calls served so far, failed ones included.
	pub fn read_count(&self) -> usize {
		self.inner.reads.load(Ordering::SeqCst)
	}

	/// `enterRaffle` calls received so far.
	pub fn submission_count(&self) -> usize {
		self.inner.submissions.load(Ordering::SeqCst)
	}

	async fn read<T>(
		&self,
		method: ReadMethod,
		chain_id: ChainId,
		contract: Address,
		get: impl FnOnce(&RaffleState) -> T,
	) -> Result<T, ContractError> {
		self.inner.reads.fetch_add(1, Ordering::SeqCst);

		let (delay, failing) = {
			let state = self.inner.state.lock().await;
			state.check_chain(chain_id)?;
			(state.read_delay, state.read_failure == Some(method))
		};
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		if failing {
			return Err(ContractError::Network(format!(
				"connection refused while calling {:?}",
				method
			)));
		}

		let mut state = self.inner.state.lock().await;
		Ok(get(state.raffle(chain_id, contract)))
	}
}

/// Configuration schema for the simulated chain.
pub struct SimulatedRaffleSchema;

impl ConfigSchema for SimulatedRaffleSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new(
					"network_ids",
					FieldType::Array(Box::new(FieldType::Integer {
						min: Some(1),
						max: None,
					})),
				),
				Field::new("entrance_fee", FieldType::String).with_validator(|value| {
					match value.as_str().map(|s| U256::from_str_radix(s, 10)) {
						Some(Ok(_)) => Ok(()),
						_ => Err("entrance_fee must be a decimal wei amount".to_string()),
					}
				}),
				Field::new(
					"block_time_ms",
					FieldType::Integer {
						min: Some(0),
						max: Some(60_000),
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl RaffleContractInterface for SimulatedRaffle {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SimulatedRaffleSchema)
	}

	async fn entrance_fee(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<U256, ContractError> {
		self.read(ReadMethod::EntranceFee, chain_id, contract, |raffle| {
			raffle.entrance_fee
		})
		.await
	}

	async fn number_of_players(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<u64, ContractError> {
		self.read(ReadMethod::NumberOfPlayers, chain_id, contract, |raffle| {
			raffle.players.len() as u64
		})
		.await
	}

	async fn recent_winner(
		&self,
		chain_id: ChainId,
		contract: Address,
	) -> Result<Address, ContractError> {
		self.read(ReadMethod::RecentWinner, chain_id, contract, |raffle| {
			raffle.recent_winner
		})
		.await
	}

	async fn enter_raffle(
		&self,
		chain_id: ChainId,
		contract: Address,
		value: U256,
	) -> Result<TransactionHash, ContractError> {
		self.inner.submissions.fetch_add(1, Ordering::SeqCst);
		let mut state = self.inner.state.lock().await;
		state.check_chain(chain_id)?;

		if std::mem::take(&mut state.reject_next) {
			return Err(ContractError::Rejected(
				"User denied transaction signature".to_string(),
			));
		}

		let raffle = state.raffle(chain_id, contract);
		if !raffle.open {
			return Err(ContractError::Reverted {
				reason: "Raffle__NotOpen".to_string(),
			});
		}
		if value < raffle.entrance_fee {
			return Err(ContractError::Reverted {
				reason: "Raffle__NotEnoughETHEntered".to_string(),
			});
		}

		let hash = state.next_hash(chain_id, contract);
		let block_number = state.mine_block(chain_id);
		let revert_reason = state.revert_next.take();
		let success = revert_reason.is_none();

		if success {
			let player = state.player;
			let raffle = state.raffle(chain_id, contract);
			raffle.players.push(player);
			raffle.events.push(ChainEvent::PlayerEntered {
				player,
				block_number,
			});
		}

		state.transactions.insert(
			hash,
			MinedTransaction {
				chain_id,
				block_number,
				success,
				revert_reason,
			},
		);
		Ok(hash)
	}

	async fn wait_for_confirmation(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, ContractError> {
		let mut hold = self.inner.hold.subscribe();

		loop {
			hold.wait_for(|held| !*held)
				.await
				.map_err(|e| ContractError::Network(e.to_string()))?;

			let block_time = {
				let mut state = self.inner.state.lock().await;
				let current_block = state.block_number(chain_id);
				let tx = state
					.transactions
					.get(hash)
					.filter(|tx| tx.chain_id == chain_id)
					.ok_or_else(|| {
						ContractError::Network(format!("Transaction {} not found", hash))
					})?;

				if current_block.saturating_sub(tx.block_number) + 1 >= confirmations {
					return Ok(TransactionReceipt {
						hash: *hash,
						block_number: tx.block_number,
						success: tx.success,
						revert_reason: tx.revert_reason.clone(),
					});
				}

				if state.block_time.is_zero() {
					state.mine_block(chain_id);
					continue;
				}
				state.block_time
			};

			tokio::time::sleep(block_time).await;
			self.inner.state.lock().await.mine_block(chain_id);
		}
	}

	async fn get_block_number(&self, chain_id: ChainId) -> Result<u64, ContractError> {
		let state = self.inner.state.lock().await;
		state.check_chain(chain_id)?;
		Ok(state.block_number(chain_id))
	}

	async fn get_events(
		&self,
		chain_id: ChainId,
		contract: Address,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<ChainEvent>, ContractError> {
		let mut state = self.inner.state.lock().await;
		state.check_chain(chain_id)?;
		Ok(state
			.raffle(chain_id, contract)
			.events
			.iter()
			.filter(|event| (from_block..=to_block).contains(&event.block_number()))
			.cloned()
			.collect())
	}
}

/// Factory function to create a simulated raffle chain from configuration.
///
/// Configuration parameters (all optional):
/// - `network_ids`: chains to serve (defaults to every configured network)
/// - `entrance_fee`: fee in wei as a decimal string (defaults to 0.01 ETH)
/// - `block_time_ms`: block interval while confirmations are awaited (defaults to 1000)
///
/// Entries are recorded for the account of `private_key`.
pub fn create_simulated_contract(
	config: &toml::Value,
	networks: &NetworksConfig,
	private_key: &SecretString,
) -> Result<Box<dyn RaffleContractInterface>, ContractError> {
	SimulatedRaffleSchema
		.validate(config)
		.map_err(|e| ContractError::Network(format!("Invalid configuration: {}", e)))?;

	let chain_ids: Vec<ChainId> = match config.get("network_ids").and_then(|v| v.as_array()) {
		Some(ids) => ids
			.iter()
			.filter_map(|v| v.as_integer().map(|i| i as ChainId))
			.collect(),
		None => networks.keys().copied().collect(),
	};

	let signer: PrivateKeySigner = private_key.with_exposed(|key| {
		key.parse()
			.map_err(|_| ContractError::Network("Invalid private key format".to_string()))
	})?;

	let mut raffle = SimulatedRaffle::new()
		.with_chain_ids(chain_ids)
		.with_player(signer.address());

	if let Some(fee) = config.get("entrance_fee").and_then(|v| v.as_str()) {
		let fee = U256::from_str_radix(fee, 10)
			.map_err(|e| ContractError::Decode(format!("Invalid entrance_fee: {}", e)))?;
		raffle = raffle.with_entrance_fee(fee);
	}
	if let Some(ms) = config.get("block_time_ms").and_then(|v| v.as_integer()) {
		raffle = raffle.with_block_time(Duration::from_millis(ms as u64));
	}

	tracing::info!("Using simulated raffle chain");
	Ok(Box::new(raffle))
}

/// Registry for the simulated implementation.
pub struct Registry;

impl raffle_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "simulated";
	type Factory = crate::ContractFactory;

	fn factory() -> Self::Factory {
		create_simulated_contract
	}
}

impl crate::ContractRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	const CONTRACT: Address = Address::new([0x5f; 20]);
	const CHAIN: ChainId = 31337;

	fn fee() -> U256 {
		U256::from(DEFAULT_ENTRANCE_FEE_WEI)
	}

	#[tokio::test]
	async fn test_fresh_raffle_state() {
		let raffle = SimulatedRaffle::new();
		assert_eq!(raffle.entrance_fee(CHAIN, CONTRACT).await.unwrap(), fee());
		assert_eq!(raffle.number_of_players(CHAIN, CONTRACT).await.unwrap(), 0);
		assert_eq!(
			raffle.recent_winner(CHAIN, CONTRACT).await.unwrap(),
			Address::ZERO
		);
		assert_eq!(raffle.read_count(), 3);
	}

	#[tokio::test]
	async fn test_enter_records_player_and_event() {
		let player = Address::repeat_byte(0xaa);
		let raffle = SimulatedRaffle::new().with_player(player);

		let hash = raffle.enter_raffle(CHAIN, CONTRACT, fee()).await.unwrap();
		let receipt = raffle.wait_for_confirmation(CHAIN, &hash, 1).await.unwrap();
		assert!(receipt.success);
		assert_eq!(receipt.block_number, 1);

		assert_eq!(raffle.players(CHAIN, CONTRACT).await, vec![player]);
		let events = raffle.get_events(CHAIN, CONTRACT, 0, 10).await.unwrap();
		assert_eq!(
			events,
			vec![ChainEvent::PlayerEntered {
				player,
				block_number: 1
			}]
		);
	}

	#[tokio::test]
	async fn test_underpayment_reverts() {
		let raffle = SimulatedRaffle::new();
		let err = raffle
			.enter_raffle(CHAIN, CONTRACT, fee() - U256::from(1))
			.await
			.unwrap_err();
		assert!(
			matches!(err, ContractError::Reverted { ref reason } if reason == "Raffle__NotEnoughETHEntered")
		);
		assert_eq!(raffle.number_of_players(CHAIN, CONTRACT).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_closed_raffle_reverts() {
		let raffle = SimulatedRaffle::new();
		raffle.set_open(CHAIN, CONTRACT, false).await;
		let err = raffle.enter_raffle(CHAIN, CONTRACT, fee()).await.unwrap_err();
		assert!(matches!(err, ContractError::Reverted { ref reason } if reason == "Raffle__NotOpen"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirmations_mine_blocks() {
		let raffle = SimulatedRaffle::new();
		let hash = raffle.enter_raffle(CHAIN, CONTRACT, fee()).await.unwrap();

		let started = tokio::time::Instant::now();
		let receipt = raffle.wait_for_confirmation(CHAIN, &hash, 6).await.unwrap();
		assert_eq!(receipt.block_number, 1);
		assert_eq!(raffle.get_block_number(CHAIN).await.unwrap(), 6);
		assert_eq!(started.elapsed(), Duration::from_secs(5));
	}

	#[tokio::test]
	async fn test_unsupported_chain() {
		let raffle = SimulatedRaffle::new().with_chain_ids([CHAIN]);
		let err = raffle.entrance_fee(5, CONTRACT).await.unwrap_err();
		assert!(matches!(err, ContractError::NoProviderAvailable(5)));
	}

	#[tokio::test]
	async fn test_pick_winner_resets_round() {
		let player = Address::repeat_byte(0xbb);
		let raffle = SimulatedRaffle::new().with_player(player);
		assert_eq!(raffle.pick_winner(CHAIN, CONTRACT).await, None);

		raffle.enter_raffle(CHAIN, CONTRACT, fee()).await.unwrap();
		assert_eq!(raffle.pick_winner(CHAIN, CONTRACT).await, Some(player));
		assert_eq!(raffle.number_of_players(CHAIN, CONTRACT).await.unwrap(), 0);
		assert_eq!(raffle.recent_winner(CHAIN, CONTRACT).await.unwrap(), player);

		let events = raffle.get_events(CHAIN, CONTRACT, 2, 3).await.unwrap();
		assert_eq!(events.len(), 2);
		assert!(matches!(events[1], ChainEvent::WinnerPicked { winner, block_number: 3 } if winner == player));
	}

	#[tokio::test]
	async fn test_factory_reads_config() {
		let config: toml::Value =
			toml::from_str("network_ids = [31337]\nentrance_fee = \"250\"\nblock_time_ms = 0").unwrap();
		let key = SecretString::from(
			"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
		);
		let contract = create_simulated_contract(&config, &NetworksConfig::new(), &key).unwrap();
		assert_eq!(
			contract.entrance_fee(CHAIN, CONTRACT).await.unwrap(),
			U256::from(250)
		);
		assert!(contract.entrance_fee(1, CONTRACT).await.is_err());
	}
}
