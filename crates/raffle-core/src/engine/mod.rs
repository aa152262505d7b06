//! Raffle engine that keeps the client in step with the wallet and the chain.
//!
//! The engine owns the three client components and drives them from one
//! loop: wallet connectivity and chain changes re-resolve the raffle and
//! refresh its state, contract events and the optional refresh interval
//! trigger further refreshes. Entries are submitted through
//! [`RaffleEngine::submitter`].

pub mod event_bus;
pub mod lifecycle;

use crate::monitoring::RaffleEventMonitor;
use crate::notification::NotificationSink;
use crate::resolver::{AddressResolver, Resolution};
use crate::submitter::TransactionSubmitter;
use crate::sync::StateSynchronizer;
use raffle_config::Config;
use raffle_contract::RaffleContractService;
use raffle_types::{
	ContractAddressRegistry, RaffleEvent, RaffleSnapshot, TransactionState, WalletState,
};
use raffle_wallet::WalletService;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// What the client currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
	pub wallet: WalletState,
	pub resolution: Resolution,
	/// Only present for the resolved raffle.
	pub snapshot: Option<RaffleSnapshot>,
	pub transaction: TransactionState,
}

/// Main raffle engine.
#[derive(Clone)]
pub struct RaffleEngine {
	/// Client configuration.
	pub(crate) config: Config,
	/// Wallet provider owning the connection state.
	pub(crate) wallet: Arc<WalletService>,
	/// Contract transport with the confirmation policy.
	pub(crate) contract: Arc<RaffleContractService>,
	pub(crate) resolver: AddressResolver,
	pub(crate) synchronizer: Arc<StateSynchronizer>,
	pub(crate) submitter: Arc<TransactionSubmitter>,
	pub(crate) monitor: Arc<RaffleEventMonitor>,
	/// Event bus for inter-component communication.
	pub(crate) event_bus: event_bus::EventBus,
}

impl RaffleEngine {
	/// Wires the client components around an existing wallet and contract.
	pub fn new(
		config: Config,
		wallet: Arc<WalletService>,
		contract: Arc<RaffleContractService>,
		registry: ContractAddressRegistry,
		notifier: Arc<dyn NotificationSink>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let resolver = AddressResolver::new(registry);
		let synchronizer = Arc::new(StateSynchronizer::new(
			contract.clone(),
			resolver.clone(),
			wallet.context(),
			event_bus.clone(),
		));
		let submitter = Arc::new(TransactionSubmitter::new(
			contract.clone(),
			resolver.clone(),
			wallet.context(),
			synchronizer.clone(),
			notifier,
			event_bus.clone(),
			Duration::from_secs(config.client.confirmation_timeout_seconds),
		));
		let monitor = Arc::new(RaffleEventMonitor::new(
			contract.clone(),
			event_bus.clone(),
			Duration::from_secs(config.monitoring.event_polling_interval_seconds),
		));

		Self {
			config,
			wallet,
			contract,
			resolver,
			synchronizer,
			submitter,
			monitor,
			event_bus,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn wallet(&self) -> &Arc<WalletService> {
		&self.wallet
	}

	pub fn contract(&self) -> &Arc<RaffleContractService> {
		&self.contract
	}

	pub fn resolver(&self) -> &AddressResolver {
		&self.resolver
	}

	pub fn synchronizer(&self) -> &Arc<StateSynchronizer> {
		&self.synchronizer
	}

	pub fn submitter(&self) -> &Arc<TransactionSubmitter> {
		&self.submitter
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Resolution of the wallet's current chain.
	pub fn resolution(&self) -> Resolution {
		self.resolver.resolve(self.wallet.context().chain_id())
	}

	pub fn status(&self) -> EngineStatus {
		let wallet = self.wallet.context().current();
		let resolution = self.resolver.resolve(wallet.active_chain());
		let snapshot = match resolution {
			Resolution::Deployed { chain_id, address } => {
				self.synchronizer.snapshot_for(chain_id, address)
			},
			Resolution::UnsupportedNetwork { .. } => None,
		};

		EngineStatus {
			wallet,
			resolution,
			snapshot,
			transaction: self.submitter.state().current(),
		}
	}

	/// Runs until interrupted with Ctrl-C.
	///
	/// If the signal handler cannot be installed the engine shuts down and
	/// reports it.
	pub async fn run(&self) -> Result<(), EngineError> {
		let mut signal_error = None;
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				signal_error = Some(e);
			}
		})
		.await?;

		match signal_error {
			Some(e) => Err(EngineError::Service(format!(
				"Failed to listen for shutdown signal: {}",
				e
			))),
			None => Ok(()),
		}
	}

	/// Runs until `shutdown` completes or the wallet provider goes away.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		// Subscribe first so no change slips in between.
		let mut wallet = self.wallet.context();
		let mut events = self.event_bus.subscribe();
		self.initialize().await?;

		let mut refresh_timer = self.refresh_timer();
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				changed = wallet.changed() => {
					match changed {
						Some(state) => self.handle_wallet_change(state).await,
						None => {
							tracing::warn!("Wallet provider closed");
							break;
						}
					}
				}

				// Refresh whenever the raffle emits an event
				Ok(event) = events.recv() => {
					if let RaffleEvent::Chain(event) = event {
						tracing::debug!(?event, "Refreshing after raffle event");
						self.synchronizer.refresh().await;
					}
				}

				_ = next_tick(&mut refresh_timer) => {
					self.synchronizer.refresh().await;
				}

				_ = &mut shutdown => {
					tracing::info!("Shutdown requested");
					break;
				}
			}
		}

		self.shutdown().await
	}

	pub(crate) async fn handle_wallet_change(&self, state: WalletState) {
		match self.resolver.resolve(state.active_chain()) {
			Resolution::Deployed { chain_id, address } => {
				tracing::info!(chain_id, contract = %address, "Raffle available");
				if self.config.monitoring.enabled {
					self.monitor.start(chain_id, address).await;
				}
				self.synchronizer.refresh().await;
			},
			Resolution::UnsupportedNetwork { chain_id } => {
				if state.connected {
					tracing::warn!(
						?chain_id,
						supported = ?self.resolver.supported_chains(),
						"No raffle deployed on this network"
					);
				} else {
					tracing::info!("Wallet disconnected");
				}
				self.monitor.stop().await;
				self.synchronizer.clear().await;
			},
		}
	}

	fn refresh_timer(&self) -> Option<Interval> {
		match self.config.client.refresh_interval_seconds {
			0 => None,
			seconds => {
				let period = Duration::from_secs(seconds);
				let mut timer = tokio::time::interval_at(Instant::now() + period, period);
				timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
				Some(timer)
			},
		}
	}
}

async fn next_tick(timer: &mut Option<Interval>) {
	match timer {
		Some(timer) => {
			timer.tick().await;
		},
		None => std::future::pending().await,
	}
}

#[cfg(test)]
mod tests {
	use super::event_bus::EventBus;
	use super::*;
	use crate::notification::EventBusNotifier;
	use alloy_primitives::Address;
	use raffle_contract::implementations::simulated::SimulatedRaffle;
	use raffle_types::{
		ChainId, Notification, SecretString, SnapshotEvent, U256,
	};
	use raffle_wallet::implementations::local::LocalWallet;
	use std::str::FromStr;
	use tokio::sync::{broadcast, oneshot};

	const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const CONTRACT: Address = Address::new([0x5f; 20]);
	const GOERLI_CONTRACT: Address = Address::new([0x6e; 20]);

	fn config(refresh_interval_seconds: u64, monitoring: bool) -> Config {
		Config::from_str(&format!(
			r#"
[client]
id = "raffle-engine-test"
refresh_interval_seconds = {refresh_interval_seconds}

[networks.31337]
rpc_url = "http://127.0.0.1:8545"

[networks.5]
rpc_url = "https://goerli.example.org"

[registry]
path = "contractAddresses.json"

[wallet]
primary = "local"
[wallet.implementations.local]
private_key = "{HARDHAT_KEY}"
chain_id = 31337

[contract]
primary = "simulated"
[contract.implementations.simulated]

[monitoring]
enabled = {monitoring}
event_polling_interval_seconds = 1
"#
		))
		.unwrap()
	}

	struct Fixture {
		raffle: SimulatedRaffle,
		engine: RaffleEngine,
		events: broadcast::Receiver<RaffleEvent>,
	}

	fn fixture(config: Config) -> Fixture {
		let raffle = SimulatedRaffle::new();
		let wallet = Arc::new(WalletService::new(Box::new(
			LocalWallet::new(&SecretString::from(HARDHAT_KEY), 31337).unwrap(),
		)));
		let contract = Arc::new(RaffleContractService::new(Box::new(raffle.clone()), 1));

		let mut registry = ContractAddressRegistry::new();
		registry.record_deployment(31337, CONTRACT);
		registry.record_deployment(5, GOERLI_CONTRACT);

		let event_bus = EventBus::new(256);
		let events = event_bus.subscribe();
		let engine = RaffleEngine::new(
			config,
			wallet,
			contract,
			registry,
			Arc::new(EventBusNotifier::new(event_bus.clone())),
			event_bus,
		);

		Fixture {
			raffle,
			engine,
			events,
		}
	}

	fn spawn(
		engine: &RaffleEngine,
	) -> (
		oneshot::Sender<()>,
		tokio::task::JoinHandle<Result<(), EngineError>>,
	) {
		let (stop, stopped) = oneshot::channel::<()>();
		let engine = engine.clone();
		let handle = tokio::spawn(async move {
			engine
				.run_until(async {
					let _ = stopped.await;
				})
				.await
		});
		(stop, handle)
	}

	/// Waits for the next successful refresh and returns its chain and snapshot.
	async fn next_refresh(
		events: &mut broadcast::Receiver<RaffleEvent>,
	) -> (ChainId, RaffleSnapshot) {
		loop {
			let event = tokio::time::timeout(Duration::from_secs(30), events.recv())
				.await
				.expect("no refresh")
				.unwrap();
			if let RaffleEvent::Snapshot(SnapshotEvent::Refreshed {
				chain_id, snapshot, ..
			}) = event
			{
				return (chain_id, snapshot);
			}
		}
	}

	#[tokio::test]
	async fn test_initialize_requires_a_deployment() {
		let event_bus = EventBus::new(16);
		let engine = RaffleEngine::new(
			config(0, false),
			Arc::new(WalletService::new(Box::new(
				LocalWallet::new(&SecretString::from(HARDHAT_KEY), 31337).unwrap(),
			))),
			Arc::new(RaffleContractService::new(Box::new(SimulatedRaffle::new()), 1)),
			ContractAddressRegistry::new(),
			Arc::new(EventBusNotifier::new(event_bus.clone())),
			event_bus,
		);

		let err = engine.initialize().await.unwrap_err();
		assert!(matches!(err, EngineError::Config(ref message) if message.contains("contractAddresses.json")));

		let err = engine.run_until(async {}).await.unwrap_err();
		assert!(matches!(err, EngineError::Config(_)));
	}

	#[tokio::test]
	async fn test_follows_wallet_connection_and_chain() {
		let mut f = fixture(config(0, false));
		let (stop, handle) = spawn(&f.engine);

		f.engine.wallet().connect().await.unwrap();
		assert_eq!(next_refresh(&mut f.events).await.0, 31337);
		assert_eq!(
			f.engine.resolution(),
			Resolution::Deployed {
				chain_id: 31337,
				address: CONTRACT
			}
		);

		f.engine.wallet().switch_chain(5).await.unwrap();
		while next_refresh(&mut f.events).await.0 != 5 {}
		let status = f.engine.status();
		assert_eq!(status.snapshot.map(|s| s.number_of_players), Some(0));
		assert_eq!(status.transaction, TransactionState::Idle);

		stop.send(()).unwrap();
		handle.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn test_unsupported_network_clears_snapshot() {
		let mut f = fixture(config(0, false));
		let (stop, handle) = spawn(&f.engine);

		f.engine.wallet().connect().await.unwrap();
		next_refresh(&mut f.events).await;
		assert!(f.engine.synchronizer().snapshot().is_some());

		f.engine.wallet().switch_chain(1).await.unwrap();
		while f.engine.synchronizer().snapshot().is_some() {
			tokio::task::yield_now().await;
		}

		let status = f.engine.status();
		assert_eq!(
			status.resolution,
			Resolution::UnsupportedNetwork { chain_id: Some(1) }
		);
		assert_eq!(status.snapshot, None);

		stop.send(()).unwrap();
		handle.await.unwrap().unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn test_refreshes_on_raffle_events() {
		let mut f = fixture(config(0, true));
		let (stop, handle) = spawn(&f.engine);

		f.engine.wallet().connect().await.unwrap();
		assert_eq!(next_refresh(&mut f.events).await.1.number_of_players, 0);
		// Give the monitor its first poll.
		tokio::time::sleep(Duration::from_millis(10)).await;

		// Someone else enters through their own client.
		let other = RaffleContractService::new(Box::new(f.raffle.clone()), 1);
		other
			.enter(31337, CONTRACT, U256::from(10_000_000_000_000_000u64))
			.await
			.unwrap();

		loop {
			let (_, snapshot) = next_refresh(&mut f.events).await;
			if snapshot.number_of_players == 1 {
				break;
			}
		}

		stop.send(()).unwrap();
		handle.await.unwrap().unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn test_periodic_refresh() {
		let mut f = fixture(config(10, false));
		let (stop, handle) = spawn(&f.engine);

		f.engine.wallet().connect().await.unwrap();
		next_refresh(&mut f.events).await;

		let reads = f.raffle.read_count();
		next_refresh(&mut f.events).await;
		assert_eq!(f.raffle.read_count(), reads + 3);

		stop.send(()).unwrap();
		handle.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn test_entry_through_engine_notifies_once() {
		let mut f = fixture(config(0, false));
		let (stop, handle) = spawn(&f.engine);

		f.engine.wallet().connect().await.unwrap();
		next_refresh(&mut f.events).await;

		let receipt = f.engine.submitter().enter().await.unwrap();
		assert!(receipt.success);

		let mut notifications = Vec::new();
		while let Ok(event) = f.events.try_recv() {
			if let RaffleEvent::Notification(notification) = event {
				notifications.push(notification);
			}
		}
		assert_eq!(notifications, vec![Notification::transaction_complete()]);
		assert_eq!(
			f.engine.status().snapshot.map(|s| s.number_of_players),
			Some(1)
		);

		stop.send(()).unwrap();
		handle.await.unwrap().unwrap();
	}
}
