//! Raffle contract event monitor.
//!
//! Polls the resolved raffle for `RaffleEnter`, `RequestedRaffleWinner` and
//! `WinnerPicked` logs and republishes them as [`RaffleEvent::Chain`]. Only
//! blocks mined after the monitor started are reported.

use crate::engine::event_bus::EventBus;
use alloy_primitives::Address;
use raffle_contract::{ContractError, RaffleContractService};
use raffle_types::{truncate_id, ChainId, RaffleEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::instrument;

struct RunningMonitor {
	chain_id: ChainId,
	contract: Address,
	stop: oneshot::Sender<()>,
	handle: JoinHandle<()>,
}

/// Watches one raffle deployment at a time.
pub struct RaffleEventMonitor {
	contract: Arc<RaffleContractService>,
	event_bus: EventBus,
	polling_interval: Duration,
	running: Mutex<Option<RunningMonitor>>,
}

impl RaffleEventMonitor {
	pub fn new(
		contract: Arc<RaffleContractService>,
		event_bus: EventBus,
		polling_interval: Duration,
	) -> Self {
		Self {
			contract,
			event_bus,
			polling_interval,
			running: Mutex::new(None),
		}
	}

	/// Starts watching `address` on `chain_id`, replacing any other target.
	pub async fn start(&self, chain_id: ChainId, address: Address) {
		let mut running = self.running.lock().await;
		if let Some(current) = running.as_ref() {
			if current.chain_id == chain_id
				&& current.contract == address
				&& !current.handle.is_finished()
			{
				return;
			}
		}
		if let Some(previous) = running.take() {
			Self::halt(previous).await;
		}

		let (stop, stop_rx) = oneshot::channel();
		let handle = tokio::spawn(watch_events(
			self.contract.clone(),
			self.event_bus.clone(),
			chain_id,
			address,
			self.polling_interval,
			stop_rx,
		));

		*running = Some(RunningMonitor {
			chain_id,
			contract: address,
			stop,
			handle,
		});
	}

	/// Stops watching. No-op when idle.
	pub async fn stop(&self) {
		if let Some(previous) = self.running.lock().await.take() {
			Self::halt(previous).await;
		}
	}

	/// Deployment currently watched.
	pub async fn target(&self) -> Option<(ChainId, Address)> {
		self.running
			.lock()
			.await
			.as_ref()
			.map(|running| (running.chain_id, running.contract))
	}

	async fn halt(monitor: RunningMonitor) {
		let _ = monitor.stop.send(());
		if let Err(e) = monitor.handle.await {
			tracing::warn!(error = %e, "Event monitor task ended abnormally");
		}
	}
}

#[instrument(skip_all, fields(chain_id = chain_id, contract = %truncate_id(&address.to_string())))]
async fn watch_events(
	contract: Arc<RaffleContractService>,
	event_bus: EventBus,
	chain_id: ChainId,
	address: Address,
	polling_interval: Duration,
	mut stop: oneshot::Receiver<()>,
) {
	tracing::info!("Watching raffle events");

	let mut interval = tokio::time::interval(polling_interval);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
	let mut last_block = None;

	loop {
		tokio::select! {
			_ = interval.tick() => {
				if let Err(e) = poll_events(&contract, &event_bus, chain_id, address, &mut last_block).await {
					tracing::warn!(error = %e, "Failed to poll raffle events");
				}
			}
			_ = &mut stop => break,
		}
	}

	tracing::info!("Stopped watching raffle events");
}

async fn poll_events(
	contract: &RaffleContractService,
	event_bus: &EventBus,
	chain_id: ChainId,
	address: Address,
	last_block: &mut Option<u64>,
) -> Result<(), ContractError> {
	let current = contract.get_block_number(chain_id).await?;

	let from_block = match *last_block {
		// Start from the head; history is not replayed.
		None => {
			*last_block = Some(current);
			return Ok(());
		},
		Some(last) if current <= last => return Ok(()),
		Some(last) => last + 1,
	};

	tracing::debug!(from_block, to_block = current, "Polling raffle events");
	let events = contract
		.get_events(chain_id, address, from_block, current)
		.await?;

	for event in events {
		tracing::info!(?event, "Raffle event");
		event_bus.publish(RaffleEvent::Chain(event)).ok();
	}
	*last_block = Some(current);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use raffle_contract::implementations::simulated::SimulatedRaffle;
	use raffle_types::{ChainEvent, U256};

	const CONTRACT: Address = Address::new([0x5f; 20]);
	const PLAYER: Address = Address::new([0x42; 20]);

	fn fee() -> U256 {
		U256::from(10_000_000_000_000_000u64)
	}

	fn monitor(
		raffle: &SimulatedRaffle,
		event_bus: &EventBus,
	) -> (Arc<RaffleContractService>, RaffleEventMonitor) {
		let contract = Arc::new(RaffleContractService::new(Box::new(raffle.clone()), 1));
		let monitor =
			RaffleEventMonitor::new(contract.clone(), event_bus.clone(), Duration::from_secs(1));
		(contract, monitor)
	}

	async fn next_chain_event(
		events: &mut tokio::sync::broadcast::Receiver<RaffleEvent>,
	) -> ChainEvent {
		loop {
			let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
				.await
				.expect("no chain event")
				.unwrap();
			if let RaffleEvent::Chain(event) = event {
				return event;
			}
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_reports_new_events_only() {
		let raffle = SimulatedRaffle::new().with_player(PLAYER);
		let bus = EventBus::new(32);
		let mut events = bus.subscribe();
		let (contract, monitor) = monitor(&raffle, &bus);

		// Entered before monitoring started: never reported.
		contract.enter(31337, CONTRACT, fee()).await.unwrap();

		monitor.start(31337, CONTRACT).await;
		tokio::time::sleep(Duration::from_millis(10)).await;

		contract.enter(31337, CONTRACT, fee()).await.unwrap();
		assert_eq!(
			next_chain_event(&mut events).await,
			ChainEvent::PlayerEntered {
				player: PLAYER,
				block_number: 2
			}
		);

		let winner = raffle.pick_winner(31337, CONTRACT).await.unwrap();
		assert!(matches!(
			next_chain_event(&mut events).await,
			ChainEvent::WinnerRequested { block_number: 3, .. }
		));
		assert_eq!(
			next_chain_event(&mut events).await,
			ChainEvent::WinnerPicked {
				winner,
				block_number: 4
			}
		);

		monitor.stop().await;
		assert_eq!(monitor.target().await, None);
	}

	#[tokio::test(start_paused = true)]
	async fn test_start_replaces_target() {
		let raffle = SimulatedRaffle::new();
		let bus = EventBus::new(8);
		let (_, monitor) = monitor(&raffle, &bus);

		monitor.start(31337, CONTRACT).await;
		monitor.start(31337, CONTRACT).await;
		assert_eq!(monitor.target().await, Some((31337, CONTRACT)));

		monitor.start(5, Address::ZERO).await;
		assert_eq!(monitor.target().await, Some((5, Address::ZERO)));

		monitor.stop().await;
		monitor.stop().await;
	}
}
