//! Contract state synchronizer.
//!
//! Keeps the latest [`RaffleSnapshot`] of the raffle deployed on the wallet's
//! chain. A refresh reads the three getters concurrently and replaces the
//! snapshot only when all three succeed.
//!
//! Every refresh takes a ticket when it starts. A refresh that completes after
//! a later-started one has already published is discarded, so the snapshot
//! always reflects the most recently initiated successful refresh.

use crate::engine::event_bus::EventBus;
use crate::resolver::{AddressResolver, Resolution};
use alloy_primitives::Address;
use arc_swap::ArcSwapOption;
use raffle_contract::RaffleContractService;
use raffle_types::{ChainId, RaffleEvent, RaffleSnapshot, SnapshotEvent};
use raffle_wallet::WalletContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

/// A snapshot together with the deployment it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncedSnapshot {
	pub chain_id: ChainId,
	pub contract: Address,
	pub snapshot: RaffleSnapshot,
}

/// Why a refresh did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	Disconnected,
	UnsupportedNetwork(Option<ChainId>),
}

/// Result of a single [`StateSynchronizer::refresh`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// All reads succeeded and the snapshot was replaced.
	Updated(RaffleSnapshot),
	/// Preconditions were not met; nothing was read.
	Skipped(SkipReason),
	/// A read failed; the previous snapshot is untouched.
	Failed(String),
	/// A refresh started later already published its result.
	Superseded,
}

/// Refreshes and stores the raffle snapshot.
pub struct StateSynchronizer {
	contract: Arc<RaffleContractService>,
	resolver: AddressResolver,
	wallet: WalletContext,
	event_bus: EventBus,
	current: ArcSwapOption<SyncedSnapshot>,
	next_ticket: AtomicU64,
	/// Ticket of the last refresh that wrote `current`.
	published: Mutex<u64>,
}

impl StateSynchronizer {
	pub fn new(
		contract: Arc<RaffleContractService>,
		resolver: AddressResolver,
		wallet: WalletContext,
		event_bus: EventBus,
	) -> Self {
		Self {
			contract,
			resolver,
			wallet,
			event_bus,
			current: ArcSwapOption::empty(),
			next_ticket: AtomicU64::new(0),
			published: Mutex::new(0),
		}
	}

	/// Latest snapshot with its deployment, if any refresh succeeded.
	pub fn current(&self) -> Option<Arc<SyncedSnapshot>> {
		self.current.load_full()
	}

	pub fn snapshot(&self) -> Option<RaffleSnapshot> {
		self.current.load_full().map(|synced| synced.snapshot)
	}

	/// Snapshot of a specific deployment, ignoring one read elsewhere.
	pub fn snapshot_for(&self, chain_id: ChainId, contract: Address) -> Option<RaffleSnapshot> {
		self.current
			.load_full()
			.filter(|synced| synced.chain_id == chain_id && synced.contract == contract)
			.map(|synced| synced.snapshot)
	}

	/// Re-reads the raffle state from the contract.
	///
	/// Never returns an error: failures are logged, reported on the event
	/// bus and leave the previous snapshot in place.
	#[instrument(skip_all, fields(chain_id = tracing::field::Empty))]
	pub async fn refresh(&self) -> RefreshOutcome {
		let wallet = self.wallet.current();
		if !wallet.connected {
			tracing::debug!("Wallet disconnected, skipping refresh");
			return RefreshOutcome::Skipped(SkipReason::Disconnected);
		}

		let (chain_id, contract) = match self.resolver.resolve(wallet.active_chain()) {
			Resolution::Deployed { chain_id, address } => (chain_id, address),
			Resolution::UnsupportedNetwork { chain_id } => {
				tracing::debug!(?chain_id, "No raffle on this network, skipping refresh");
				return RefreshOutcome::Skipped(SkipReason::UnsupportedNetwork(chain_id));
			},
		};
		tracing::Span::current().record("chain_id", chain_id);

		let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;

		let fetched = tokio::try_join!(
			self.contract.entrance_fee(chain_id, contract),
			self.contract.number_of_players(chain_id, contract),
			self.contract.recent_winner(chain_id, contract),
		);

		let (entrance_fee, number_of_players, recent_winner) = match fetched {
			Ok(values) => values,
			Err(e) => {
				tracing::warn!(error = %e, "Failed to refresh raffle state");
				self.event_bus
					.publish(RaffleEvent::Snapshot(SnapshotEvent::RefreshFailed {
						chain_id,
						error: e.to_string(),
					}))
					.ok();
				return RefreshOutcome::Failed(e.to_string());
			},
		};

		let snapshot = RaffleSnapshot {
			entrance_fee,
			number_of_players,
			recent_winner,
		};

		{
			let mut published = self.published.lock().await;
			if *published > ticket {
				tracing::debug!(ticket, latest = *published, "Discarding superseded refresh");
				return RefreshOutcome::Superseded;
			}
			*published = ticket;
			self.current.store(Some(Arc::new(SyncedSnapshot {
				chain_id,
				contract,
				snapshot,
			})));
		}

		tracing::debug!(
			entrance_fee = %entrance_fee,
			number_of_players,
			recent_winner = %recent_winner,
			"Raffle state refreshed"
		);
		self.event_bus
			.publish(RaffleEvent::Snapshot(SnapshotEvent::Refreshed {
				chain_id,
				contract,
				snapshot,
			}))
			.ok();

		RefreshOutcome::Updated(snapshot)
	}

	/// Drops the stored snapshot, e.g. after moving to an unsupported network.
	///
	/// Refreshes started before the call can no longer publish.
	pub async fn clear(&self) {
		let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
		let mut published = self.published.lock().await;
		*published = ticket;
		self.current.store(None);
	}
}
