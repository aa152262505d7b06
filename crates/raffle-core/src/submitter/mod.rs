//! Raffle entry submission.
//!
//! The submitter sends `enterRaffle()` for the connected account, waits for
//! its confirmation within a bounded time and reports the outcome:
//! one notification and one snapshot refresh on success, an error log on
//! failure. Only one attempt runs at a time.

pub mod state;

use crate::engine::event_bus::EventBus;
use crate::notification::NotificationSink;
use crate::resolver::{AddressResolver, Resolution};
use crate::sync::StateSynchronizer;
use alloy_primitives::{Address, U256};
use raffle_contract::{ContractError, RaffleContractService};
use raffle_types::{
	truncate_id, ChainId, Notification, RaffleEvent, TransactionEvent, TransactionReceipt,
	TransactionState,
};
use raffle_wallet::WalletContext;
use state::{AttemptGuard, TransactionStateError, TransactionStateMachine};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Errors returned by an entry attempt.
#[derive(Debug, Error)]
pub enum SubmitError {
	#[error("A transaction is already in progress")]
	InProgress,
	#[error("Wallet not connected")]
	NotConnected,
	#[error("No raffle deployed on chain {0:?}")]
	UnsupportedNetwork(Option<ChainId>),
	#[error("Transport error: {0}")]
	Transport(String),
	#[error("Transaction rejected: {0}")]
	Rejected(String),
	#[error("Transaction reverted: {reason}")]
	Reverted { reason: String },
	#[error("Transaction not confirmed within {0:?}")]
	ConfirmationTimeout(Duration),
	#[error("State error: {0}")]
	State(String),
}

impl From<ContractError> for SubmitError {
	fn from(error: ContractError) -> Self {
		match error {
			ContractError::Rejected(message) => Self::Rejected(message),
			ContractError::Reverted { reason } => Self::Reverted { reason },
			ContractError::Network(_)
			| ContractError::NoProviderAvailable(_)
			| ContractError::Decode(_) => Self::Transport(error.to_string()),
		}
	}
}

impl From<TransactionStateError> for SubmitError {
	fn from(error: TransactionStateError) -> Self {
		match error {
			TransactionStateError::Busy(_) => Self::InProgress,
			TransactionStateError::InvalidTransition { .. } => Self::State(error.to_string()),
		}
	}
}

/// Submits raffle entries for the connected wallet.
pub struct TransactionSubmitter {
	contract: Arc<RaffleContractService>,
	resolver: AddressResolver,
	wallet: WalletContext,
	synchronizer: Arc<StateSynchronizer>,
	notifier: Arc<dyn NotificationSink>,
	event_bus: EventBus,
	state: TransactionStateMachine,
	confirmation_timeout: Duration,
}

impl TransactionSubmitter {
	pub fn new(
		contract: Arc<RaffleContractService>,
		resolver: AddressResolver,
		wallet: WalletContext,
		synchronizer: Arc<StateSynchronizer>,
		notifier: Arc<dyn NotificationSink>,
		event_bus: EventBus,
		confirmation_timeout: Duration,
	) -> Self {
		Self {
			contract,
			resolver,
			wallet,
			synchronizer,
			notifier,
			state: TransactionStateMachine::new(event_bus.clone()),
			event_bus,
			confirmation_timeout,
		}
	}

	pub fn state(&self) -> &TransactionStateMachine {
		&self.state
	}

	/// Enters the raffle paying the current entrance fee.
	///
	/// The fee comes from the latest snapshot of the resolved raffle, or is
	/// read from the contract when none exists yet.
	pub async fn enter(&self) -> Result<TransactionReceipt, SubmitError> {
		self.submit(None).await
	}

	/// Enters the raffle paying `value` wei, whatever the fee.
	pub async fn enter_with_value(&self, value: U256) -> Result<TransactionReceipt, SubmitError> {
		self.submit(Some(value)).await
	}

	#[instrument(skip_all, fields(chain_id = tracing::field::Empty))]
	async fn submit(&self, value: Option<U256>) -> Result<TransactionReceipt, SubmitError> {
		if self.state.current().is_busy() {
			return Err(SubmitError::InProgress);
		}

		let wallet = self.wallet.current();
		if !wallet.connected {
			return Err(SubmitError::NotConnected);
		}
		let (chain_id, contract) = match self.resolver.resolve(wallet.active_chain()) {
			Resolution::Deployed { chain_id, address } => (chain_id, address),
			Resolution::UnsupportedNetwork { chain_id } => {
				return Err(SubmitError::UnsupportedNetwork(chain_id));
			},
		};
		tracing::Span::current().record("chain_id", chain_id);

		self.state.try_begin()?;
		let guard = AttemptGuard::new(&self.state);

		let result = self.execute(chain_id, contract, value).await;
		match &result {
			Ok(receipt) => {
				self.state.transition(TransactionState::Succeeded)?;
				tracing::info!(
					tx_hash = %truncate_id(&receipt.hash.to_string()),
					block_number = receipt.block_number,
					"Raffle entry confirmed"
				);
				self.event_bus
					.publish(RaffleEvent::Transaction(TransactionEvent::Confirmed {
						receipt: receipt.clone(),
					}))
					.ok();

				self.notifier.notify(Notification::transaction_complete());
			},
			Err(e) => {
				self.state.transition(TransactionState::Failed)?;
				tracing::error!(error = %e, "Raffle entry failed");
				self.event_bus
					.publish(RaffleEvent::Transaction(TransactionEvent::Failed {
						error: e.to_string(),
					}))
					.ok();
			},
		}

		self.state.transition(TransactionState::Idle)?;
		drop(guard);

		if result.is_ok() {
			self.refresh_after_entry().await;
		}
		result
	}

	/// Refreshes the snapshot once the entry is confirmed.
	///
	/// Runs with the machine already back to Idle, bounded by the
	/// confirmation timeout.
	async fn refresh_after_entry(&self) {
		if tokio::time::timeout(self.confirmation_timeout, self.synchronizer.refresh())
			.await
			.is_err()
		{
			tracing::warn!(
				timeout = ?self.confirmation_timeout,
				"Snapshot refresh after entry timed out"
			);
		}
	}

	async fn execute(
		&self,
		chain_id: ChainId,
		contract: Address,
		value: Option<U256>,
	) -> Result<TransactionReceipt, SubmitError> {
		let value = match value {
			Some(value) => value,
			None => match self.synchronizer.snapshot_for(chain_id, contract) {
				Some(snapshot) => snapshot.entrance_fee,
				None => self.contract.entrance_fee(chain_id, contract).await?,
			},
		};

		let hash = self.contract.enter(chain_id, contract, value).await?;
		self.event_bus
			.publish(RaffleEvent::Transaction(TransactionEvent::Pending {
				chain_id,
				tx_hash: hash,
				value,
			}))
			.ok();
		self.state.transition(TransactionState::Confirming)?;

		let receipt = tokio::time::timeout(
			self.confirmation_timeout,
			self.contract.confirm(chain_id, &hash),
		)
		.await
		.map_err(|_| SubmitError::ConfirmationTimeout(self.confirmation_timeout))??;

		Ok(receipt)
	}
}
