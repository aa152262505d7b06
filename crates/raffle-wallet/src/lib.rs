//! Wallet management for the raffle client.
//!
//! A wallet provider owns the process-wide connection state: whether a wallet
//! is connected, which account it exposes and which chain it is on. The rest
//! of the client never mutates that state. It observes it through a
//! [`WalletContext`], a cheap read-only handle backed by a watch channel.

use alloy_primitives::Address;
use async_trait::async_trait;
use raffle_types::{
	ChainId, ConfigSchema, ImplementationRegistry, SecretString, WalletState,
};
use thiserror::Error;
use tokio::sync::watch;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
	/// The operation needs a connected wallet.
	#[error("Wallet not connected")]
	NotConnected,
	/// The configured key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// Error that occurs when interacting with the wallet implementation.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Interface every wallet provider implements.
#[async_trait]
pub trait WalletInterface: Send + Sync {
	/// Returns the configuration schema for this wallet implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address of the account this wallet signs for.
	async fn address(&self) -> Result<Address, WalletError>;

	/// Returns the private key with 0x prefix.
	///
	/// Contract transports use it to build their signing providers.
	fn get_private_key(&self) -> SecretString;

	/// Subscribes to connection and chain changes.
	fn subscribe(&self) -> watch::Receiver<WalletState>;

	/// Connects the wallet, making its account and chain active.
	async fn connect(&self) -> Result<WalletState, WalletError>;

	/// Disconnects the wallet.
	async fn disconnect(&self) -> Result<(), WalletError>;

	/// Moves the wallet to another chain.
	async fn switch_chain(&self, chain_id: ChainId) -> Result<WalletState, WalletError>;
}

/// Type alias for wallet factory functions.
pub type WalletFactory = fn(&toml::Value) -> Result<Box<dyn WalletInterface>, WalletError>;

/// Registry trait for wallet implementations.
pub trait WalletRegistry: ImplementationRegistry<Factory = WalletFactory> {}

/// Get all registered wallet implementations.
///
/// Returns a vector of (name, factory) tuples used by the binary to build its
/// factory map.
pub fn get_all_implementations() -> Vec<(&'static str, WalletFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Read-only view of the wallet state.
///
/// Cloning is cheap; each clone tracks changes independently.
#[derive(Debug, Clone)]
pub struct WalletContext {
	receiver: watch::Receiver<WalletState>,
}

impl WalletContext {
	pub fn new(receiver: watch::Receiver<WalletState>) -> Self {
		Self { receiver }
	}

	/// Latest wallet state.
	pub fn current(&self) -> WalletState {
		*self.receiver.borrow()
	}

	pub fn is_connected(&self) -> bool {
		self.receiver.borrow().connected
	}

	/// Chain id of a connected wallet, `None` while disconnected.
	pub fn chain_id(&self) -> Option<ChainId> {
		self.receiver.borrow().active_chain()
	}

	/// Account of a connected wallet.
	pub fn account(&self) -> Option<Address> {
		let state = self.receiver.borrow();
		if state.connected {
			state.account
		} else {
			None
		}
	}

	/// Waits for the next connectivity or chain change.
	///
	/// Returns `None` once the wallet provider has been dropped.
	pub async fn changed(&mut self) -> Option<WalletState> {
		self.receiver.changed().await.ok()?;
		Some(*self.receiver.borrow_and_update())
	}
}

/// Service that manages wallet operations.
pub struct WalletService {
	implementation: Box<dyn WalletInterface>,
}

impl WalletService {
	pub fn new(implementation: Box<dyn WalletInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, WalletError> {
		self.implementation.address().await
	}

	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}

	/// Read-only handle to the wallet state for other components.
	pub fn context(&self) -> WalletContext {
		WalletContext::new(self.implementation.subscribe())
	}

	pub async fn connect(&self) -> Result<WalletState, WalletError> {
		let state = self.implementation.connect().await?;
		tracing::info!(
			chain_id = ?state.chain_id,
			account = ?state.account,
			"Wallet connected"
		);
		Ok(state)
	}

	pub async fn disconnect(&self) -> Result<(), WalletError> {
		self.implementation.disconnect().await?;
		tracing::info!("Wallet disconnected");
		Ok(())
	}

	pub async fn switch_chain(&self, chain_id: ChainId) -> Result<WalletState, WalletError> {
		let state = self.implementation.switch_chain(chain_id).await?;
		tracing::info!(chain_id, "Wallet switched chain");
		Ok(state)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[tokio::test]
	async fn test_context_reports_changes() {
		let (sender, receiver) = watch::channel(WalletState::disconnected());
		let mut context = WalletContext::new(receiver);
		assert!(!context.is_connected());
		assert_eq!(context.chain_id(), None);

		let account = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
		sender.send_replace(WalletState {
			connected: true,
			chain_id: Some(31337),
			account: Some(account),
		});

		let state = context.changed().await.unwrap();
		assert!(state.connected);
		assert_eq!(context.chain_id(), Some(31337));
		assert_eq!(context.account(), Some(account));
	}

	#[tokio::test]
	async fn test_context_ends_when_provider_dropped() {
		let (sender, receiver) = watch::channel(WalletState::disconnected());
		let mut context = WalletContext::new(receiver);
		drop(sender);
		assert!(context.changed().await.is_none());
	}

	#[test]
	fn test_disconnected_wallet_hides_chain() {
		let (_sender, receiver) = watch::channel(WalletState {
			connected: false,
			chain_id: Some(5),
			account: None,
		});
		let context = WalletContext::new(receiver);
		assert_eq!(context.chain_id(), None);
		assert_eq!(context.current().chain_id, Some(5));
	}
}
