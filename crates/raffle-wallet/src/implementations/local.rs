//! Local private-key wallet.
//!
//! Holds a single secp256k1 key from configuration. Connecting exposes the
//! key's address on the configured chain; switching chains only changes the
//! reported chain id, since a raw key is valid on every EVM network.

use crate::{WalletError, WalletInterface};
use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use raffle_types::{
	ChainId, ConfigSchema, Field, FieldType, Schema, SecretString,
	ValidationError, WalletState,
};
use tokio::sync::watch;

/// Wallet backed by a private key held in memory.
pub struct LocalWallet {
	signer: PrivateKeySigner,
	private_key: SecretString,
	chain_id: ChainId,
	state: watch::Sender<WalletState>,
}

impl LocalWallet {
	/// Creates a disconnected wallet for `chain_id`.
	pub fn new(private_key: &SecretString, chain_id: ChainId) -> Result<Self, WalletError> {
		let signer: PrivateKeySigner = private_key.with_exposed(|key| {
			key.trim()
				.parse()
				.map_err(|e| WalletError::InvalidKey(format!("{}", e)))
		})?;
		let (state, _) = watch::channel(WalletState::disconnected());

		Ok(Self {
			signer: signer.with_chain_id(Some(chain_id)),
			private_key: private_key.to_prefixed_key(),
			chain_id,
			state,
		})
	}

	fn connected_state(&self, chain_id: ChainId) -> WalletState {
		WalletState {
			connected: true,
			chain_id: Some(chain_id),
			account: Some(self.signer.address()),
		}
	}
}

/// Configuration schema for the local wallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().map(SecretString::from);
					match key {
						Some(key) if key.is_hex_private_key() => Ok(()),
						_ => Err("must be a 32-byte hex string".to_string()),
					}
				}),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![Field::new("auto_connect", FieldType::Boolean)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl WalletInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, WalletError> {
		Ok(self.signer.address())
	}

	fn get_private_key(&self) -> SecretString {
		self.private_key.clone()
	}

	fn subscribe(&self) -> watch::Receiver<WalletState> {
		self.state.subscribe()
	}

	async fn connect(&self) -> Result<WalletState, WalletError> {
		let chain_id = self.state.borrow().chain_id.unwrap_or(self.chain_id);
		let state = self.connected_state(chain_id);
		self.state.send_replace(state);
		Ok(state)
	}

	async fn disconnect(&self) -> Result<(), WalletError> {
		self.state.send_modify(|state| state.connected = false);
		Ok(())
	}

	async fn switch_chain(&self, chain_id: ChainId) -> Result<WalletState, WalletError> {
		if !self.state.borrow().connected {
			return Err(WalletError::NotConnected);
		}
		let state = self.connected_state(chain_id);
		self.state.send_replace(state);
		Ok(state)
	}
}

/// Factory function to create a local wallet from configuration.
///
/// Configuration parameters:
/// - `private_key`: hex encoded key, with or without 0x prefix
/// - `chain_id`: chain the wallet starts on
/// - `auto_connect` (optional, default true): connect immediately
pub fn create_wallet(config: &toml::Value) -> Result<Box<dyn WalletInterface>, WalletError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| WalletError::Implementation(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| WalletError::InvalidKey("private_key is required".to_string()))?;
	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.map(|id| id as ChainId)
		.ok_or_else(|| WalletError::Implementation("chain_id is required".to_string()))?;
	let auto_connect = config
		.get("auto_connect")
		.and_then(|v| v.as_bool())
		.unwrap_or(true);

	let wallet = LocalWallet::new(&private_key, chain_id)?;
	if auto_connect {
		wallet
			.state
			.send_replace(wallet.connected_state(chain_id));
	}

	Ok(Box::new(wallet))
}

/// Registry for the local wallet implementation.
pub struct Registry;

impl raffle_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::WalletFactory;

	fn factory() -> Self::Factory {
		create_wallet
	}
}

impl crate::WalletRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn config(auto_connect: bool) -> toml::Value {
		toml::from_str(&format!(
			"private_key = \"{}\"\nchain_id = 31337\nauto_connect = {}",
			HARDHAT_KEY, auto_connect
		))
		.unwrap()
	}

	#[tokio::test]
	async fn test_address_from_key() {
		let wallet = create_wallet(&config(true)).unwrap();
		assert_eq!(
			wallet.address().await.unwrap(),
			address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);
		assert_eq!(wallet.get_private_key().expose_secret(), HARDHAT_KEY);
	}

	#[tokio::test]
	async fn test_auto_connect() {
		let wallet = create_wallet(&config(true)).unwrap();
		let state = *wallet.subscribe().borrow();
		assert!(state.connected);
		assert_eq!(state.chain_id, Some(31337));

		let wallet = create_wallet(&config(false)).unwrap();
		assert!(!wallet.subscribe().borrow().connected);
	}

	#[tokio::test]
	async fn test_connect_switch_disconnect() {
		let wallet = create_wallet(&config(false)).unwrap();
		let receiver = wallet.subscribe();

		assert!(matches!(
			wallet.switch_chain(5).await,
			Err(WalletError::NotConnected)
		));

		wallet.connect().await.unwrap();
		let state = wallet.switch_chain(5).await.unwrap();
		assert_eq!(state.chain_id, Some(5));
		assert_eq!(receiver.borrow().active_chain(), Some(5));

		wallet.disconnect().await.unwrap();
		assert_eq!(receiver.borrow().active_chain(), None);

		// Reconnecting keeps the last chain.
		let state = wallet.connect().await.unwrap();
		assert_eq!(state.chain_id, Some(5));
	}

	#[test]
	fn test_schema_rejects_bad_key() {
		let bad: toml::Value = toml::from_str("private_key = \"0x1234\"\nchain_id = 1").unwrap();
		assert!(create_wallet(&bad).is_err());

		let missing_chain: toml::Value =
			toml::from_str(&format!("private_key = \"{}\"", HARDHAT_KEY)).unwrap();
		assert!(create_wallet(&missing_chain).is_err());
	}
}
