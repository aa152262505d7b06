//! Builder for constructing raffle engines.
//!
//! Composes a [`RaffleEngine`] from the configured wallet and contract
//! implementations using factory functions, then loads the contract address
//! registry.

use crate::engine::{event_bus::EventBus, RaffleEngine};
use crate::notification::{EventBusNotifier, NotificationSink};
use raffle_config::Config;
use raffle_contract::{ContractError, RaffleContractInterface, RaffleContractService};
use raffle_types::{ContractAddressRegistry, NetworksConfig, SecretString};
use raffle_wallet::{WalletError, WalletInterface, WalletService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct RaffleFactories<WF, CF> {
	pub wallet_factories: HashMap<String, WF>,
	pub contract_factories: HashMap<String, CF>,
}

/// Builder for constructing a RaffleEngine with pluggable implementations.
pub struct RaffleBuilder {
	config: Config,
	notifier: Option<Arc<dyn NotificationSink>>,
	event_bus_capacity: usize,
}

impl RaffleBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			notifier: None,
			event_bus_capacity: 1000,
		}
	}

	/// Sends notifications to `notifier` instead of the event bus.
	pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	pub fn with_event_bus_capacity(mut self, capacity: usize) -> Self {
		self.event_bus_capacity = capacity.max(1);
		self
	}

	/// Builds the RaffleEngine using factories for each component type.
	pub async fn build<WF, CF>(
		self,
		factories: RaffleFactories<WF, CF>,
	) -> Result<RaffleEngine, BuilderError>
	where
		WF: Fn(&toml::Value) -> Result<Box<dyn WalletInterface>, WalletError>,
		CF: Fn(
			&toml::Value,
			&NetworksConfig,
			&SecretString,
		) -> Result<Box<dyn RaffleContractInterface>, ContractError>,
	{
		// Create wallet implementations
		let mut wallet_impls = HashMap::new();
		for (name, config) in &self.config.wallet.implementations {
			if let Some(factory) = factories.wallet_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						wallet_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.wallet.primary == name;
						tracing::info!(component = "wallet", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "wallet",
							implementation = %name,
							error = %e,
							"Failed to create wallet implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create wallet implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}

		let primary_wallet = &self.config.wallet.primary;
		let wallet_backend = wallet_impls.remove(primary_wallet).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary wallet '{}' has no registered implementation",
				primary_wallet
			))
		})?;
		let wallet = Arc::new(WalletService::new(wallet_backend));
		let private_key = wallet.get_private_key();

		// Create contract implementations
		let mut contract_impls = HashMap::new();
		for (name, config) in &self.config.contract.implementations {
			if let Some(factory) = factories.contract_factories.get(name) {
				match factory(config, &self.config.networks, &private_key) {
					Ok(implementation) => {
						contract_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.contract.primary == name;
						tracing::info!(component = "contract", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "contract",
							implementation = %name,
							error = %e,
							"Failed to create contract implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create contract implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}

		let primary_contract = &self.config.contract.primary;
		let contract_backend = contract_impls.remove(primary_contract).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary contract '{}' has no registered implementation",
				primary_contract
			))
		})?;
		let contract = Arc::new(RaffleContractService::new(
			contract_backend,
			self.config.contract.confirmations,
		));

		let registry = ContractAddressRegistry::load_or_default(&self.config.registry.path)
			.map_err(|e| {
				BuilderError::Config(format!(
					"Failed to load contract registry {}: {}",
					self.config.registry.path.display(),
					e
				))
			})?;
		tracing::info!(
			component = "registry",
			path = %self.config.registry.path.display(),
			chains = ?registry.supported_chains(),
			"Loaded"
		);

		let event_bus = EventBus::new(self.event_bus_capacity);
		let notifier = self
			.notifier
			.unwrap_or_else(|| Arc::new(EventBusNotifier::new(event_bus.clone())));

		Ok(RaffleEngine::new(
			self.config,
			wallet,
			contract,
			registry,
			notifier,
			event_bus,
		))
	}
}
