//! Factory registry for raffle client implementations.
//!
//! Collects the factory of every wallet and contract implementation the
//! linked crates provide, so the engine can be built from names found in the
//! configuration.

use raffle_config::Config;
use raffle_contract::ContractFactory;
use raffle_core::{NotificationSink, RaffleBuilder, RaffleEngine, RaffleFactories};
use raffle_wallet::WalletFactory;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub wallet: HashMap<String, WalletFactory>,
	pub contract: HashMap<String, ContractFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			wallet: HashMap::new(),
			contract: HashMap::new(),
		}
	}

	pub fn register_wallet(&mut self, name: impl Into<String>, factory: WalletFactory) {
		self.wallet.insert(name.into(), factory);
	}

	pub fn register_contract(&mut self, name: impl Into<String>, factory: ContractFactory) {
		self.contract.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in raffle_wallet::get_all_implementations() {
			tracing::debug!("Registering wallet implementation: {}", name);
			registry.register_wallet(name, factory);
		}

		for (name, factory) in raffle_contract::get_all_implementations() {
			tracing::debug!("Registering contract implementation: {}", name);
			registry.register_contract(name, factory);
		}

		registry
	})
}

/// Macro to build factories from config implementations
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the raffle engine for `config`.
///
/// `notifier` replaces the default event bus notifier when given.
pub async fn build_engine_from_config(
	config: Config,
	notifier: Option<Arc<dyn NotificationSink>>,
) -> Result<RaffleEngine, Box<dyn std::error::Error>> {
	let registry = initialize_registry();

	let wallet_factories = build_factories!(registry, config.wallet.implementations, wallet, "wallet");
	let contract_factories = build_factories!(
		registry,
		config.contract.implementations,
		contract,
		"contract"
	);

	let mut builder = RaffleBuilder::new(config);
	if let Some(notifier) = notifier {
		builder = builder.with_notifier(notifier);
	}

	let factories = RaffleFactories {
		wallet_factories,
		contract_factories,
	};
	Ok(builder.build(factories).await?)
}
