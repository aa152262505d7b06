//! Lifecycle management for the raffle engine.
//!
//! Handles start-up and shutdown of the engine's background work.

use super::{EngineError, RaffleEngine};

impl RaffleEngine {
	/// Resolves the wallet's current chain and loads the initial state.
	///
	/// Fails when the registry holds no deployment at all.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let supported_chains = self.resolver.supported_chains();
		tracing::info!(?supported_chains, "Initializing raffle engine");
		if supported_chains.is_empty() {
			return Err(EngineError::Config(format!(
				"No raffle deployments registered in {}",
				self.config.registry.path.display()
			)));
		}

		let state = self.wallet.context().current();
		self.handle_wallet_change(state).await;
		Ok(())
	}

	/// Stops background monitoring.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down raffle engine");
		self.monitor.stop().await;
		Ok(())
	}
}
