//! Subcommand implementations and their terminal output.

use alloy_primitives::{Address, U256};
use raffle_config::Config;
use raffle_core::{EngineStatus, Resolution, TracingNotifier};
use raffle_types::{
	format_ether, ChainEvent, ChainId, ContractAddressRegistry, RaffleEvent, SnapshotEvent,
	TransactionEvent,
};
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::factory_registry::build_engine_from_config;

/// Prints the wallet, resolved raffle and its current state.
pub async fn status(config: Config) -> Result<(), Box<dyn std::error::Error>> {
	let engine = build_engine_from_config(config, None).await?;
	engine.initialize().await?;
	println!("{}", format_status(&engine.status()));
	engine.shutdown().await?;
	Ok(())
}

/// Enters the raffle once and reports the outcome.
pub async fn enter(config: Config, value: Option<U256>) -> Result<(), Box<dyn std::error::Error>> {
	let engine = build_engine_from_config(config, Some(Arc::new(TracingNotifier))).await?;
	engine.initialize().await?;

	let submitter = engine.submitter();
	let result = match value {
		Some(value) => submitter.enter_with_value(value).await,
		None => submitter.enter().await,
	};

	let outcome: Result<(), Box<dyn std::error::Error>> = match result {
		Ok(receipt) => {
			println!(
				"Entered the raffle in block {} ({})",
				receipt.block_number, receipt.hash
			);
			println!("{}", format_status(&engine.status()));
			Ok(())
		},
		Err(e) => Err(e.into()),
	};

	engine.shutdown().await?;
	outcome
}

/// Follows the raffle until interrupted, printing every update.
pub async fn watch(config: Config) -> Result<(), Box<dyn std::error::Error>> {
	let engine = build_engine_from_config(config, None).await?;

	let printer = tokio::spawn(print_events(engine.event_bus().subscribe()));
	engine.run().await?;
	printer.abort();
	Ok(())
}

/// Records a deployment in the address registry file.
pub fn register(
	config: &Config,
	chain_id: ChainId,
	address: Address,
) -> Result<(), Box<dyn std::error::Error>> {
	let path = &config.registry.path;
	let mut registry = ContractAddressRegistry::load_or_default(path)?;

	if registry.record_deployment(chain_id, address) {
		registry.save(path)?;
		tracing::info!(chain_id, %address, path = %path.display(), "Recorded deployment");
	} else {
		tracing::info!(chain_id, %address, "Deployment already recorded");
	}

	match registry.canonical(chain_id) {
		Some(canonical) => println!("Chain {}: raffle at {}", chain_id, canonical),
		None => println!("Chain {}: no raffle", chain_id),
	}
	Ok(())
}

async fn print_events(mut events: broadcast::Receiver<RaffleEvent>) {
	loop {
		match events.recv().await {
			Ok(event) => {
				if let Some(line) = describe_event(&event) {
					println!("{}", line);
				}
			},
			Err(broadcast::error::RecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "Event printer lagging");
			},
			Err(broadcast::error::RecvError::Closed) => break,
		}
	}
}

pub fn format_status(status: &EngineStatus) -> String {
	let mut out = String::new();

	let wallet = &status.wallet;
	match (wallet.connected, wallet.account, wallet.chain_id) {
		(true, Some(account), Some(chain_id)) => {
			let _ = writeln!(out, "Wallet:        {} on chain {}", account, chain_id);
		},
		(true, _, _) => {
			let _ = writeln!(out, "Wallet:        connected");
		},
		(false, _, _) => {
			let _ = writeln!(out, "Wallet:        not connected");
		},
	}

	match status.resolution {
		Resolution::Deployed { address, .. } => {
			let _ = writeln!(out, "Raffle:        {}", address);
		},
		Resolution::UnsupportedNetwork { .. } => {
			let _ = writeln!(out, "Raffle:        {}", status.resolution);
		},
	}

	if let Some(snapshot) = status.snapshot {
		let _ = writeln!(out, "Entrance fee:  {} ETH", format_ether(snapshot.entrance_fee));
		let _ = writeln!(out, "Players:       {}", snapshot.number_of_players);
		if snapshot.has_winner() {
			let _ = writeln!(out, "Recent winner: {}", snapshot.recent_winner);
		} else {
			let _ = writeln!(out, "Recent winner: none yet");
		}
	}

	let _ = write!(out, "Transaction:   {}", status.transaction);
	out
}

/// One line for the events a user cares about; `None` for the rest.
pub fn describe_event(event: &RaffleEvent) -> Option<String> {
	match event {
		RaffleEvent::Snapshot(SnapshotEvent::Refreshed { snapshot, .. }) => Some(format!(
			"Fee {} ETH, {} player(s)",
			format_ether(snapshot.entrance_fee),
			snapshot.number_of_players
		)),
		RaffleEvent::Snapshot(SnapshotEvent::RefreshFailed { error, .. }) => {
			Some(format!("Could not read the raffle: {}", error))
		},
		RaffleEvent::Transaction(TransactionEvent::StateChanged { to, .. }) => {
			Some(format!("Transaction {}", to))
		},
		RaffleEvent::Transaction(TransactionEvent::Failed { error }) => {
			Some(format!("Transaction failed: {}", error))
		},
		RaffleEvent::Transaction(_) => None,
		RaffleEvent::Chain(ChainEvent::PlayerEntered { player, .. }) => {
			Some(format!("{} entered the raffle", player))
		},
		RaffleEvent::Chain(ChainEvent::WinnerRequested { .. }) => {
			Some("Drawing a winner".to_string())
		},
		RaffleEvent::Chain(ChainEvent::WinnerPicked { winner, .. }) => {
			Some(format!("Winner: {}", winner))
		},
		RaffleEvent::Notification(notification) => Some(notification.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use raffle_types::{Notification, RaffleSnapshot, TransactionState, WalletState};
	use std::str::FromStr;
	use tempfile::tempdir;

	const RAFFLE: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

	fn config(registry: &std::path::Path) -> Config {
		Config::from_str(&format!(
			r#"
[client]
id = "raffle-cli-test"

[networks.31337]
rpc_url = "http://127.0.0.1:8545"

[registry]
path = "{}"

[wallet]
primary = "local"
[wallet.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
chain_id = 31337

[contract]
primary = "simulated"
[contract.implementations.simulated]
block_time_ms = 0

[monitoring]
enabled = false
"#,
			registry.display()
		))
		.unwrap()
	}

	#[test]
	fn test_format_status_with_snapshot() {
		let status = EngineStatus {
			wallet: WalletState {
				connected: true,
				chain_id: Some(31337),
				account: Some(Address::repeat_byte(0x11)),
			},
			resolution: Resolution::Deployed {
				chain_id: 31337,
				address: RAFFLE,
			},
			snapshot: Some(RaffleSnapshot {
				entrance_fee: U256::from(10_000_000_000_000_000u64),
				number_of_players: 2,
				recent_winner: Address::ZERO,
			}),
			transaction: TransactionState::Idle,
		};

		let text = format_status(&status);
		assert!(text.contains("Entrance fee:  0.01 ETH"));
		assert!(text.contains("Players:       2"));
		assert!(text.contains("Recent winner: none yet"));
		assert!(text.ends_with("Transaction:   idle"));
	}

	#[test]
	fn test_format_status_unsupported() {
		let status = EngineStatus {
			wallet: WalletState {
				connected: true,
				chain_id: Some(1),
				account: Some(Address::repeat_byte(0x11)),
			},
			resolution: Resolution::UnsupportedNetwork { chain_id: Some(1) },
			snapshot: None,
			transaction: TransactionState::Idle,
		};

		let text = format_status(&status);
		assert!(text.contains("no raffle deployed on chain 1"));
		assert!(!text.contains("Entrance fee"));
	}

	#[test]
	fn test_describe_event() {
		let line = describe_event(&RaffleEvent::Notification(
			Notification::transaction_complete(),
		));
		assert_eq!(
			line.as_deref(),
			Some("Transaction Complete!: Transaction Notification")
		);

		let line = describe_event(&RaffleEvent::Transaction(TransactionEvent::StateChanged {
			from: TransactionState::Submitting,
			to: TransactionState::Confirming,
		}));
		assert_eq!(line.as_deref(), Some("Transaction confirming"));
	}

	#[test]
	fn test_register_writes_registry() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("contractAddresses.json");
		let config = config(&path);

		register(&config, 31337, RAFFLE).unwrap();
		register(&config, 31337, Address::repeat_byte(0x22)).unwrap();

		let registry = ContractAddressRegistry::load(&path).unwrap();
		assert_eq!(registry.canonical(31337), Some(RAFFLE));
		assert_eq!(registry.addresses(31337).len(), 2);
	}

	#[tokio::test]
	async fn test_enter_against_simulated_chain() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("contractAddresses.json");
		let config = config(&path);
		register(&config, 31337, RAFFLE).unwrap();

		enter(config.clone(), None).await.unwrap();

		// Underpaying is reported as an error.
		let err = enter(config.clone(), Some(U256::from(1))).await.unwrap_err();
		assert!(err.to_string().contains("Raffle__NotEnoughETHEntered"));

		let engine = build_engine_from_config(config, None).await.unwrap();
		engine.initialize().await.unwrap();
		assert!(engine.status().snapshot.is_some());
	}
}
