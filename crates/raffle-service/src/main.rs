//! Command-line raffle client.
//!
//! Connects the configured wallet to the raffle deployed on its chain and
//! either shows the raffle state, enters it once, follows it live or records
//! a new deployment in the address registry.

use alloy_primitives::{Address, U256};
use clap::{Parser, Subcommand};
use raffle_config::Config;
use raffle_types::{parse_ether, ChainId};
use std::path::PathBuf;

mod commands;
mod factory_registry;

/// Command-line arguments for the raffle client.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
	/// Show the wallet, the resolved raffle and its state
	Status,
	/// Enter the raffle, paying the entrance fee unless told otherwise
	Enter {
		/// Payment in wei
		#[arg(long, value_parser = parse_wei, conflicts_with = "ether")]
		value: Option<U256>,
		/// Payment in ether, e.g. 0.01
		#[arg(long, value_parser = parse_ether)]
		ether: Option<U256>,
	},
	/// Follow the raffle and print updates until interrupted
	Watch,
	/// Record a deployed raffle in the address registry
	Register {
		#[arg(long)]
		chain_id: ChainId,
		#[arg(long)]
		address: Address,
	},
}

fn parse_wei(value: &str) -> Result<U256, String> {
	U256::from_str_radix(value.trim(), 10).map_err(|e| format!("invalid wei amount: {}", e))
}

/// Main entry point for the raffle client.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.client.id);

	match args.command {
		Command::Status => commands::status(config).await,
		Command::Enter { value, ether } => commands::enter(config, value.or(ether)).await,
		Command::Watch => {
			tracing::info!("Watching raffle");
			commands::watch(config).await?;
			tracing::info!("Stopped watching");
			Ok(())
		},
		Command::Register { chain_id, address } => commands::register(&config, chain_id, address),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_args_defaults() {
		let args = Args::try_parse_from(["raffle", "status"]).unwrap();
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
		assert_eq!(args.command, Command::Status);
	}

	#[test]
	fn test_enter_payment_flags() {
		let args = Args::try_parse_from(["raffle", "enter", "--value", "1000"]).unwrap();
		assert_eq!(
			args.command,
			Command::Enter {
				value: Some(U256::from(1000)),
				ether: None
			}
		);

		let args = Args::try_parse_from(["raffle", "enter", "--ether", "0.01"]).unwrap();
		assert_eq!(
			args.command,
			Command::Enter {
				value: None,
				ether: Some(U256::from(10_000_000_000_000_000u64))
			}
		);

		assert!(Args::try_parse_from(["raffle", "enter", "--value", "1", "--ether", "1"]).is_err());
		assert!(Args::try_parse_from(["raffle", "enter", "--value", "0.5"]).is_err());
	}

	#[test]
	fn test_register_args() {
		let args = Args::try_parse_from([
			"raffle",
			"-c",
			"raffle.toml",
			"register",
			"--chain-id",
			"31337",
			"--address",
			"0x5FbDB2315678afecb367f032d93F642f64180aa3",
		])
		.unwrap();

		assert_eq!(args.config, PathBuf::from("raffle.toml"));
		assert_eq!(
			args.command,
			Command::Register {
				chain_id: 31337,
				address: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
			}
		);
	}
}
