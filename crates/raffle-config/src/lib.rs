//! Configuration module for the raffle client.
//!
//! This module provides structures and utilities for managing client configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use raffle_types::{networks::deserialize_networks, NetworksConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the raffle client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Client identity and timing settings.
	pub client: ClientConfig,
	/// RPC endpoints keyed by chain id.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Location of the deployed contract address registry.
	pub registry: RegistryConfig,
	/// Wallet provider selection.
	pub wallet: WalletConfig,
	/// Contract transport selection.
	pub contract: ContractConfig,
	/// Contract event polling.
	#[serde(default)]
	pub monitoring: MonitoringConfig,
}

/// Configuration specific to this client instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
	/// Identifier used in log lines.
	pub id: String,
	/// Upper bound on waiting for an entry transaction to confirm.
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
	/// Periodic snapshot refresh. Zero disables it.
	#[serde(default)]
	pub refresh_interval_seconds: u64,
}

/// Returns the default confirmation timeout in seconds.
///
/// Five minutes covers several blocks on public testnets.
fn default_confirmation_timeout_seconds() -> u64 {
	300
}

/// Where the contract address registry lives on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
	/// JSON file mapping chain ids to deployed addresses.
	pub path: PathBuf,
}

/// Configuration for the wallet provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of wallet implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the contract transport.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of contract implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Confirmations an entry waits for before it counts as final.
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
}

/// Returns the default number of confirmations.
fn default_confirmations() -> u64 {
	1
}

/// Configuration for the contract event monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
	#[serde(default = "default_monitoring_enabled")]
	pub enabled: bool,
	/// Interval between `eth_getLogs` polls.
	#[serde(default = "default_event_polling_interval_seconds")]
	pub event_polling_interval_seconds: u64,
}

impl Default for MonitoringConfig {
	fn default() -> Self {
		Self {
			enabled: default_monitoring_enabled(),
			event_polling_interval_seconds: default_event_polling_interval_seconds(),
		}
	}
}

fn default_monitoring_enabled() -> bool {
	true
}

fn default_event_polling_interval_seconds() -> u64 {
	3
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with async environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	/// A relative registry path is resolved against the directory of `path`.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		let mut config = loader.load_config(file_name).await?;

		if config.registry.path.is_relative() {
			config.registry.path = base_dir.join(&config.registry.path);
		}
		Ok(config)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.client.id.is_empty() {
			return Err(ConfigError::Validation("Client ID cannot be empty".into()));
		}
		if self.client.confirmation_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"Client confirmation_timeout_seconds must be greater than 0".into(),
			));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (chain_id, network) in &self.networks {
			if network.rpc_url.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have an rpc_url",
					chain_id
				)));
			}
		}

		if self.registry.path.as_os_str().is_empty() {
			return Err(ConfigError::Validation(
				"Registry path cannot be empty".into(),
			));
		}

		validate_primary("wallet", &self.wallet.primary, &self.wallet.implementations)?;
		validate_primary(
			"contract",
			&self.contract.primary,
			&self.contract.implementations,
		)?;
		if self.contract.confirmations == 0 {
			return Err(ConfigError::Validation(
				"Contract confirmations must be greater than 0".into(),
			));
		}

		if self.monitoring.event_polling_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Monitoring event_polling_interval_seconds must be greater than 0".into(),
			));
		}
		if self.monitoring.event_polling_interval_seconds > 3600 {
			return Err(ConfigError::Validation(
				"Monitoring event_polling_interval_seconds cannot exceed 3600 (1 hour)".into(),
			));
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE_CONFIG: &str = r#"
[client]
id = "raffle-test"

[networks.31337]
name = "hardhat"
rpc_url = "http://127.0.0.1:8545"

[networks.5]
name = "goerli"
rpc_url = "https://goerli.example.org"

[registry]
path = "contractAddresses.json"

[wallet]
primary = "local"
[wallet.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
chain_id = 31337

[contract]
primary = "evm_alloy"
[contract.implementations.evm_alloy]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("RAFFLE_TEST_HOST", "localhost");
		std::env::set_var("RAFFLE_TEST_PORT", "8545");

		let input = "rpc_url = \"http://${RAFFLE_TEST_HOST}:${RAFFLE_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "rpc_url = \"http://localhost:8545\"");

		std::env::remove_var("RAFFLE_TEST_HOST");
		std::env::remove_var("RAFFLE_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${RAFFLE_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${RAFFLE_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("RAFFLE_MISSING_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = BASE_CONFIG.parse().unwrap();
		assert_eq!(config.client.confirmation_timeout_seconds, 300);
		assert_eq!(config.client.refresh_interval_seconds, 0);
		assert_eq!(config.contract.confirmations, 1);
		assert!(config.monitoring.enabled);
		assert_eq!(config.monitoring.event_polling_interval_seconds, 3);
		assert_eq!(config.networks.len(), 2);
	}

	#[test]
	fn test_network_deploy_depth_does_not_set_confirmations() {
		// Deployment tooling keeps its own block_confirmations per network.
		let config_str = BASE_CONFIG.replace(
			"rpc_url = \"https://goerli.example.org\"",
			"rpc_url = \"https://goerli.example.org\"\nblock_confirmations = 6",
		);
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.contract.confirmations, 1);

		let config: Config = BASE_CONFIG
			.replace("[contract]\n", "[contract]\nconfirmations = 3\n")
			.parse()
			.unwrap();
		assert_eq!(config.contract.confirmations, 3);
	}

	#[test]
	fn test_missing_primary_rejected() {
		let config_str = BASE_CONFIG.replace("primary = \"evm_alloy\"", "primary = \"missing\"");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary contract 'missing' not found"));
	}

	#[test]
	fn test_empty_networks_rejected() {
		let config_str = r#"
[client]
id = "raffle-test"

[networks]

[registry]
path = "contractAddresses.json"

[wallet]
primary = "local"
[wallet.implementations.local]

[contract]
primary = "simulated"
[contract.implementations.simulated]
"#;
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Networks configuration cannot be empty"));
	}

	#[test]
	fn test_zero_confirmations_rejected() {
		let config_str = BASE_CONFIG.replace("[contract]\n", "[contract]\nconfirmations = 0\n");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Contract confirmations"));
	}

	#[test]
	fn test_polling_interval_bounds() {
		let config_str = format!(
			"{}\n[monitoring]\nevent_polling_interval_seconds = 7200\n",
			BASE_CONFIG
		);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("cannot exceed 3600"));
	}

	#[test]
	fn test_invalid_chain_id_key() {
		let config_str = BASE_CONFIG.replace("[networks.5]", "[networks.goerli]");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
		assert!(err.to_string().contains("Invalid chain_id 'goerli'"));
	}
}
