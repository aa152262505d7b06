//! Network configuration types.
//!
//! Each supported chain gets an RPC endpoint and an optional display name.

use crate::ChainId;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Configuration for a single blockchain network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// Human readable name, e.g. "hardhat" or "goerli".
	#[serde(default)]
	pub name: Option<String>,
	/// HTTP(S) JSON-RPC endpoint.
	pub rpc_url: String,
}

/// Networks keyed by chain id.
pub type NetworksConfig = HashMap<ChainId, NetworkConfig>;

/// Deserializes a networks table whose keys are chain ids written as strings.
///
/// TOML table keys are always strings, so `[networks.31337]` arrives as
/// `"31337"` and is converted here.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	let mut result = HashMap::new();

	for (key, value) in string_map {
		let chain_id = key
			.parse::<ChainId>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))?;
		result.insert(chain_id, value);
	}

	Ok(result)
}
