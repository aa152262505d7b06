//! Registry of deployed raffle contracts.
//!
//! The registry file is written by the deployment tooling and read once at
//! start-up. It maps a chain id (as a decimal string, since JSON object keys
//! are strings) to every raffle address deployed on that chain, oldest first:
//!
//! ```json
//! {"31337":["0x5FbDB2315678afecb367f032d93F642f64180aa3"]}
//! ```
//!
//! The first address of a chain is the canonical deployment.

use crate::ChainId;
use alloy_primitives::Address;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading or writing the registry file.
#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Malformed registry JSON: {0}")]
	Json(String),
	#[error("Invalid chain id '{0}'")]
	InvalidChainId(String),
	#[error("Invalid address '{address}' for chain {chain_id}")]
	InvalidAddress { chain_id: ChainId, address: String },
}

/// Deployed contract addresses keyed by chain id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractAddressRegistry {
	deployments: BTreeMap<ChainId, Vec<Address>>,
}

impl ContractAddressRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses the registry from its JSON representation.
	pub fn from_json(json: &str) -> Result<Self, RegistryError> {
		let raw: HashMap<String, Vec<String>> =
			serde_json::from_str(json).map_err(|e| RegistryError::Json(e.to_string()))?;

		let mut deployments = BTreeMap::new();
		for (key, addresses) in raw {
			let chain_id = key
				.trim()
				.parse::<ChainId>()
				.map_err(|_| RegistryError::InvalidChainId(key.clone()))?;

			let parsed = addresses
				.iter()
				.map(|address| {
					Address::from_str(address.trim()).map_err(|_| RegistryError::InvalidAddress {
						chain_id,
						address: address.clone(),
					})
				})
				.collect::<Result<Vec<_>, _>>()?;

			deployments.insert(chain_id, parsed);
		}

		Ok(Self { deployments })
	}

	/// Loads the registry from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
		let content = std::fs::read_to_string(path)?;
		Self::from_json(&content)
	}

	/// Loads the registry, treating a missing file as an empty registry.
	///
	/// Used when recording the very first deployment.
	pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
		match std::fs::read_to_string(path) {
			Ok(content) => Self::from_json(&content),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
			Err(e) => Err(e.into()),
		}
	}

	/// Returns the canonical (first) address deployed on `chain_id`.
	///
	/// A chain that is listed with an empty address list counts as unsupported.
	pub fn canonical(&self, chain_id: ChainId) -> Option<Address> {
		self.deployments
			.get(&chain_id)
			.and_then(|addresses| addresses.first().copied())
	}

	/// All addresses deployed on `chain_id`, oldest first.
	pub fn addresses(&self, chain_id: ChainId) -> &[Address] {
		self.deployments
			.get(&chain_id)
			.map(Vec::as_slice)
			.unwrap_or_default()
	}

	/// Chain ids with at least one deployment.
	pub fn supported_chains(&self) -> Vec<ChainId> {
		self.deployments
			.iter()
			.filter(|(_, addresses)| !addresses.is_empty())
			.map(|(chain_id, _)| *chain_id)
			.collect()
	}

	pub fn is_empty(&self) -> bool {
		self.supported_chains().is_empty()
	}

	/// Records a new deployment.
	///
	/// The address is appended to the chain's list unless it is already
	/// present, so the canonical address never changes once recorded.
	/// Returns `true` when the registry changed.
	pub fn record_deployment(&mut self, chain_id: ChainId, address: Address) -> bool {
		let addresses = self.deployments.entry(chain_id).or_default();
		if addresses.contains(&address) {
			return false;
		}
		addresses.push(address);
		true
	}

	/// Serializes the registry with checksummed addresses.
	pub fn to_json(&self) -> Result<String, RegistryError> {
		let raw: BTreeMap<String, Vec<String>> = self
			.deployments
			.iter()
			.map(|(chain_id, addresses)| {
				(
					chain_id.to_string(),
					addresses
						.iter()
						.map(|address| address.to_checksum(None))
						.collect(),
				)
			})
			.collect();

		serde_json::to_string(&raw).map_err(|e| RegistryError::Json(e.to_string()))
	}

	/// Writes the registry to a file, replacing its content.
	pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
		std::fs::write(path, self.to_json()?)?;
		Ok(())
	}
}
