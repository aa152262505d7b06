//! Chain to contract address resolution.

use alloy_primitives::Address;
use raffle_types::{ChainId, ContractAddressRegistry};
use std::fmt;
use std::sync::Arc;

/// Outcome of resolving the wallet's chain against the address registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	/// A raffle is deployed on the chain.
	Deployed { chain_id: ChainId, address: Address },
	/// No raffle on this chain, or no chain at all while disconnected.
	UnsupportedNetwork { chain_id: Option<ChainId> },
}

impl Resolution {
	pub fn address(&self) -> Option<Address> {
		match self {
			Self::Deployed { address, .. } => Some(*address),
			Self::UnsupportedNetwork { .. } => None,
		}
	}

	pub fn chain_id(&self) -> Option<ChainId> {
		match self {
			Self::Deployed { chain_id, .. } => Some(*chain_id),
			Self::UnsupportedNetwork { chain_id } => *chain_id,
		}
	}

	pub fn is_supported(&self) -> bool {
		matches!(self, Self::Deployed { .. })
	}
}

impl fmt::Display for Resolution {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Deployed { chain_id, address } => {
				write!(f, "raffle {} on chain {}", address, chain_id)
			},
			Self::UnsupportedNetwork {
				chain_id: Some(chain_id),
			} => write!(f, "no raffle deployed on chain {}", chain_id),
			Self::UnsupportedNetwork { chain_id: None } => f.write_str("no network connected"),
		}
	}
}

/// Maps chain ids to the canonical raffle deployment.
///
/// Resolution is a pure lookup: it never fails and never touches the network.
#[derive(Debug, Clone)]
pub struct AddressResolver {
	registry: Arc<ContractAddressRegistry>,
}

impl AddressResolver {
	pub fn new(registry: ContractAddressRegistry) -> Self {
		Self {
			registry: Arc::new(registry),
		}
	}

	pub fn resolve(&self, chain_id: Option<ChainId>) -> Resolution {
		match chain_id.and_then(|id| self.registry.canonical(id).map(|address| (id, address))) {
			Some((chain_id, address)) => Resolution::Deployed { chain_id, address },
			None => Resolution::UnsupportedNetwork { chain_id },
		}
	}

	/// Chains the registry knows a deployment for.
	pub fn supported_chains(&self) -> Vec<ChainId> {
		self.registry.supported_chains()
	}

	pub fn registry(&self) -> &ContractAddressRegistry {
		&self.registry
	}
}
