//! Self-registration of pluggable implementations.

/// Ties an implementation to the name it is selected by in configuration.
///
/// Each wallet and contract implementation module provides a `Registry` type
/// implementing this trait, so the binary can build its factory maps without
/// naming every implementation by hand.
pub trait ImplementationRegistry {
	/// Key under `<section>.implementations` in the TOML configuration,
	/// e.g. "local" for `wallet.implementations.local`.
	const NAME: &'static str;

	/// Factory function type of the component this implementation belongs to.
	type Factory;

	fn factory() -> Self::Factory;
}
