//! Private key holder.
//!
//! Keys come from configuration (usually through `${PRIVATE_KEY}`) and are
//! handed to the wallet and the contract transports. The buffer is wiped on
//! drop and the value is redacted wherever it could be printed.

use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// Secret text, wiped on drop.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Runs `f` on the plain value.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		f(&self.0)
	}

	/// Plain value. Never log it.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	/// Whether this looks like a 32-byte hex secp256k1 key, `0x` optional.
	pub fn is_hex_private_key(&self) -> bool {
		let key = crate::without_0x_prefix(self.0.trim());
		key.len() == 64 && key.bytes().all(|b| b.is_ascii_hexdigit())
	}

	/// The key trimmed and `0x` prefixed, the form signers and RPC tooling expect.
	pub fn to_prefixed_key(&self) -> SecretString {
		SecretString::new(crate::with_0x_prefix(self.0.trim()))
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SecretString").field(&REDACTED).finish()
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_owned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[test]
	fn test_key_never_printed() {
		let key = SecretString::from(HARDHAT_KEY);
		assert!(!format!("{:?}", key).contains("ac0974"));
		assert_eq!(key.to_string(), REDACTED);
	}

	#[test]
	fn test_key_shape_and_prefix() {
		let bare = SecretString::from(&HARDHAT_KEY[2..]);
		assert!(bare.is_hex_private_key());
		assert_eq!(bare.to_prefixed_key().expose_secret(), HARDHAT_KEY);
		assert_eq!(
			SecretString::from(" 0xab ").to_prefixed_key().with_exposed(str::len),
			4
		);

		assert!(!SecretString::from("0x1234").is_hex_private_key());
		assert!(!SecretString::from("${PRIVATE_KEY}").is_hex_private_key());
	}
}
