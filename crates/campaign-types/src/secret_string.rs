//! Redacting string for secrets taken from configuration.
//!
//! Signing keys and upload tokens are held in [`SecretString`], which zeroes
//! its memory on drop and never prints its contents.

use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "<redacted>";

#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(value: impl Into<String>) -> Self {
		Self(Zeroizing::new(value.into()))
	}

	/// Hands the secret to `use_secret`; the borrow cannot outlive the call.
	pub fn with_exposed<F, R>(&self, use_secret: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		use_secret(self.0.as_str())
	}

	/// True for empty and whitespace-only secrets.
	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
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
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
