//! Token secret wrapper that redacts and zeroizes sensitive material.

// crates.io
use secrecy::{ExposeSecret, SecretString, zeroize::Zeroizing};
// self
use crate::_prelude::*;

/// Redacted bearer secret, wiped from memory when dropped.
#[derive(Clone)]
pub struct TokenSecret(SecretString);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(SecretString::from(value.into()))
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		self.0.expose_secret()
	}

	/// Renders the `authorization` header value for this secret.
	pub fn bearer_header(&self) -> Result<HeaderValue, crate::error::ConfigError> {
		let rendered = self.bearer_value();
		let mut value = HeaderValue::from_str(&rendered)
			.map_err(|_| crate::error::ConfigError::InvalidToken)?;

		value.set_sensitive(true);

		Ok(value)
	}

	// Scratch buffer is wiped on drop; only the sensitive header keeps a copy.
	fn bearer_value(&self) -> Zeroizing<String> {
		let token = self.expose();
		let mut rendered = Zeroizing::new(String::with_capacity("Bearer ".len() + token.len()));

		rendered.push_str("Bearer ");
		rendered.push_str(token);

		rendered
	}
}
impl PartialEq for TokenSecret {
	fn eq(&self, other: &Self) -> bool {
		self.expose() == other.expose()
	}
}
impl Eq for TokenSecret {}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
