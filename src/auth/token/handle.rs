//! Lazily read bearer token handles.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret, error::ConfigError};

type SecretSource = dyn Fn() -> TokenSecret + Send + Sync;

/// Opaque bearer credential.
///
/// The handle stores a reader rather than the secret itself; every [`Token::read`] yields a
/// fresh [`TokenSecret`] that is zeroized as soon as the caller drops it. Cloning a handle is
/// cheap and clones share the same reader.
#[derive(Clone)]
pub struct Token(Arc<SecretSource>);
impl Token {
	/// Wraps a fixed secret value.
	pub fn new(secret: impl Into<String>) -> Self {
		let secret = Arc::new(TokenSecret::new(secret));

		Self(Arc::new(move || TokenSecret::clone(&secret)))
	}

	/// Wraps a reader that produces the secret on demand (keychain, vault, env).
	pub fn from_fn<F>(reader: F) -> Self
	where
		F: 'static + Send + Sync + Fn() -> TokenSecret,
	{
		Self(Arc::new(reader))
	}

	/// Reads the secret from the named environment variable on every access.
	///
	/// Fails up front when the variable is unset so misconfiguration surfaces at startup.
	pub fn from_env(name: impl Into<String>) -> Result<Self, ConfigError> {
		let name = name.into();

		if std::env::var(&name).is_err() {
			return Err(ConfigError::MissingEnv { name });
		}

		Ok(Self::from_fn(move || TokenSecret::new(std::env::var(&name).unwrap_or_default())))
	}

	/// Produces the secret. Keep the returned value short-lived.
	pub fn read(&self) -> TokenSecret {
		(self.0)()
	}

	/// Builds the sensitive `authorization: Bearer` header value.
	pub fn bearer_header(&self) -> Result<HeaderValue, ConfigError> {
		self.read().bearer_header()
	}

	/// Returns `true` when both handles share the same reader.
	pub fn same_handle(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Token(<redacted>)")
	}
}
impl From<TokenSecret> for Token {
	fn from(secret: TokenSecret) -> Self {
		let secret = Arc::new(secret);

		Self(Arc::new(move || TokenSecret::clone(&secret)))
	}
}
