//! Tokens minted by the authorization flow.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenResolver, token::handle::Token},
};

/// Bearer token returned by a completed PKCE exchange.
#[derive(Clone)]
pub struct AuthorizedToken {
	/// Handle for the access token.
	pub token: Token,
	/// Scopes the token endpoint reported as granted (falls back to the requested set).
	pub scopes: ScopeSet,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
	/// Expiry instant when the token endpoint reported `expires_in`.
	pub expires_at: Option<OffsetDateTime>,
}
impl AuthorizedToken {
	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Wraps the token in a [`TokenResolver::Single`] strategy.
	pub fn into_resolver(self) -> TokenResolver {
		TokenResolver::Single(self.token)
	}
}
impl Debug for AuthorizedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizedToken")
			.field("token", &"<redacted>")
			.field("scopes", &self.scopes)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
