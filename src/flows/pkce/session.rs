// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::ScopeSet, error::AuthorizationError};

const STATE_BYTES: usize = 16;
const VERIFIER_BYTES: usize = 32;

/// Supported PKCE challenge methods surfaced via [`PkceSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Verifier/challenge pair for one authorization attempt.
pub struct PkcePair {
	verifier: SecretString,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	/// Generates a fresh verifier from 32 random bytes and its S256 challenge.
	pub fn generate() -> Self {
		Self::from_verifier(random_token(VERIFIER_BYTES))
	}

	fn from_verifier(verifier: String) -> Self {
		let challenge = compute_pkce_challenge(&verifier);

		Self {
			verifier: SecretString::from(verifier),
			challenge,
			method: PkceCodeChallengeMethod::S256,
		}
	}

	/// Secret verifier sent with the code exchange. Callers must avoid logging it.
	pub fn verifier(&self) -> &str {
		self.verifier.expose_secret()
	}

	/// Challenge sent with the authorization request.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (currently always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		self.method
	}
}
impl Debug for PkcePair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkcePair")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Authorization Code + PKCE handshake metadata for one attempt.
pub struct PkceSession {
	/// OAuth client identifier.
	pub client_id: String,
	/// Requested scope set.
	pub scopes: ScopeSet,
	/// Opaque state value that must round-trip via the redirect.
	pub state: String,
	/// Loopback redirect URI.
	pub redirect_uri: Url,
	/// Authorization URL the user opens in a browser.
	pub authorize_url: Url,
	pkce: PkcePair,
}
impl PkceSession {
	/// Generates verifier, challenge, and state, then builds the authorization URL from
	/// `authorize_endpoint` (normally `{api}/oauth`).
	pub fn new(
		authorize_endpoint: Url,
		client_id: impl Into<String>,
		scopes: ScopeSet,
		redirect_uri: Url,
	) -> Self {
		let client_id = client_id.into();
		let state = random_token(STATE_BYTES);
		let pkce = PkcePair::generate();
		let authorize_url =
			build_authorize_url(authorize_endpoint, &client_id, &redirect_uri, &scopes, &state, &pkce);

		Self { client_id, scopes, state, redirect_uri, authorize_url, pkce }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		self.pkce.challenge()
	}

	/// PKCE challenge method.
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method()
	}

	/// Validates the `state` parameter returned with the redirect.
	pub fn validate_state(&self, returned_state: Option<&str>) -> Result<(), AuthorizationError> {
		if returned_state == Some(self.state.as_str()) {
			Ok(())
		} else {
			Err(AuthorizationError::StateMismatch)
		}
	}

	pub(crate) fn verifier(&self) -> &str {
		self.pkce.verifier()
	}
}
impl Debug for PkceSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceSession")
			.field("client_id", &self.client_id)
			.field("scopes", &self.scopes)
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

fn build_authorize_url(
	mut url: Url,
	client_id: &str,
	redirect_uri: &Url,
	scopes: &ScopeSet,
	state: &str,
	pkce: &PkcePair,
) -> Url {
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("code_challenge_method", pkce.method.as_str());
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());
	pairs.append_pair("scope", &scopes.normalized());
	pairs.append_pair("state", state);

	drop(pairs);

	url
}

fn random_token(len: usize) -> String {
	let mut bytes = vec![0_u8; len];

	rand::rng().fill_bytes(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(verifier.as_bytes());
	let digest = hasher.finalize();
	URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::Scope;

	fn session() -> PkceSession {
		PkceSession::new(
			Url::parse("https://lichess.org/oauth").expect("Authorize endpoint should parse."),
			"example-app",
			ScopeSet::from([Scope::BoardPlay, Scope::EmailRead]),
			Url::parse("http://127.0.0.1:8123/").expect("Redirect fixture should parse."),
		)
	}

	#[test]
	fn challenge_matches_rfc7636_vector() {
		let pair = PkcePair::from_verifier("dBjftJeZ4CVP-mJ92K27uhbUJU1p1r_wW1gFWFOEjXk".into());

		assert_eq!(pair.challenge(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
		assert_eq!(pair.method().as_str(), "S256");
	}

	#[test]
	fn generated_values_use_unpadded_url_safe_alphabet() {
		let first = PkcePair::generate();
		let second = PkcePair::generate();
		let session = session();
		let url_safe = |value: &str| {
			value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
		};

		assert_eq!(first.verifier().len(), 43);
		assert_eq!(first.challenge().len(), 43);
		assert!(url_safe(first.verifier()) && url_safe(first.challenge()));
		assert_ne!(first.verifier(), second.verifier());
		assert_ne!(first.challenge(), second.challenge());
		assert_eq!(session.state.len(), 22);
		assert!(url_safe(&session.state));
	}

	#[test]
	fn authorize_url_lists_parameters_in_order() {
		let session = session();
		let keys = session.authorize_url.query_pairs().map(|(k, _)| k.into_owned()).collect::<Vec<_>>();
		let params = session.authorize_url.query_pairs().into_owned().collect::<HashMap<_, _>>();

		assert_eq!(session.authorize_url.path(), "/oauth");
		assert_eq!(keys, [
			"code_challenge_method",
			"code_challenge",
			"response_type",
			"client_id",
			"redirect_uri",
			"scope",
			"state"
		]);
		assert_eq!(params["code_challenge"], session.code_challenge());
		assert_eq!(params["scope"], "email:read board:play");
		assert_eq!(params["redirect_uri"], "http://127.0.0.1:8123/");
		assert_eq!(params["state"], session.state);
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let session = session();

		assert!(session.validate_state(Some(&session.state)).is_ok());
		assert!(matches!(
			session.validate_state(Some("other")),
			Err(AuthorizationError::StateMismatch)
		));
		assert!(matches!(session.validate_state(None), Err(AuthorizationError::StateMismatch)));
	}

	#[test]
	fn debug_hides_verifier() {
		let session = session();

		assert!(!format!("{session:?}").contains(session.verifier()));
	}
}
