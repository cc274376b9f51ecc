//! Client facade over one [`Dispatcher`].

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Token, TokenResolver},
	config::ClientConfig,
	dispatch::{Dispatcher, Entries, RequestSpec, ResponseMapper},
	error::ConfigError,
	flows::{LoopbackListener, PendingAuthorization, PkceFlow, RedirectListener},
	http::HttpTransport,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Entry point for API calls, scope queries, token revocation, and PKCE authorization.
///
/// Cloning is cheap; clones share the dispatcher and therefore its throttle state.
#[derive(Clone, Debug)]
pub struct Client {
	dispatcher: Arc<Dispatcher>,
}
impl Client {
	/// Creates a client over a caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		resolver: Option<TokenResolver>,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		let dispatcher = Dispatcher::new(config, transport, resolver)?;

		Ok(Self { dispatcher: Arc::new(dispatcher) })
	}

	/// Returns a client that uses `resolver` for token selection.
	///
	/// The new client shares this client's transport and configuration but starts with its
	/// own throttle state.
	pub fn with_resolver(&self, resolver: TokenResolver) -> Result<Self, ConfigError> {
		Self::with_transport(
			self.dispatcher.config().clone(),
			Some(resolver),
			self.dispatcher.transport().clone(),
		)
	}

	/// Underlying dispatcher.
	pub fn dispatcher(&self) -> &Arc<Dispatcher> {
		&self.dispatcher
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		self.dispatcher.config()
	}

	/// Stops accepting requests. Queued and later dispatches fail with [`Error::Closed`];
	/// responses already received keep streaming.
	pub fn close(&self) {
		self.dispatcher.close();
	}

	/// Sends `spec` and maps the response through `mapper`.
	pub async fn dispatch<M>(&self, spec: &RequestSpec, mapper: M) -> Result<Entries<M::Item>>
	where
		M: ResponseMapper,
	{
		self.dispatcher.dispatch(spec, mapper).await
	}

	/// Scopes granted to `token`; empty when introspection fails.
	pub async fn scopes(&self, token: &Token) -> ScopeSet {
		self.dispatcher.fetch_scopes(token).await
	}

	/// Introspects every pooled token now instead of on the first scoped request.
	pub async fn resolve_scopes(&self) {
		self.dispatcher.resolve_scopes().await
	}

	/// Revokes `token`.
	pub async fn revoke_token(&self, token: &Token) -> Result<()> {
		self.dispatcher.revoke(token).await
	}

	/// PKCE flow builder for `client_id`.
	pub fn pkce(&self, client_id: impl Into<String>) -> PkceFlow {
		PkceFlow::new(self.dispatcher.clone(), client_id)
	}

	/// Starts a PKCE authorization on a fresh loopback listener.
	pub async fn authorize(
		&self,
		client_id: impl Into<String>,
		scopes: ScopeSet,
	) -> Result<PendingAuthorization> {
		let listener = LoopbackListener::bind().await?;

		self.authorize_with(client_id, scopes, listener)
	}

	/// Starts a PKCE authorization on a caller-provided listener.
	pub fn authorize_with<L>(
		&self,
		client_id: impl Into<String>,
		scopes: ScopeSet,
		listener: L,
	) -> Result<PendingAuthorization>
	where
		L: RedirectListener,
	{
		self.pkce(client_id).initiate(listener, scopes)
	}
}
#[cfg(feature = "reqwest")]
impl Client {
	/// Creates a client on the default reqwest transport.
	pub fn new(config: ClientConfig, resolver: Option<TokenResolver>) -> Result<Self, ConfigError> {
		Self::with_transport(config, resolver, Arc::new(ReqwestTransport::new()?))
	}

	/// Anonymous client with the default configuration.
	pub fn basic() -> Result<Self, ConfigError> {
		Self::new(ClientConfig::default(), None)
	}
}
