//! Interactive Authorization Code + PKCE flow over a redirect listener.
//!
//! [`PkceFlow::initiate`] returns a [`PendingAuthorization`] immediately; a background task
//! waits for exactly one redirect, validates it, answers the browser, stops the listener,
//! and redeems the code. Whatever ends the attempt (success, failure, timeout, or the
//! caller dropping the handle) stops the listener exactly once.

pub mod listener;
/// Verifier, challenge, state, and authorization URL for one attempt.
pub mod session;

pub use listener::*;
pub use session::*;

// crates.io
use tokio::{sync::oneshot, time};
// self
use crate::{
	_prelude::*,
	auth::{AuthorizedToken, ScopeSet},
	config::HostClass,
	dispatch::Dispatcher,
	error::AuthorizationError,
	oauth::CodeExchange,
	obs::{self, CallKind, CallOutcome, CallSpan},
};

/// Observable progress of one authorization attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationState {
	/// Created but not started.
	Idle,
	/// Waiting for the browser redirect.
	AwaitingRedirect,
	/// Code redeemed for a token.
	Succeeded,
	/// Ended with the given error message.
	Failed(String),
	/// No redirect arrived in time.
	TimedOut,
}
impl AuthorizationState {
	/// Whether the attempt has ended.
	pub fn is_terminal(&self) -> bool {
		!matches!(self, Self::Idle | Self::AwaitingRedirect)
	}
}

/// Handle to an authorization attempt in progress.
///
/// Dropping it abandons the attempt and stops the listener.
#[derive(Debug)]
pub struct PendingAuthorization {
	authorize_url: Url,
	state: Arc<Mutex<AuthorizationState>>,
	receiver: oneshot::Receiver<Result<AuthorizedToken>>,
}
impl PendingAuthorization {
	/// URL the user must open to grant access.
	pub fn authorize_url(&self) -> &Url {
		&self.authorize_url
	}

	/// Current state of the attempt.
	pub fn state(&self) -> AuthorizationState {
		self.state.lock().clone()
	}

	/// Waits for the attempt to finish.
	pub async fn wait(self) -> Result<AuthorizedToken> {
		self.receiver.await.unwrap_or_else(|_| Err(AuthorizationError::Abandoned.into()))
	}
}

/// Builder for PKCE authorization attempts against the API host.
#[derive(Clone, Debug)]
pub struct PkceFlow {
	dispatcher: Arc<Dispatcher>,
	client_id: String,
	timeout: Duration,
	success_page: String,
}
impl PkceFlow {
	/// Creates a flow for `client_id`, taking the timeout and success page from the
	/// dispatcher's configuration.
	pub fn new(dispatcher: Arc<Dispatcher>, client_id: impl Into<String>) -> Self {
		let timeout = dispatcher.config().pkce_timeout;
		let success_page = dispatcher.config().success_page.clone();

		Self { dispatcher, client_id: client_id.into(), timeout, success_page }
	}

	/// Overrides how long to wait for the redirect.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the page shown after a successful redirect.
	pub fn with_success_page(mut self, page: impl Into<String>) -> Self {
		self.success_page = page.into();

		self
	}

	/// Starts an attempt requesting `scopes` and returns without waiting for the user.
	///
	/// Must be called from within a Tokio runtime; the redirect is handled on a spawned task.
	pub fn initiate<L>(&self, listener: L, scopes: ScopeSet) -> Result<PendingAuthorization>
	where
		L: RedirectListener,
	{
		let authorize_endpoint = self.dispatcher.endpoint(HostClass::Api, "/oauth", &[])?;
		let exchange = CodeExchange::new(self.dispatcher.clone(), &self.client_id)?;
		let session = PkceSession::new(
			authorize_endpoint,
			self.client_id.clone(),
			scopes,
			listener.redirect_uri().clone(),
		);
		let authorize_url = session.authorize_url.clone();
		let state = Arc::new(Mutex::new(AuthorizationState::AwaitingRedirect));
		let (tx, receiver) = oneshot::channel();
		let attempt = Attempt {
			listener,
			session,
			exchange,
			timeout: self.timeout,
			success_page: self.success_page.clone(),
			state: state.clone(),
		};
		let span = CallSpan::new(CallKind::Authorization, "pkce");

		obs::record_call_outcome(CallKind::Authorization, CallOutcome::Attempt);
		tracing::info!(
			scopes = %attempt.session.scopes,
			timeout = ?attempt.timeout,
			"Awaiting authorization redirect."
		);
		tokio::spawn(span.instrument(attempt.run(tx)));

		Ok(PendingAuthorization { authorize_url, state, receiver })
	}
}

enum Wake {
	Redirect(Result<RedirectRequest, AuthorizationError>),
	TimedOut,
	Abandoned,
}

struct Attempt<L> {
	listener: L,
	session: PkceSession,
	exchange: CodeExchange,
	timeout: Duration,
	success_page: String,
	state: Arc<Mutex<AuthorizationState>>,
}
impl<L> Attempt<L>
where
	L: RedirectListener,
{
	async fn run(mut self, mut tx: oneshot::Sender<Result<AuthorizedToken>>) {
		let wake = tokio::select! {
			redirect = self.listener.accept() => Wake::Redirect(redirect),
			_ = time::sleep(self.timeout) => Wake::TimedOut,
			_ = tx.closed() => Wake::Abandoned,
		};
		let result = match wake {
			Wake::Redirect(Ok(request)) => self.complete(request).await,
			Wake::Redirect(Err(e)) => {
				self.listener.stop();

				Err(e.into())
			},
			Wake::TimedOut => {
				self.listener.stop();

				Err(AuthorizationError::TimedOut { timeout: self.timeout }.into())
			},
			Wake::Abandoned => {
				self.listener.stop();

				Err(AuthorizationError::Abandoned.into())
			},
		};

		self.finish(&result);

		// Nobody is listening once the handle is dropped.
		let _ = tx.send(result);
	}

	async fn complete(&mut self, mut request: RedirectRequest) -> Result<AuthorizedToken> {
		let Some(code) = request.param("code").map(str::to_owned) else {
			let error = request.param("error").map(str::to_owned);
			let description = request.param("error_description").map(str::to_owned);
			let err = AuthorizationError::MissingCode { error, description };

			request.respond(RedirectReply::error(StatusCode::BAD_REQUEST, &err.to_string()));
			self.listener.stop();

			return Err(err.into());
		};

		if let Err(e) = self.session.validate_state(request.param("state")) {
			tracing::warn!("Authorization redirect carried an unexpected state; ignoring code.");

			request.respond(RedirectReply::error(StatusCode::BAD_REQUEST, &e.to_string()));
			self.listener.stop();

			return Err(e.into());
		}

		request.respond(RedirectReply::success(self.success_page.clone()));
		self.listener.stop();

		self.exchange
			.exchange(&code, self.session.verifier(), &self.session.redirect_uri, &self.session.scopes)
			.await
	}

	fn finish(&self, result: &Result<AuthorizedToken>) {
		let next = match result {
			Ok(_) => AuthorizationState::Succeeded,
			Err(Error::Authorization(AuthorizationError::TimedOut { .. })) =>
				AuthorizationState::TimedOut,
			Err(Error::Authorization(AuthorizationError::Abandoned)) =>
				AuthorizationState::Failed("abandoned".into()),
			Err(e) => AuthorizationState::Failed(e.to_string()),
		};

		match &next {
			AuthorizationState::Succeeded => tracing::info!("Authorization succeeded."),
			other => tracing::warn!(state = ?other, "Authorization did not complete."),
		}

		*self.state.lock() = next;

		obs::record_call_outcome(CallKind::Authorization, CallOutcome::of(result));
	}
}
