//! Single chokepoint for outbound API calls.
//!
//! [`Dispatcher`] attaches the bearer token a [`RequestSpec`] needs, draws a capacity slot,
//! waits out spacing and any active rate-limit cooldown, sends through the configured
//! [`HttpTransport`], and turns the response into a lazy [`Entries`] sequence. A `429` is
//! retried exactly once after the cooldown; every other failure surfaces untouched.
//!
//! Request timeouts bound the wait for the response head only. Bodies are mapped line by
//! line as they arrive, so slow exports never lose the lines already received.

pub mod entries;
pub mod spec;

mod throttle;

pub use entries::*;
pub use spec::*;

pub(crate) use throttle::{Lane, Slot};

// crates.io
use oauth2::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use tokio::time::{self, Instant};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Token, TokenResolver},
	config::{ClientConfig, HostClass},
	dispatch::throttle::ThrottleState,
	error::{ApiError, ConfigError, TransportError},
	http::{HttpTransport, TransportRequest, TransportResponse},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

const SCOPES_HEADER: &str = "x-oauth-scopes";

/// Rate-limit aware request sender shared by every call a client makes.
pub struct Dispatcher {
	config: Arc<ClientConfig>,
	transport: Arc<dyn HttpTransport>,
	resolver: Option<TokenResolver>,
	throttle: ThrottleState,
	user_agent: HeaderValue,
}
impl Dispatcher {
	/// Validates `config` and builds a dispatcher over `transport`.
	pub fn new(
		config: ClientConfig,
		transport: Arc<dyn HttpTransport>,
		resolver: Option<TokenResolver>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let user_agent = HeaderValue::from_str(&config.user_agent)
			.map_err(|_| ConfigError::InvalidHeader { name: USER_AGENT.to_string() })?;
		let throttle = ThrottleState::new(config.throttle.clone());

		Ok(Self { config: Arc::new(config), transport, resolver, throttle, user_agent })
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Transport shared with any sibling dispatcher.
	pub fn transport(&self) -> &Arc<dyn HttpTransport> {
		&self.transport
	}

	pub(crate) fn user_agent(&self) -> &HeaderValue {
		&self.user_agent
	}

	/// Token resolution strategy, if one was configured.
	pub fn resolver(&self) -> Option<&TokenResolver> {
		self.resolver.as_ref()
	}

	/// Sends `spec` and maps the response through `mapper`.
	///
	/// Buffered requests release their capacity slot once the body is read; streaming
	/// requests hold it until the returned [`Entries`] is exhausted or dropped.
	pub async fn dispatch<M>(&self, spec: &RequestSpec, mapper: M) -> Result<Entries<M::Item>>
	where
		M: ResponseMapper,
	{
		let kind = if spec.is_stream() { CallKind::Stream } else { CallKind::Dispatch };
		let span = CallSpan::new(kind, "dispatch");

		obs::record_call_outcome(kind, CallOutcome::Attempt);

		let result = span.instrument(self.dispatch_inner(spec, mapper)).await;

		obs::record_call_outcome(kind, CallOutcome::of(&result));

		result
	}

	/// Introspects the scopes granted to `token` via `HEAD /api/account`.
	///
	/// Failures are logged and yield an empty set.
	pub async fn fetch_scopes(&self, token: &Token) -> ScopeSet {
		let span = CallSpan::new(CallKind::Introspection, "fetch_scopes");

		obs::record_call_outcome(CallKind::Introspection, CallOutcome::Attempt);

		let result = span.instrument(self.introspect(token)).await;

		obs::record_call_outcome(CallKind::Introspection, CallOutcome::of(&result));

		match result {
			Ok(scopes) => scopes,
			Err(e) => {
				tracing::warn!(error = %e, "Scope introspection failed; treating token as unscoped.");

				ScopeSet::default()
			},
		}
	}

	/// Runs pooled scope resolution now instead of on the first scoped request.
	pub async fn resolve_scopes(&self) {
		if let Some(resolver) = &self.resolver {
			resolver.resolve(self).await;
		}
	}

	/// Revokes `token` via `DELETE /api/token`.
	pub async fn revoke(&self, token: &Token) -> Result<()> {
		let span = CallSpan::new(CallKind::Revocation, "revoke");

		obs::record_call_outcome(CallKind::Revocation, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let request = self.authorized_request(Method::DELETE, "/api/token", token)?;
				let (response, slot) = self.send(request, Lane::Regular).await?;

				ensure_success(response, slot).await.map(|_| ())
			})
			.await;

		obs::record_call_outcome(CallKind::Revocation, CallOutcome::of(&result));

		result
	}

	/// Closes the capacity pools. Waiting and later requests fail with [`Error::Closed`];
	/// requests already sent finish normally.
	pub fn close(&self) {
		self.throttle.close();
	}

	/// Joins `path` and `query` onto the base URL of `host`.
	pub fn endpoint(
		&self,
		host: HostClass,
		path: &str,
		query: &[(String, String)],
	) -> Result<Url, ConfigError> {
		let base = self.config.hosts.url_for(host).as_str().trim_end_matches('/');
		let path = path.trim_start_matches('/');
		let mut url = Url::parse(&format!("{base}/{path}"))
			.map_err(|source| ConfigError::InvalidUrl { source })?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query);
		}

		Ok(url)
	}

	/// Sends `request` through the throttle, retrying once on `429`.
	///
	/// The slot is returned alongside the response so callers decide when capacity goes
	/// back to the pool.
	pub(crate) async fn send(
		&self,
		request: TransportRequest,
		lane: Lane,
	) -> Result<(TransportResponse, Slot)> {
		let slot = self.throttle.acquire(lane).await?;

		self.throttle.pass_gate().await;

		let response = self.execute(request.clone()).await?;

		if response.status != StatusCode::TOO_MANY_REQUESTS {
			return Ok((response, slot));
		}

		drop(response);

		tracing::warn!(
			method = %request.method,
			url = %request.url,
			cooldown = ?self.throttle.config().cooldown,
			"Rate limited; retrying once after the cooldown."
		);

		self.throttle.mark_throttled(Instant::now()).await;
		self.throttle.pass_gate().await;

		let response = self.execute(request).await?;

		if response.status == StatusCode::TOO_MANY_REQUESTS {
			tracing::warn!("Retry was rate limited as well; giving up.");

			self.throttle.mark_throttled(Instant::now()).await;
		}

		Ok((response, slot))
	}

	async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
		let Some(timeout) = request.timeout else {
			return Ok(self.transport.execute(request).await?);
		};

		match time::timeout(timeout, self.transport.execute(request)).await {
			Ok(response) => Ok(response?),
			Err(_) => Err(TransportError::TimedOut { timeout }.into()),
		}
	}

	async fn dispatch_inner<M>(&self, spec: &RequestSpec, mapper: M) -> Result<Entries<M::Item>>
	where
		M: ResponseMapper,
	{
		let token = match (spec.scope(), &self.resolver) {
			(Some(scope), Some(resolver)) => {
				resolver.resolve(self).await;

				let token = resolver.token_for(scope);

				if token.is_none() {
					tracing::debug!(scope = %scope, "No token for scope; sending unauthenticated.");
				}

				token
			},
			_ => None,
		};
		let request = self.build_request(spec, token.as_ref())?;
		let lane = if spec.is_stream() { Lane::Stream } else { Lane::Regular };
		let (response, slot) = self.send(request, lane).await?;

		if !response.status.is_success() {
			let status = response.status;
			let body = response.read_text().await;

			drop(slot);

			let error = mapper.map_failure(status, &body?);

			return Err(Error::Http { status: status.as_u16(), error });
		}
		if spec.is_stream() {
			return Ok(entries::map_lines(response.body, mapper, slot));
		}

		// Finite bodies give their slot back as soon as the head arrives.
		drop(slot);

		Ok(entries::map_lines(response.body, mapper, ()))
	}

	fn build_request(&self, spec: &RequestSpec, token: Option<&Token>) -> Result<TransportRequest> {
		let url = self.endpoint(spec.host_class(), spec.path(), spec.query_pairs())?;
		let mut request = TransportRequest::new(spec.method().clone(), url);

		request.headers.insert(USER_AGENT, self.user_agent.clone());
		request.headers.insert(ACCEPT, spec.accept_type().header_value());

		if let Some(token) = token {
			request.headers.insert(AUTHORIZATION, token.bearer_header()?);
		}
		if let Some(body) = spec.request_body() {
			request.headers.insert(CONTENT_TYPE, body.content_type().header_value());
			request.body = Some(body.encode());
		}
		for name in spec.headers().keys() {
			if name != AUTHORIZATION {
				request.headers.remove(name);
			}
		}
		for (name, value) in spec.headers() {
			if name == AUTHORIZATION {
				tracing::warn!(
					"Ignoring caller-supplied authorization header; tokens come from the resolver."
				);

				continue;
			}

			request.headers.append(name.clone(), value.clone());
		}

		request.timeout = spec
			.timeout_override()
			.or(if spec.is_stream() { None } else { self.config.request_timeout });

		Ok(request)
	}

	fn authorized_request(
		&self,
		method: Method,
		path: &str,
		token: &Token,
	) -> Result<TransportRequest> {
		let url = self.endpoint(HostClass::Api, path, &[])?;
		let mut request = TransportRequest::new(method, url);

		request.headers.insert(USER_AGENT, self.user_agent.clone());
		request.headers.insert(ACCEPT, ContentType::Json.header_value());
		request.headers.insert(AUTHORIZATION, token.bearer_header()?);
		request.timeout = self.config.request_timeout;

		Ok(request)
	}

	async fn introspect(&self, token: &Token) -> Result<ScopeSet> {
		let request = self.authorized_request(Method::HEAD, "/api/account", token)?;
		let (response, slot) = self.send(request, Lane::Regular).await?;
		let response = ensure_success(response, slot).await?;
		let header = response
			.headers
			.get(SCOPES_HEADER)
			.and_then(|value| value.to_str().ok())
			.unwrap_or_default();

		Ok(ScopeSet::from_header(header))
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("config", &self.config)
			.field("resolver", &self.resolver)
			.finish_non_exhaustive()
	}
}

async fn ensure_success(response: TransportResponse, slot: Slot) -> Result<TransportResponse> {
	let status = response.status;

	if status.is_success() {
		drop(slot);

		return Ok(response);
	}

	let body = response.read_text().await;

	drop(slot);

	Err(Error::Http { status: status.as_u16(), error: ApiError::from_body(status, &body?) })
}
