//! Authorization-code exchange over the dispatcher, driven by the `oauth2` crate.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, AuthorizationCode, ClientId, EndpointNotSet, EndpointSet,
	HttpRequest, HttpResponse, PkceCodeVerifier, RedirectUrl, RequestTokenError, TokenResponse,
	TokenUrl,
	basic::{BasicClient, BasicErrorResponse},
	http::header::{ACCEPT, USER_AGENT},
};
// self
use crate::{
	_prelude::*,
	auth::{AuthorizedToken, ScopeSet, Token},
	config::HostClass,
	dispatch::{ContentType, Dispatcher, Lane},
	error::{AuthorizationError, ConfigError},
	http::TransportRequest,
	obs::{self, CallKind, CallOutcome, CallSpan},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type DispatchFuture<'c> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'c + Send>>;

/// [`AsyncHttpClient`] that routes `oauth2` requests through the dispatcher's throttle.
///
/// The status of the most recent response is kept so token endpoint rejections can report
/// it.
pub(crate) struct DispatchHttpClient {
	dispatcher: Arc<Dispatcher>,
	last_status: Mutex<Option<u16>>,
}
impl DispatchHttpClient {
	pub(crate) fn new(dispatcher: Arc<Dispatcher>) -> Self {
		Self { dispatcher, last_status: Mutex::new(None) }
	}

	fn take_status(&self) -> Option<u16> {
		self.last_status.lock().take()
	}
}
impl<'c> AsyncHttpClient<'c> for DispatchHttpClient {
	type Error = Error;
	type Future = DispatchFuture<'c>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			*self.last_status.lock() = None;

			let (parts, body) = request.into_parts();
			let url = Url::parse(&parts.uri.to_string())
				.map_err(|source| ConfigError::InvalidUrl { source })?;
			let mut outbound = TransportRequest::new(parts.method, url);

			outbound.headers = parts.headers;
			outbound.headers.insert(USER_AGENT, self.dispatcher.user_agent().clone());
			outbound.headers.entry(ACCEPT).or_insert(ContentType::Json.header_value());
			outbound.body = Some(body);
			outbound.timeout = self.dispatcher.config().request_timeout;

			let (response, slot) = self.dispatcher.send(outbound, Lane::Regular).await?;
			let status = response.status;
			let headers = response.headers.clone();
			let body = response.read_body().await;

			drop(slot);
			*self.last_status.lock() = Some(status.as_u16());

			let mut converted = HttpResponse::new(body?);

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Exchanges authorization codes at `{api}/api/token`.
pub(crate) struct CodeExchange {
	oauth_client: ConfiguredBasicClient,
	http_client: DispatchHttpClient,
}
impl CodeExchange {
	pub(crate) fn new(dispatcher: Arc<Dispatcher>, client_id: &str) -> Result<Self> {
		let token_url = dispatcher.endpoint(HostClass::Api, "/api/token", &[])?;
		let token_url = TokenUrl::from_url(token_url);
		let oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, http_client: DispatchHttpClient::new(dispatcher) })
	}

	/// Redeems `code` with the PKCE `verifier`.
	///
	/// `requested` stands in for the granted scopes when the token endpoint omits them.
	pub(crate) async fn exchange(
		&self,
		code: &str,
		verifier: &str,
		redirect_uri: &Url,
		requested: &ScopeSet,
	) -> Result<AuthorizedToken> {
		let span = CallSpan::new(CallKind::TokenExchange, "exchange_code");

		obs::record_call_outcome(CallKind::TokenExchange, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let redirect = RedirectUrl::from_url(redirect_uri.clone());
				let response = self
					.oauth_client
					.exchange_code(AuthorizationCode::new(code.to_owned()))
					.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()))
					.set_redirect_uri(Cow::Owned(redirect))
					.request_async(&self.http_client)
					.await
					.map_err(|e| map_request_error(e, self.http_client.take_status()))?;
				let issued_at = OffsetDateTime::now_utc();
				let scopes = match response.scopes() {
					Some(granted) =>
						ScopeSet::from_names(granted.iter().map(|scope| scope.as_str())),
					None => requested.clone(),
				};
				let expires_at = response
					.expires_in()
					.and_then(|expires_in| time::Duration::try_from(expires_in).ok())
					.and_then(|expires_in| issued_at.checked_add(expires_in));

				Ok::<_, Error>(AuthorizedToken {
					token: Token::new(response.access_token().secret().to_owned()),
					scopes,
					issued_at,
					expires_at,
				})
			})
			.await;

		obs::record_call_outcome(CallKind::TokenExchange, CallOutcome::of(&result));

		result
	}
}

fn map_request_error(
	err: RequestTokenError<Error, BasicErrorResponse>,
	status: Option<u16>,
) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) => format!("{}: {description}", response.error().as_ref()),
				None => response.error().as_ref().to_owned(),
			};

			AuthorizationError::TokenRejected { reason, status }.into()
		},
		RequestTokenError::Request(error) => error,
		RequestTokenError::Parse(source, _body) =>
			AuthorizationError::TokenResponseParse { source }.into(),
		RequestTokenError::Other(message) =>
			AuthorizationError::TokenRejected { reason: message, status }.into(),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::{StandardErrorResponse, basic::BasicErrorResponseType};
	// self
	use super::*;

	#[test]
	fn server_rejections_keep_description_and_status() {
		let response = StandardErrorResponse::new(
			BasicErrorResponseType::InvalidGrant,
			Some("Code expired".into()),
			None,
		);
		let err = map_request_error(RequestTokenError::ServerResponse(response), Some(400));

		match err {
			Error::Authorization(AuthorizationError::TokenRejected { reason, status }) => {
				assert_eq!(reason, "invalid_grant: Code expired");
				assert_eq!(status, Some(400));
			},
			other => panic!("Server rejections should map to TokenRejected: {other:?}"),
		}
	}

	#[test]
	fn request_errors_pass_through() {
		let err = map_request_error(RequestTokenError::Request(Error::Closed), None);

		assert!(matches!(err, Error::Closed));
	}
}
