//! Transport primitives underneath the dispatcher.
//!
//! The module exposes [`HttpTransport`] alongside [`TransportRequest`] and
//! [`TransportResponse`] so downstream crates can plug in custom HTTP stacks (or scripted
//! fakes) without losing the dispatcher's throttling and retry behavior. Implementations only
//! perform I/O: they never retry, never sleep, and report every HTTP status as a successful
//! [`TransportResponse`]. Only connection-level failures become [`TransportError`].

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use futures::StreamExt;
use futures::{Stream, TryStreamExt};
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Chunked response body. Dropping it closes the underlying connection.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Abstraction over HTTP stacks capable of executing dispatcher requests.
///
/// The trait is the dispatcher's only dependency on an HTTP client. Implementations must be
/// `Send + Sync + 'static` so one transport can back a long-lived [`Dispatcher`] shared
/// across tasks, and the returned future must be `Send` so dispatches can hop executors.
///
/// [`Dispatcher`]: crate::dispatch::Dispatcher
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once the response head is available.
	///
	/// The body must stay lazy: streaming endpoints never finish on their own.
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// Fully resolved outbound request handed to an [`HttpTransport`].
#[derive(Clone)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL including the query string.
	pub url: Url,
	/// Request headers (authorization, content negotiation, user agent).
	pub headers: HeaderMap,
	/// Encoded request body, if any.
	pub body: Option<Vec<u8>>,
	/// Deadline for the response head, enforced by the dispatcher. Body reads are never cut
	/// short; `None` waits for the head indefinitely.
	pub timeout: Option<Duration>,
}
impl TransportRequest {
	/// Creates a request without headers, body, or timeout.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None, timeout: None }
	}
}
impl Debug for TransportRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TransportRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("authorized", &self.headers.contains_key(oauth2::http::header::AUTHORIZATION))
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Response head plus a lazy body stream.
pub struct TransportResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Lazy body chunks.
	pub body: BodyStream,
}
impl TransportResponse {
	/// Builds a response whose body is already in memory.
	pub fn buffered(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
		let body = body.into();

		let chunk = futures::future::ready(Ok::<_, TransportError>(body));

		Self { status, headers, body: Box::pin(futures::stream::once(chunk)) }
	}

	/// Drains the body into memory.
	pub async fn read_body(self) -> Result<Vec<u8>, TransportError> {
		self.body
			.try_fold(Vec::new(), |mut buf, chunk| async move {
				buf.extend_from_slice(&chunk);

				Ok(buf)
			})
			.await
	}

	/// Drains the body into a string, replacing invalid UTF-8.
	pub async fn read_text(self) -> Result<String, TransportError> {
		let bytes = self.read_body().await?;

		Ok(String::from_utf8_lossy(&bytes).into_owned())
	}
}
impl Debug for TransportResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TransportResponse")
			.field("status", &self.status)
			.field("headers", &self.headers)
			.finish_non_exhaustive()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are not followed; the API answers directly and the token endpoint must never
/// delegate to another URI. Configure any custom [`ReqwestClient`] the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with the crate defaults (no redirects, rustls).
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client =
			ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let TransportRequest { method, url, headers, body, .. } = request;
			let mut builder = client.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response
				.bytes_stream()
				.map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from));

			Ok::<_, TransportError>(TransportResponse { status, headers, body: Box::pin(body) })
		})
	}
}
