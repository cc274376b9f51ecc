//! Per-call request descriptions handed to the dispatcher.

// self
use crate::{_prelude::*, auth::Scope, config::HostClass, error::ConfigError};

/// Media types the API accepts and produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
	/// `application/json`.
	Json,
	/// `application/x-ndjson`, one JSON document per line.
	Ndjson,
	/// `application/x-www-form-urlencoded`.
	Form,
	/// `text/plain`.
	Plain,
	/// `application/x-chess-pgn`.
	Pgn,
}
impl ContentType {
	/// MIME string for headers.
	pub const fn as_str(self) -> &'static str {
		match self {
			ContentType::Json => "application/json",
			ContentType::Ndjson => "application/x-ndjson",
			ContentType::Form => "application/x-www-form-urlencoded",
			ContentType::Plain => "text/plain",
			ContentType::Pgn => "application/x-chess-pgn",
		}
	}

	pub(crate) fn header_value(self) -> HeaderValue {
		HeaderValue::from_static(self.as_str())
	}
}
impl Display for ContentType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request payloads supported by the API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestBody {
	/// URL-encoded form fields, in order.
	Form(Vec<(String, String)>),
	/// Pre-serialized JSON document.
	Json(String),
	/// Plain text.
	Plain(String),
	/// PGN game text.
	Pgn(String),
}
impl RequestBody {
	/// Form body from key/value pairs.
	pub fn form<I, K, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self::Form(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}

	/// JSON body serialized from `value`.
	pub fn json<T>(value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		Ok(Self::Json(serde_json::to_string(value)?))
	}

	/// Media type sent as `content-type`.
	pub fn content_type(&self) -> ContentType {
		match self {
			Self::Form(_) => ContentType::Form,
			Self::Json(_) => ContentType::Json,
			Self::Plain(_) => ContentType::Plain,
			Self::Pgn(_) => ContentType::Pgn,
		}
	}

	/// Wire encoding of the body.
	pub fn encode(&self) -> Vec<u8> {
		match self {
			Self::Form(pairs) => url::form_urlencoded::Serializer::new(String::new())
				.extend_pairs(pairs)
				.finish()
				.into_bytes(),
			Self::Json(text) | Self::Plain(text) | Self::Pgn(text) => text.as_bytes().to_vec(),
		}
	}
}

/// Immutable description of one API call.
///
/// Built per call with the `with_*` style combinators, then passed by reference to
/// [`Dispatcher::dispatch`](crate::dispatch::Dispatcher::dispatch).
#[derive(Clone, Debug)]
pub struct RequestSpec {
	method: Method,
	path: String,
	query: Vec<(String, String)>,
	headers: HeaderMap,
	body: Option<RequestBody>,
	scope: Option<Scope>,
	stream: bool,
	timeout: Option<Duration>,
	host: HostClass,
	accept: Option<ContentType>,
}
impl RequestSpec {
	/// Creates an unauthenticated, non-streaming request against the API host.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: HeaderMap::new(),
			body: None,
			scope: None,
			stream: false,
			timeout: None,
			host: HostClass::Api,
			accept: None,
		}
	}

	/// `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Requires a token valid for `scope`.
	pub fn with_scope(mut self, scope: Scope) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Marks the endpoint as a long-lived NDJSON stream.
	pub fn streaming(mut self) -> Self {
		self.stream = true;

		self
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Adds a raw header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	/// Sets the request body.
	pub fn body(mut self, body: RequestBody) -> Self {
		self.body = Some(body);

		self
	}

	/// Overrides the `accept` media type.
	pub fn accept(mut self, accept: ContentType) -> Self {
		self.accept = Some(accept);

		self
	}

	/// Overrides the timeout for this call.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Targets another configured host.
	pub fn host(mut self, host: HostClass) -> Self {
		self.host = host;

		self
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Path relative to the host.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Query parameters in insertion order.
	pub fn query_pairs(&self) -> &[(String, String)] {
		&self.query
	}

	/// Extra headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Request body, if any.
	pub fn request_body(&self) -> Option<&RequestBody> {
		self.body.as_ref()
	}

	/// Required scope; `None` sends the request without authorization.
	pub fn scope(&self) -> Option<Scope> {
		self.scope
	}

	/// Whether the response is consumed as an open-ended stream.
	pub fn is_stream(&self) -> bool {
		self.stream
	}

	/// Per-call timeout override.
	pub fn timeout_override(&self) -> Option<Duration> {
		self.timeout
	}

	/// Target host class.
	pub fn host_class(&self) -> HostClass {
		self.host
	}

	/// Effective `accept` media type: NDJSON for streams, JSON otherwise, unless overridden.
	pub fn accept_type(&self) -> ContentType {
		self.accept.unwrap_or(if self.stream { ContentType::Ndjson } else { ContentType::Json })
	}
}
