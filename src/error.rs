//! Client-level error types shared across dispatch, token resolution, and authorization.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, I/O). Never retried.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// A response line could not be mapped into the caller's item type.
	#[error(transparent)]
	Mapping(#[from] MappingError),
	/// Authorization (PKCE) flow failure.
	#[error(transparent)]
	Authorization(#[from] AuthorizationError),

	/// Server answered with a non-success status.
	///
	/// A `429` only surfaces here when the single retry after the cooldown was rate limited
	/// as well.
	#[error("Server responded with HTTP {status}: {error}.")]
	Http {
		/// HTTP status code returned by the server.
		status: u16,
		/// Error payload parsed by the response mapper.
		error: ApiError,
	},
	/// The client was closed before this request got a capacity slot.
	#[error("Dispatcher capacity pools are closed.")]
	Closed,
}
impl Error {
	/// Returns the HTTP status for [`Error::Http`] failures.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Http { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Returns `true` when the server kept rate limiting after the retry.
	pub fn is_rate_limited(&self) -> bool {
		self.status() == Some(StatusCode::TOO_MANY_REQUESTS.as_u16())
	}
}

/// Structured error payload decoded from a non-success response body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
	/// Human-readable message.
	pub message: String,
	/// Full JSON payload when the body was JSON.
	pub details: Option<serde_json::Value>,
}
impl ApiError {
	/// Creates an error payload carrying only a message.
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into(), details: None }
	}

	/// Parses a response body the way the API reports failures.
	///
	/// JSON bodies of the form `{"error": "..."}` yield that message; any other JSON keeps the
	/// serialized `error` value (or the whole document) as the message. Non-JSON bodies are
	/// used verbatim, and empty bodies fall back to the status reason phrase.
	pub fn from_body(status: StatusCode, body: &str) -> Self {
		let trimmed = body.trim();

		if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
			let message = match value.get("error") {
				Some(serde_json::Value::String(message)) => message.clone(),
				Some(other) => other.to_string(),
				None => value.to_string(),
			};

			return Self { message, details: Some(value) };
		}
		if trimmed.is_empty() {
			return Self::new(status.canonical_reason().unwrap_or("Unknown status"));
		}

		Self::new(trimmed)
	}
}
impl Display for ApiError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.message)
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured host is not an absolute HTTP(S) URL.
	#[error("The {host} host must be an absolute http(s) URL: {url}.")]
	InvalidHost {
		/// Which host failed validation.
		host: &'static str,
		/// Host URL that failed validation.
		url: String,
	},
	/// A request path or query could not be joined onto its host.
	#[error("Request URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A capacity pool was configured with zero slots.
	#[error("The {pool} pool must allow at least one request.")]
	ZeroCapacity {
		/// Pool label.
		pool: &'static str,
	},
	/// Token material contains bytes that cannot be sent in a header.
	#[error("Token contains characters that are not valid in an authorization header.")]
	InvalidToken,
	/// Token environment variable is not set.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: String,
	},
	/// A header value supplied by the caller is invalid.
	#[error("Header value for `{name}` is invalid.")]
	InvalidHeader {
		/// Header name.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Body(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
	/// The response head did not arrive before the request deadline.
	#[error("No response arrived within {}s.", .timeout.as_secs())]
	TimedOut {
		/// Deadline that elapsed.
		timeout: Duration,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures while turning a response line into a caller item.
#[derive(Debug, ThisError)]
pub enum MappingError {
	/// The line is not valid UTF-8.
	#[error("Response line is not valid UTF-8.")]
	Utf8(#[from] std::string::FromUtf8Error),
	/// The line could not be deserialized into the requested type.
	#[error("Response line could not be decoded at `{}`.", .0.path())]
	Json(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// Custom mapper rejected the line.
	#[error("Response line was rejected: {reason}.")]
	Rejected {
		/// Mapper-supplied reason.
		reason: String,
	},
}

/// Authorization flow failures. None of them are retried.
#[derive(Debug, ThisError)]
pub enum AuthorizationError {
	/// Redirect `state` did not match the generated value.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// Redirect carried no authorization code.
	#[error("Authorization redirect is missing the code{}.", describe_denial(.error, .description))]
	MissingCode {
		/// Provider `error` parameter, if present.
		error: Option<String>,
		/// Provider `error_description` parameter, if present.
		description: Option<String>,
	},
	/// Token endpoint rejected the code exchange.
	#[error("Token endpoint rejected the code exchange: {reason}.")]
	TokenRejected {
		/// Provider- or client-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// No redirect arrived before the deadline.
	#[error("No authorization redirect arrived within {}s.", .timeout.as_secs())]
	TimedOut {
		/// Deadline that elapsed.
		timeout: Duration,
	},
	/// The caller dropped the pending authorization or the flow ended unexpectedly.
	#[error("Authorization was abandoned before it completed.")]
	Abandoned,
	/// Redirect listener failed.
	#[error("Redirect listener failed.")]
	Listener(#[source] std::io::Error),
}

fn describe_denial(error: &Option<String>, description: &Option<String>) -> String {
	match (error, description) {
		(Some(error), Some(description)) => format!(" ({error}: {description})"),
		(Some(error), None) => format!(" ({error})"),
		(None, Some(description)) => format!(" ({description})"),
		(None, None) => String::new(),
	}
}
