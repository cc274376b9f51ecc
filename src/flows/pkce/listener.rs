//! Redirect listeners that receive the authorization redirect.
//!
//! [`RedirectListener`] is the seam between the PKCE flow and whatever accepts the browser
//! redirect. [`LoopbackListener`] is the stock implementation: a single-route axum server
//! bound to an ephemeral port on `127.0.0.1`.

// std
use std::{io, net::Ipv4Addr};
// crates.io
use axum::{
	Router,
	extract::{Query, State},
	response::{Html, IntoResponse, Response},
	routing,
};
use tokio::{
	net::TcpListener,
	sync::{mpsc, oneshot},
};
// self
use crate::{_prelude::*, error::AuthorizationError};

const GONE_PAGE: &str = "<!DOCTYPE html><html><body><p>This authorization request is no longer pending.</p></body></html>";

/// Boxed future returned by [`RedirectListener::accept`].
pub type ListenerFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, AuthorizationError>> + 'a + Send>>;

/// Source of authorization redirects.
pub trait RedirectListener
where
	Self: 'static + Send,
{
	/// Redirect URI registered with the authorization request.
	fn redirect_uri(&self) -> &Url;

	/// Resolves with the next redirect hitting the listener.
	fn accept(&mut self) -> ListenerFuture<'_, RedirectRequest>;

	/// Stops accepting redirects. Calling it more than once has no further effect.
	fn stop(&mut self);
}

/// Page sent back to the browser that followed the redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectReply {
	/// Response status.
	pub status: StatusCode,
	/// HTML body.
	pub body: String,
}
impl RedirectReply {
	/// `200 OK` with `body`.
	pub fn success(body: impl Into<String>) -> Self {
		Self { status: StatusCode::OK, body: body.into() }
	}

	/// Error page carrying `message`.
	pub fn error(status: StatusCode, message: &str) -> Self {
		Self {
			status,
			body: format!(
				"<!DOCTYPE html><html><body><p>Authorization failed: {}</p></body></html>",
				escape_html(message)
			),
		}
	}
}

/// One redirect received by a listener, plus the channel to answer the browser with.
#[derive(Debug)]
pub struct RedirectRequest {
	params: HashMap<String, String>,
	responder: Option<oneshot::Sender<RedirectReply>>,
}
impl RedirectRequest {
	/// Wraps the decoded query `params`; the receiver resolves with the reply.
	pub fn new(params: HashMap<String, String>) -> (Self, oneshot::Receiver<RedirectReply>) {
		let (tx, rx) = oneshot::channel();

		(Self { params, responder: Some(tx) }, rx)
	}

	/// Query parameter `name`, if present.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(name).map(String::as_str)
	}

	/// Every decoded query parameter.
	pub fn params(&self) -> &HashMap<String, String> {
		&self.params
	}

	/// Answers the browser. Only the first reply is delivered.
	pub fn respond(&mut self, reply: RedirectReply) {
		if let Some(responder) = self.responder.take() {
			// The browser may already have disconnected.
			let _ = responder.send(reply);
		}
	}
}

/// Loopback HTTP listener on an ephemeral `127.0.0.1` port.
pub struct LoopbackListener {
	redirect_uri: Url,
	requests: mpsc::Receiver<RedirectRequest>,
	shutdown: Option<oneshot::Sender<()>>,
}
impl LoopbackListener {
	/// Binds `127.0.0.1:0` and starts serving `/`.
	pub async fn bind() -> Result<Self, AuthorizationError> {
		let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
			.await
			.map_err(AuthorizationError::Listener)?;
		let addr = listener.local_addr().map_err(AuthorizationError::Listener)?;
		let redirect_uri = Url::parse(&format!("http://{addr}/"))
			.map_err(|e| AuthorizationError::Listener(io::Error::other(e)))?;
		let (tx, requests) = mpsc::channel(4);
		let (shutdown, shutdown_rx) = oneshot::channel::<()>();
		let app = Router::new().route("/", routing::get(handle_redirect)).with_state(tx);

		tokio::spawn(async move {
			let served = axum::serve(listener, app)
				.with_graceful_shutdown(async move {
					let _ = shutdown_rx.await;
				})
				.await;

			if let Err(e) = served {
				tracing::warn!(error = %e, "Redirect listener stopped with an error.");
			}
		});

		tracing::debug!(redirect_uri = %redirect_uri, "Redirect listener bound.");

		Ok(Self { redirect_uri, requests, shutdown: Some(shutdown) })
	}

	/// Whether [`RedirectListener::stop`] has run.
	pub fn is_stopped(&self) -> bool {
		self.shutdown.is_none()
	}
}
impl RedirectListener for LoopbackListener {
	fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	fn accept(&mut self) -> ListenerFuture<'_, RedirectRequest> {
		Box::pin(async move {
			self.requests.recv().await.ok_or_else(|| {
				AuthorizationError::Listener(io::Error::other("Redirect listener closed."))
			})
		})
	}

	fn stop(&mut self) {
		let Some(shutdown) = self.shutdown.take() else {
			return;
		};

		let _ = shutdown.send(());

		// In-flight replies are still written before the server task exits.
		self.requests.close();

		tracing::debug!(redirect_uri = %self.redirect_uri, "Redirect listener stopped.");
	}
}
impl Drop for LoopbackListener {
	fn drop(&mut self) {
		self.stop();
	}
}
impl Debug for LoopbackListener {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoopbackListener")
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("stopped", &self.is_stopped())
			.finish()
	}
}

async fn handle_redirect(
	State(requests): State<mpsc::Sender<RedirectRequest>>,
	Query(params): Query<HashMap<String, String>>,
) -> Response {
	let (request, reply) = RedirectRequest::new(params);

	if requests.send(request).await.is_err() {
		return (StatusCode::GONE, Html(GONE_PAGE)).into_response();
	}

	match reply.await {
		Ok(reply) => (reply.status, Html(reply.body)).into_response(),
		Err(_) => (StatusCode::GONE, Html(GONE_PAGE)).into_response(),
	}
}

fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());

	for c in text.chars() {
		match c {
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'&' => escaped.push_str("&amp;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			c => escaped.push(c),
		}
	}

	escaped
}
