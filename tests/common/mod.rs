#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	io,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use futures::{StreamExt, future, stream};
use parking_lot::Mutex;
use tokio::{
	sync::{mpsc, oneshot},
	time::Instant,
};
// self
use lichess_client::{
	Client,
	auth::TokenResolver,
	config::{ClientConfig, ThrottleConfig},
	error::{AuthorizationError, TransportError},
	flows::{ListenerFuture, RedirectListener, RedirectReply, RedirectRequest},
	http::{BodyStream, HttpTransport, TransportFuture, TransportRequest, TransportResponse},
	oauth::oauth2::http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
	url::Url,
};

pub const API: &str = "https://api.test";

/// Canned outcome for one transport call.
pub enum Reply {
	Body { status: u16, headers: Vec<(&'static str, String)>, body: String },
	Endless(Vec<String>),
	Hang,
	Fail,
}
impl Reply {
	pub fn ok(body: &str) -> Self {
		Self::status(200, body)
	}

	pub fn status(status: u16, body: &str) -> Self {
		Self::Body { status, headers: Vec::new(), body: body.to_owned() }
	}

	pub fn scopes(value: &str) -> Self {
		Self::Body { status: 200, headers: vec![("x-oauth-scopes", value.to_owned())], body: String::new() }
	}

	pub fn endless(lines: &[&str]) -> Self {
		Self::Endless(lines.iter().map(|line| (*line).to_owned()).collect())
	}
}

#[derive(Clone, Debug)]
pub struct Sent {
	pub at: Instant,
	pub request: TransportRequest,
}
impl Sent {
	pub fn header(&self, name: &str) -> Option<String> {
		self.request.headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
	}

	pub fn header_all(&self, name: &str) -> Vec<String> {
		self.request
			.headers
			.get_all(name)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.map(str::to_owned)
			.collect()
	}
}

/// Transport that answers from a script and records every request it sees.
///
/// Once the script runs dry every call answers `200` with an empty body.
#[derive(Default)]
pub struct ScriptedTransport {
	script: Mutex<VecDeque<Reply>>,
	sent: Mutex<Vec<Sent>>,
}
impl ScriptedTransport {
	pub fn new(replies: Vec<Reply>) -> Arc<Self> {
		Arc::new(Self { script: Mutex::new(replies.into()), sent: Mutex::new(Vec::new()) })
	}

	pub fn sent(&self) -> Vec<Sent> {
		self.sent.lock().clone()
	}

	pub fn sent_count(&self) -> usize {
		self.sent.lock().len()
	}
}
impl HttpTransport for ScriptedTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		self.sent.lock().push(Sent { at: Instant::now(), request });

		let reply = self.script.lock().pop_front().unwrap_or_else(|| Reply::ok(""));

		Box::pin(async move {
			match reply {
				Reply::Body { status, headers, body } => {
					let mut map = HeaderMap::new();

					for (name, value) in headers {
						map.insert(
							HeaderName::from_static(name),
							HeaderValue::from_str(&value).expect("Scripted header should be valid."),
						);
					}

					Ok(TransportResponse::buffered(
						StatusCode::from_u16(status).expect("Scripted status should be valid."),
						map,
						body,
					))
				},
				Reply::Endless(lines) => {
					let chunks = lines
						.into_iter()
						.map(|line| Ok::<_, TransportError>(format!("{line}\n").into_bytes()));
					let body: BodyStream = Box::pin(stream::iter(chunks).chain(stream::pending()));

					Ok(TransportResponse { status: StatusCode::OK, headers: HeaderMap::new(), body })
				},
				Reply::Hang => future::pending().await,
				Reply::Fail => Err(TransportError::Io(io::Error::other("connection reset"))),
			}
		})
	}
}

pub fn scripted_client(
	transport: &Arc<ScriptedTransport>,
	resolver: Option<TokenResolver>,
	throttle: ThrottleConfig,
) -> Client {
	let config = ClientConfig::builder()
		.all_hosts(Url::parse(API).expect("Fixture host should parse."))
		.throttle(throttle)
		.build()
		.expect("Fixture config should build.");

	Client::with_transport(config, resolver, transport.clone())
		.expect("Client should build over the scripted transport.")
}

/// In-memory redirect listener driven through a [`ListenerHandle`].
pub struct ChannelListener {
	redirect_uri: Url,
	requests: mpsc::UnboundedReceiver<RedirectRequest>,
	stops: Arc<AtomicUsize>,
}
impl ChannelListener {
	pub fn new() -> (Self, ListenerHandle) {
		let (sender, requests) = mpsc::unbounded_channel();
		let stops = Arc::new(AtomicUsize::new(0));
		let listener = Self {
			redirect_uri: Url::parse("http://127.0.0.1:45678/").expect("Redirect URI should parse."),
			requests,
			stops: stops.clone(),
		};

		(listener, ListenerHandle { sender, stops })
	}
}
impl RedirectListener for ChannelListener {
	fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	fn accept(&mut self) -> ListenerFuture<'_, RedirectRequest> {
		Box::pin(async move {
			self.requests.recv().await.ok_or_else(|| {
				AuthorizationError::Listener(io::Error::other("Channel listener closed."))
			})
		})
	}

	fn stop(&mut self) {
		self.stops.fetch_add(1, Ordering::SeqCst);
		self.requests.close();
	}
}

pub struct ListenerHandle {
	sender: mpsc::UnboundedSender<RedirectRequest>,
	stops: Arc<AtomicUsize>,
}
impl ListenerHandle {
	pub fn redirect(&self, params: &[(&str, &str)]) -> oneshot::Receiver<RedirectReply> {
		let params = params
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<_, _>>();
		let (request, reply) = RedirectRequest::new(params);

		self.sender.send(request).expect("Listener should still accept redirects.");

		reply
	}

	pub fn stops(&self) -> usize {
		self.stops.load(Ordering::SeqCst)
	}
}

pub fn query_param(url: &Url, name: &str) -> String {
	url.query_pairs()
		.find(|(key, _)| key == name)
		.map(|(_, value)| value.into_owned())
		.expect("Query parameter should be present.")
}
