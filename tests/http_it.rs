#![cfg(feature = "reqwest")]

mod common;

// std
use std::net::TcpListener;
// crates.io
use futures::StreamExt;
use httpmock::{Method::HEAD, prelude::*};
use serde::Deserialize;
// self
use common::query_param;
use lichess_client::{
	Client,
	auth::{Scope, ScopeSet, Token, TokenResolver},
	config::ClientConfig,
	dispatch::{JsonMapper, RequestSpec},
	error::{AuthorizationError, Error},
	url::Url,
};

#[derive(Debug, PartialEq, Deserialize)]
struct Event {
	r#type: String,
}

fn client_for(base: &str, resolver: Option<TokenResolver>) -> Client {
	let config = ClientConfig::builder()
		.all_hosts(Url::parse(base).expect("Mock base URL should parse."))
		.build()
		.expect("Config should build.");

	Client::new(config, resolver).expect("Reqwest client should build.")
}

#[tokio::test]
async fn scoped_stream_over_real_http() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/stream/event")
				.header("authorization", "Bearer lip_live")
				.header("accept", "application/x-ndjson");
			then.status(200)
				.header("content-type", "application/x-ndjson")
				.body("{\"type\":\"gameStart\"}\n{}\n{\"type\":\"gameFinish\"}\n");
		})
		.await;
	let client =
		client_for(&server.base_url(), Some(TokenResolver::single(Token::new("lip_live"))));
	let spec = RequestSpec::get("/api/stream/event").with_scope(Scope::BotPlay).streaming();
	let events = client
		.dispatch(&spec, JsonMapper::<Event>::new())
		.await
		.expect("Stream should open.")
		.collect::<Vec<_>>()
		.await;

	mock.assert_async().await;

	let kinds = events
		.into_iter()
		.map(|event| event.expect("Event should decode.").r#type)
		.collect::<Vec<_>>();

	assert_eq!(kinds, ["gameStart", "gameFinish"]);
}

#[tokio::test]
async fn scopes_are_read_from_the_introspection_header() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(HEAD).path("/api/account").header("authorization", "Bearer lip_scoped");
			then.status(200).header("x-oauth-scopes", "email:read, board:play");
		})
		.await;
	let client = client_for(&server.base_url(), None);
	let scopes = client.scopes(&Token::new("lip_scoped")).await;

	mock.assert_async().await;

	assert_eq!(scopes, ScopeSet::from([Scope::EmailRead, Scope::BoardPlay]));
}

#[tokio::test]
async fn connection_failures_surface_as_transport_errors() {
	let port = TcpListener::bind("127.0.0.1:0")
		.and_then(|listener| listener.local_addr())
		.expect("Ephemeral port should be available.")
		.port();
	let client = client_for(&format!("http://127.0.0.1:{port}"), None);
	let err = client
		.dispatch(&RequestSpec::get("/api/account"), JsonMapper::<Event>::new())
		.await
		.expect_err("Closed port should refuse connections.");

	assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn loopback_redirect_with_forged_state_is_refused() {
	let client = client_for("https://lichess.test", None);
	let pending = client
		.authorize("demo-app", ScopeSet::from([Scope::EmailRead]))
		.await
		.expect("Loopback flow should start.");
	let redirect_uri =
		Url::parse(&query_param(pending.authorize_url(), "redirect_uri")).expect("Redirect URI should parse.");

	assert_eq!(redirect_uri.host_str(), Some("127.0.0.1"));

	let mut callback = redirect_uri.clone();

	callback.query_pairs_mut().append_pair("code", "c0de").append_pair("state", "forged");

	let response = reqwest::get(callback).await.expect("Loopback listener should answer.");

	assert_eq!(response.status().as_u16(), 400);

	let err = pending.wait().await.expect_err("Forged state should fail.");

	assert!(matches!(err, Error::Authorization(AuthorizationError::StateMismatch)));
}
