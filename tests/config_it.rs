mod common;

// std
use std::sync::Arc;
// self
use common::{Reply, ScriptedTransport};
use lichess_client::{
	Client,
	auth::{Scope, Token, TokenResolver},
	config::{ClientConfig, HostClass},
	dispatch::{RequestSpec, TextMapper},
	error::ConfigError,
	http::HttpTransport,
	url::Url,
};

#[test]
fn deserialized_configs_are_validated_at_construction() {
	let config: ClientConfig = serde_json::from_str("{\"throttle\":{\"burst\":0}}")
		.expect("Config document should deserialize.");
	let err = Client::with_transport(config, None, ScriptedTransport::new(Vec::new()))
		.expect_err("Zero burst pool should be rejected.");

	assert!(matches!(err, ConfigError::ZeroCapacity { pool: "burst" }));
}

#[tokio::test]
async fn host_classes_route_to_their_configured_base() {
	let transport = ScriptedTransport::new(vec![Reply::ok(""), Reply::ok("")]);
	let config = ClientConfig::builder()
		.api_host(Url::parse("https://api.test").expect("Fixture URL should parse."))
		.explorer_host(Url::parse("https://explorer.test/v2/").expect("Fixture URL should parse."))
		.tablebase_host(Url::parse("http://tablebase.test:9000").expect("Fixture URL should parse."))
		.build()
		.expect("Config should build.");
	let client = Client::with_transport(config, None, transport.clone()).expect("Client should build.");

	for host in [HostClass::Explorer, HostClass::Tablebase] {
		client
			.dispatch(&RequestSpec::get("/standard").query("fen", "8/8 w").host(host), TextMapper)
			.await
			.expect("Dispatch should succeed.");
	}

	let urls = transport.sent().into_iter().map(|sent| sent.request.url.to_string()).collect::<Vec<_>>();

	assert_eq!(urls, [
		"https://explorer.test/v2/standard?fen=8%2F8+w",
		"http://tablebase.test:9000/standard?fen=8%2F8+w"
	]);
}

#[tokio::test]
async fn swapping_resolvers_keeps_the_transport() {
	let transport = ScriptedTransport::new(vec![Reply::ok("")]);
	let anonymous = common::scripted_client(&transport, None, Default::default());
	let authed = anonymous
		.with_resolver(TokenResolver::single(Token::new("lip_swapped")))
		.expect("Resolver swap should keep a valid config.");
	let shared: &Arc<dyn HttpTransport> = authed.dispatcher().transport();

	assert!(Arc::ptr_eq(shared, anonymous.dispatcher().transport()));
	assert!(anonymous.dispatcher().resolver().is_none());

	authed
		.dispatch(&RequestSpec::get("/api/account").with_scope(Scope::Any), TextMapper)
		.await
		.expect("Dispatch should succeed.");

	assert_eq!(transport.sent()[0].header("authorization").as_deref(), Some("Bearer lip_swapped"));
}
