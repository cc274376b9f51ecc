mod common;

// std
use std::time::Duration;
// crates.io
use futures::{StreamExt, future};
use tokio::time::{self, Instant};
// self
use common::{Reply, ScriptedTransport, scripted_client};
use lichess_client::{
	config::ThrottleConfig,
	dispatch::{RequestSpec, TextMapper},
};

#[tokio::test(start_paused = true)]
async fn cold_pools_let_five_through_then_space_the_sixth() {
	let transport = ScriptedTransport::new(Vec::new());
	let client = scripted_client(&transport, None, ThrottleConfig::default());
	let start = Instant::now();
	let spec = RequestSpec::get("/api/user/someone");
	let results =
		future::join_all((0..6).map(|_| async { client.dispatch(&spec, TextMapper).await })).await;

	assert!(results.iter().all(Result::is_ok));

	let sent = transport.sent();
	let immediate = sent.iter().filter(|sent| sent.at == start).count();

	assert_eq!(sent.len(), 6);
	assert_eq!(immediate, 5);
	assert!(sent[5].at >= start + Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_request_is_retried_once_after_cooldown() {
	let transport = ScriptedTransport::new(vec![
		Reply::status(429, "{\"error\":\"Too many requests\"}"),
		Reply::ok("recovered"),
	]);
	let client = scripted_client(&transport, None, ThrottleConfig::default());
	let lines = client
		.dispatch(&RequestSpec::get("/api/account"), TextMapper)
		.await
		.expect("Retry should succeed.")
		.collect_all()
		.await
		.expect("Body should read.");

	assert_eq!(lines, ["recovered"]);

	let sent = transport.sent();

	assert_eq!(sent.len(), 2);
	assert!(sent[1].at >= sent[0].at + Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn second_rate_limit_surfaces_and_gates_later_requests() {
	let transport = ScriptedTransport::new(vec![
		Reply::status(429, ""),
		Reply::status(429, "{\"error\":\"Still too many\"}"),
		Reply::ok("later"),
	]);
	let client = scripted_client(&transport, None, ThrottleConfig::default());
	let err = client
		.dispatch(&RequestSpec::get("/api/account"), TextMapper)
		.await
		.expect_err("Second 429 should surface.");

	assert!(err.is_rate_limited());
	assert_eq!(transport.sent_count(), 2);

	client
		.dispatch(&RequestSpec::get("/api/account"), TextMapper)
		.await
		.expect("Later request should go through after the cooldown.");

	let sent = transport.sent();

	assert_eq!(sent.len(), 3);
	assert!(sent[2].at >= sent[1].at + Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_one_cooldown() {
	let transport = ScriptedTransport::new(vec![Reply::status(429, "")]);
	let client = scripted_client(&transport, None, ThrottleConfig::default());
	let start = Instant::now();
	let spec = RequestSpec::get("/api/user/someone");
	let results =
		future::join_all((0..4).map(|_| async { client.dispatch(&spec, TextMapper).await })).await;

	assert!(results.iter().all(Result::is_ok));

	let sent = transport.sent();

	assert_eq!(sent.len(), 5);
	assert_eq!(sent[0].at, start);
	assert!(sent[1..].iter().all(|sent| {
		sent.at >= start + Duration::from_secs(60) && sent.at < start + Duration::from_secs(61)
	}));
}

#[tokio::test(start_paused = true)]
async fn streams_wait_out_an_active_cooldown() {
	let transport = ScriptedTransport::new(vec![
		Reply::status(429, ""),
		Reply::status(429, ""),
		Reply::endless(&["{\"type\":\"gameStart\"}"]),
	]);
	let client = scripted_client(&transport, None, ThrottleConfig::default());

	client
		.dispatch(&RequestSpec::get("/api/account"), TextMapper)
		.await
		.expect_err("Second 429 should surface.");

	let first = client
		.dispatch(&RequestSpec::get("/api/stream/event").streaming(), TextMapper)
		.await
		.expect("Stream should open after the cooldown.")
		.first()
		.await
		.expect("Stream should yield.")
		.expect("Line should map.");

	assert_eq!(first, "{\"type\":\"gameStart\"}");

	let sent = transport.sent();

	assert_eq!(sent.len(), 3);
	assert!(sent[2].at >= sent[1].at + Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn dropped_stream_releases_its_slot() {
	let transport = ScriptedTransport::new(vec![
		Reply::endless(&["{\"type\":\"gameStart\"}", "{\"type\":\"challenge\"}"]),
		Reply::endless(&["{\"type\":\"gameFinish\"}"]),
	]);
	let client =
		scripted_client(&transport, None, ThrottleConfig { stream: 1, ..Default::default() });
	let spec = RequestSpec::get("/api/stream/event").streaming();
	let mut events = client.dispatch(&spec, TextMapper).await.expect("First stream should open.");
	let first = events.next().await.expect("Stream should yield.").expect("Line should map.");

	assert_eq!(first, "{\"type\":\"gameStart\"}");

	drop(events);

	let second = time::timeout(Duration::from_secs(5), client.dispatch(&spec, TextMapper))
		.await
		.expect("Second stream should not wait for the first.")
		.expect("Second stream should open.")
		.first()
		.await
		.expect("Second stream should yield.")
		.expect("Line should map.");

	assert_eq!(second, "{\"type\":\"gameFinish\"}");
	assert_eq!(transport.sent()[0].header("accept").as_deref(), Some("application/x-ndjson"));
	assert_eq!(transport.sent()[0].request.timeout, None);
}
