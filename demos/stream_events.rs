//! Follows the account event stream for the token in `LICHESS_TOKEN`.

// crates.io
use color_eyre::Result;
use futures::StreamExt;
// self
use lichess_client::{
	Client,
	auth::{Scope, Token, TokenResolver},
	config::ClientConfig,
	dispatch::{JsonMapper, RequestSpec},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let token = Token::from_env("LICHESS_TOKEN")?;
	let client = Client::new(ClientConfig::default(), Some(TokenResolver::single(token)))?;
	let spec = RequestSpec::get("/api/stream/event").with_scope(Scope::ChallengeRead).streaming();
	let mut events = client.dispatch(&spec, JsonMapper::<serde_json::Value>::new()).await?;

	while let Some(event) = events.next().await {
		let event = event?;

		println!("{}: {event}", event["type"].as_str().unwrap_or("unknown"));
	}

	Ok(())
}
