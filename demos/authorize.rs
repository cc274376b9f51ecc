//! Interactive PKCE authorization against lichess.org.
//!
//! The demo prints the authorize URL, waits for the browser to hit the loopback listener,
//! then prints the granted scopes and revokes the fresh token unless told to keep it.

// std
use std::env;
// crates.io
use color_eyre::Result;
// self
use lichess_client::{
	Client,
	auth::{Scope, ScopeSet},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let client_id = env::var("LICHESS_CLIENT_ID").unwrap_or_else(|_| "lichess-client-demo".into());
	let keep = env::args().any(|arg| arg == "--keep");
	let client = Client::basic()?;
	let pending = client.authorize(client_id, ScopeSet::from([Scope::EmailRead])).await?;

	println!("Open this URL in a browser to continue:\n{}", pending.authorize_url());

	let authorized = pending.wait().await?;

	println!("Granted scopes: {}.", authorized.scopes);

	if let Some(expires_at) = authorized.expires_at {
		println!("Token expires at {expires_at}.");
	}
	if !keep {
		client.revoke_token(&authorized.token).await?;

		println!("Token revoked.");
	}

	Ok(())
}
