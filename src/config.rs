//! Immutable client configuration: hosts, throttle tuning, and authorization defaults.
//!
//! Values are validated once (through [`ClientConfigBuilder`] or [`ClientConfig::validate`])
//! and never change after the client is built.

/// Builder API for assembling validated configurations.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Default `user-agent` header sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("lichess-client/", env!("CARGO_PKG_VERSION"));

const DEFAULT_SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<title>Authorization complete</title></head><body><h1>Authorization complete</h1>\
<p>You can close this window and return to the application.</p></body></html>";

/// Which configured host a request targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostClass {
	/// Main API host.
	#[default]
	Api,
	/// Opening explorer host.
	Explorer,
	/// Endgame tablebase host.
	Tablebase,
}
impl HostClass {
	/// Label used in errors and logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Api => "api",
			Self::Explorer => "explorer",
			Self::Tablebase => "tablebase",
		}
	}
}

/// Base URLs for the three independently configurable hosts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSet {
	/// Main API (`https://lichess.org`).
	pub api: Url,
	/// Opening explorer (`https://explorer.lichess.ovh`).
	pub explorer: Url,
	/// Endgame tablebase (`https://tablebase.lichess.ovh`).
	pub tablebase: Url,
}
impl HostSet {
	/// Base URL for the given host class.
	pub fn url_for(&self, class: HostClass) -> &Url {
		match class {
			HostClass::Api => &self.api,
			HostClass::Explorer => &self.explorer,
			HostClass::Tablebase => &self.tablebase,
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		for class in [HostClass::Api, HostClass::Explorer, HostClass::Tablebase] {
			let url = self.url_for(class);

			if !matches!(url.scheme(), "http" | "https")
				|| url.host_str().is_none()
				|| url.cannot_be_a_base()
			{
				return Err(ConfigError::InvalidHost { host: class.as_str(), url: url.to_string() });
			}
		}

		Ok(())
	}
}
impl Default for HostSet {
	fn default() -> Self {
		Self {
			api: Url::parse("https://lichess.org").expect("Default API host should parse."),
			explorer: Url::parse("https://explorer.lichess.ovh")
				.expect("Default explorer host should parse."),
			tablebase: Url::parse("https://tablebase.lichess.ovh")
				.expect("Default tablebase host should parse."),
		}
	}
}

/// Capacity pools, spacing, and rate-limit cooldown used by the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
	/// Blocking single-flight pool size.
	pub single: usize,
	/// Non-blocking burst pool size.
	pub burst: usize,
	/// Streaming pool size.
	pub stream: usize,
	/// Minimum delay between non-burst requests.
	pub spacing: Duration,
	/// Idle time after which the burst pool refills.
	pub burst_refill_after: Duration,
	/// Wait imposed on every request after a `429`.
	pub cooldown: Duration,
}
impl ThrottleConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		for (pool, size) in [("single", self.single), ("burst", self.burst), ("stream", self.stream)]
		{
			if size == 0 {
				return Err(ConfigError::ZeroCapacity { pool });
			}
		}

		Ok(())
	}
}
impl Default for ThrottleConfig {
	fn default() -> Self {
		Self {
			single: 1,
			burst: 4,
			stream: 8,
			spacing: Duration::from_secs(1),
			burst_refill_after: Duration::from_secs(10),
			cooldown: Duration::from_secs(60),
		}
	}
}

/// Complete client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Target hosts.
	pub hosts: HostSet,
	/// Dispatcher throttling.
	pub throttle: ThrottleConfig,
	/// Default timeout for non-streaming requests; `None` disables it.
	pub request_timeout: Option<Duration>,
	/// Value of the `user-agent` header.
	pub user_agent: String,
	/// Deadline for the PKCE redirect to arrive.
	pub pkce_timeout: Duration,
	/// HTML served to the browser after a successful redirect.
	pub success_page: String,
}
impl ClientConfig {
	/// Creates a builder seeded with the public Lichess defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::new()
	}

	/// Checks hosts and pool sizes. Deserialized configurations must pass this before use.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.hosts.validate()?;
		self.throttle.validate()?;

		HeaderValue::from_str(&self.user_agent)
			.map_err(|_| ConfigError::InvalidHeader { name: "user-agent".into() })?;

		Ok(())
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			hosts: HostSet::default(),
			throttle: ThrottleConfig::default(),
			request_timeout: Some(Duration::from_secs(30)),
			user_agent: DEFAULT_USER_AGENT.into(),
			pkce_timeout: Duration::from_secs(120),
			success_page: DEFAULT_SUCCESS_PAGE.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_public_hosts() {
		let config = ClientConfig::default();

		assert_eq!(config.hosts.api.as_str(), "https://lichess.org/");
		assert_eq!(config.hosts.url_for(HostClass::Explorer).as_str(), "https://explorer.lichess.ovh/");
		assert_eq!(config.throttle.burst, 4);
		assert_eq!(config.throttle.cooldown, Duration::from_secs(60));
		assert!(config.validate().is_ok());
	}

	#[test]
	fn partial_documents_fill_defaults() {
		let config: ClientConfig =
			serde_json::from_str("{\"user_agent\":\"bot/1.0\",\"throttle\":{\"stream\":2}}")
				.expect("Partial config should deserialize.");

		assert_eq!(config.user_agent, "bot/1.0");
		assert_eq!(config.throttle.stream, 2);
		assert_eq!(config.throttle.single, 1);
		assert_eq!(config.pkce_timeout, Duration::from_secs(120));
	}
}
