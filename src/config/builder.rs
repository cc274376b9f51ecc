// self
use crate::{
	_prelude::*,
	config::{ClientConfig, HostSet, ThrottleConfig},
	error::ConfigError,
};

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Hosts the client talks to.
	pub hosts: HostSet,
	/// Dispatcher throttling.
	pub throttle: ThrottleConfig,
	/// Default timeout for non-streaming requests.
	pub request_timeout: Option<Duration>,
	/// Value of the `user-agent` header.
	pub user_agent: String,
	/// Deadline for the PKCE redirect.
	pub pkce_timeout: Duration,
	/// HTML served after a successful redirect.
	pub success_page: String,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with [`ClientConfig::default`].
	pub fn new() -> Self {
		let ClientConfig { hosts, throttle, request_timeout, user_agent, pkce_timeout, success_page } =
			ClientConfig::default();

		Self { hosts, throttle, request_timeout, user_agent, pkce_timeout, success_page }
	}

	/// Overrides the main API host.
	pub fn api_host(mut self, url: Url) -> Self {
		self.hosts.api = url;

		self
	}

	/// Overrides the opening explorer host.
	pub fn explorer_host(mut self, url: Url) -> Self {
		self.hosts.explorer = url;

		self
	}

	/// Overrides the tablebase host.
	pub fn tablebase_host(mut self, url: Url) -> Self {
		self.hosts.tablebase = url;

		self
	}

	/// Points every host at the same base URL (local servers, mocks).
	pub fn all_hosts(mut self, url: Url) -> Self {
		self.hosts = HostSet { api: url.clone(), explorer: url.clone(), tablebase: url };

		self
	}

	/// Replaces the throttle tuning.
	pub fn throttle(mut self, throttle: ThrottleConfig) -> Self {
		self.throttle = throttle;

		self
	}

	/// Sets the default timeout for non-streaming requests.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Disables the default request timeout.
	pub fn no_request_timeout(mut self) -> Self {
		self.request_timeout = None;

		self
	}

	/// Sets the `user-agent` header value.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Sets the PKCE redirect deadline.
	pub fn pkce_timeout(mut self, timeout: Duration) -> Self {
		self.pkce_timeout = timeout;

		self
	}

	/// Sets the HTML served after a successful redirect.
	pub fn success_page(mut self, html: impl Into<String>) -> Self {
		self.success_page = html.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let config = ClientConfig {
			hosts: self.hosts,
			throttle: self.throttle,
			request_timeout: self.request_timeout,
			user_agent: self.user_agent,
			pkce_timeout: self.pkce_timeout,
			success_page: self.success_page,
		};

		config.validate()?;

		Ok(config)
	}
}
impl Default for ClientConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn builder_rejects_non_http_hosts() {
		let err = ClientConfig::builder()
			.explorer_host(Url::parse("ftp://explorer.example").expect("Fixture URL should parse."))
			.build()
			.expect_err("FTP hosts should be rejected.");

		assert!(matches!(err, ConfigError::InvalidHost { host: "explorer", .. }));
	}

	#[test]
	fn builder_rejects_zero_capacity() {
		let err = ClientConfig::builder()
			.throttle(ThrottleConfig { stream: 0, ..Default::default() })
			.build()
			.expect_err("Zero-sized pools should be rejected.");

		assert!(matches!(err, ConfigError::ZeroCapacity { pool: "stream" }));
	}

	#[test]
	fn builder_applies_overrides() {
		let local = Url::parse("http://127.0.0.1:9000").expect("Fixture URL should parse.");
		let config = ClientConfig::builder()
			.all_hosts(local.clone())
			.no_request_timeout()
			.user_agent("bot/2.0")
			.pkce_timeout(Duration::from_secs(5))
			.build()
			.expect("Valid overrides should build.");

		assert_eq!(config.hosts.tablebase, local);
		assert_eq!(config.request_timeout, None);
		assert_eq!(config.user_agent, "bot/2.0");
		assert_eq!(config.pkce_timeout, Duration::from_secs(5));
	}

	#[test]
	fn builder_rejects_invalid_user_agent() {
		let err = ClientConfig::builder()
			.user_agent("bad\nagent")
			.build()
			.expect_err("Control characters should be rejected.");

		assert!(matches!(err, ConfigError::InvalidHeader { .. }));
	}
}
