//! Observability helpers shared by dispatch and authorization.
//!
//! Every instrumented call runs inside a `lichess_client.call` span carrying the `call` kind
//! and the `stage` (call site). With the `metrics` feature enabled, the
//! `lichess_client_call_total` counter is incremented for every attempt/success/failure,
//! labeled by `call` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Call kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Buffered request through the dispatcher.
	Dispatch,
	/// Streaming request through the dispatcher.
	Stream,
	/// Scope introspection (`HEAD /api/account`).
	Introspection,
	/// Authorization code exchange at the token endpoint.
	TokenExchange,
	/// Interactive PKCE authorization.
	Authorization,
	/// Token revocation.
	Revocation,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Dispatch => "dispatch",
			CallKind::Stream => "stream",
			CallKind::Introspection => "introspection",
			CallKind::TokenExchange => "token_exchange",
			CallKind::Authorization => "authorization",
			CallKind::Revocation => "revocation",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to an instrumented call.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto [`CallOutcome::Success`] or [`CallOutcome::Failure`].
	pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
		if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure }
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
