//! Optional observability helpers for relay flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `bearer_relay.flow` with the
//!   `flow` and `stage` fields, plus `warn` events for failures nobody is waiting on.
//! - Enable `metrics` to increment the `bearer_relay_flow_total` counter for every
//!   attempt/success/failure/retry/debounce, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Relay flow kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Refresh-token exchange against the auth endpoint.
	Refresh,
	/// Proxied upstream API call.
	Proxy,
	/// Background renewal cycle.
	Renew,
	/// Host-facing resource call dispatch.
	Dispatch,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Refresh => "refresh",
			FlowKind::Proxy => "proxy",
			FlowKind::Renew => "renew",
			FlowKind::Dispatch => "dispatch",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a relay helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller (or swallowed by the renewer).
	Failure,
	/// A proxied call was re-sent after a reactive refresh.
	Retry,
	/// A reactive refresh was skipped because the debounce window had not elapsed.
	Debounced,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Retry => "retry",
			FlowOutcome::Debounced => "debounced",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records the terminal outcome of a flow result.
pub fn record_result<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => record_flow_outcome(kind, FlowOutcome::Failure),
	}
}
