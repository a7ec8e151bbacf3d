// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by relay flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("bearer_relay.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a failure that has no caller to report to (background renewal).
pub fn record_swallowed_failure(kind: FlowKind, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		flow = kind.as_str(),
		error = %err,
		"Background token refresh failed; retrying on the next tick."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, err);
}

/// Logs a reactive refresh skipped because the last refresh is still inside the debounce window.
pub fn record_debounced_refresh(status: u16, since_refresh: Option<Duration>) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		status,
		since_refresh_secs = since_refresh.map(|d| d.whole_seconds()),
		"Upstream rejected the bearer inside the debounce window; relaying the response as-is."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (status, since_refresh);
}

/// Logs a resource call that ended in an error response.
pub fn record_call_failure(path: &str, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(path, status = err.status(), error = %err, "Resource call failed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (path, err);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn event_helpers_accept_every_flow() {
		record_swallowed_failure(FlowKind::Renew, &Error::EmptyToken);
		record_debounced_refresh(401, Some(Duration::seconds(3)));
		record_call_failure("widgets", &Error::Cancelled);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
