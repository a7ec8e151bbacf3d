//! Background renewal: one tokio task per instance that refreshes the token on a fixed period.
//!
//! The task sleeps the warm-up delay, then refreshes every `interval`. Failures are logged and
//! swallowed because the proxy's reactive refresh is the correctness backstop. The task runs
//! until [`RenewerHandle::shutdown`] is called or the handle is dropped.

// crates.io
use tokio::{
	task::JoinHandle,
	time::{self, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::ProxyHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	token::TokenRefresher,
};

/// Warm-up delay and period of the background renewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenewSchedule {
	/// Delay before the first period starts.
	pub warmup: Duration,
	/// Time between refreshes.
	pub interval: Duration,
}
impl RenewSchedule {
	const MIN_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);

	fn warmup(&self) -> std::time::Duration {
		if self.warmup.is_negative() {
			std::time::Duration::ZERO
		} else {
			self.warmup.unsigned_abs()
		}
	}

	fn interval(&self) -> std::time::Duration {
		if self.interval.is_positive() {
			self.interval.unsigned_abs()
		} else {
			Self::MIN_INTERVAL
		}
	}
}

/// Entry point for starting the background renewal task.
#[derive(Debug)]
pub struct Renewer;
impl Renewer {
	/// Spawns the renewal loop on the current tokio runtime.
	pub fn spawn<C>(
		refresher: Arc<TokenRefresher<C>>,
		schedule: RenewSchedule,
	) -> Result<RenewerHandle, ConfigError>
	where
		C: ?Sized + ProxyHttpClient,
	{
		let runtime = tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
		let shutdown = CancellationToken::new();
		let task = runtime.spawn(run(refresher, schedule, shutdown.clone()));

		Ok(RenewerHandle { shutdown, task })
	}
}

/// Owner of a running renewal task; dropping it stops the task.
#[derive(Debug)]
pub struct RenewerHandle {
	shutdown: CancellationToken,
	task: JoinHandle<()>,
}
impl RenewerHandle {
	/// Signals the loop to stop at its next await point.
	pub fn shutdown(&self) {
		self.shutdown.cancel();
	}

	/// Returns `true` while the renewal task has not finished.
	pub fn is_running(&self) -> bool {
		!self.task.is_finished()
	}
}
impl Drop for RenewerHandle {
	fn drop(&mut self) {
		self.shutdown.cancel();
		self.task.abort();
	}
}

async fn run<C>(
	refresher: Arc<TokenRefresher<C>>,
	schedule: RenewSchedule,
	shutdown: CancellationToken,
) where
	C: ?Sized + ProxyHttpClient,
{
	const KIND: FlowKind = FlowKind::Renew;

	let period = schedule.interval();

	tokio::select! {
		_ = shutdown.cancelled() => return,
		_ = time::sleep(schedule.warmup()) => {},
	}

	let mut ticker = time::interval_at(Instant::now() + period, period);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			_ = ticker.tick() => {
				let span = FlowSpan::new(KIND, "tick");

				obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

				let result = span.instrument(refresher.refresh()).await;

				if let Err(err) = &result {
					obs::record_swallowed_failure(KIND, err);
				}

				obs::record_result(KIND, &result);
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn schedule_clamps_degenerate_durations() {
		let schedule = RenewSchedule { warmup: Duration::seconds(-5), interval: Duration::ZERO };

		assert_eq!(schedule.warmup(), std::time::Duration::ZERO);
		assert_eq!(schedule.interval(), RenewSchedule::MIN_INTERVAL);

		let schedule =
			RenewSchedule { warmup: Duration::minutes(1), interval: Duration::minutes(40) };

		assert_eq!(schedule.warmup(), std::time::Duration::from_secs(60));
		assert_eq!(schedule.interval(), std::time::Duration::from_secs(2_400));
	}
}
