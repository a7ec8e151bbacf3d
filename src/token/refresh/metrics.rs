// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token refreshes and debounced retries of one instance.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	debounced: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of calls made to the token endpoint.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that stored a new token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refreshes (transport, rejection, or empty token).
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns how many reactive refreshes the debounce window suppressed.
	pub fn debounced(&self) -> u64 {
		self.debounced.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_debounced(&self) {
		self.debounced.fetch_add(1, Ordering::Relaxed);
	}
}
