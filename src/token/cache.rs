//! Per-instance access-token cache shared by concurrent calls and the background renewer.
//!
//! An empty value means "no valid token"; whoever observes it refreshes before proceeding.
//! The lock only guards the stored value, never the HTTP exchange that produces a new one, so
//! two callers may refresh concurrently and the last writer wins.

// self
use crate::_prelude::*;

/// Snapshot of the cached token and the instant it was last refreshed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CachedToken {
	/// Current bearer value; empty when absent.
	pub value: String,
	/// Instant of the last successful refresh, if any.
	pub fetched_at: Option<OffsetDateTime>,
}
impl CachedToken {
	/// Returns `true` when no usable token is held.
	pub fn is_empty(&self) -> bool {
		self.value.is_empty()
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("value", &if self.is_empty() { "<empty>" } else { "<redacted>" })
			.field("fetched_at", &self.fetched_at)
			.finish()
	}
}

/// Read/write-locked token slot; readers never block each other.
#[derive(Debug, Default)]
pub struct TokenCache(RwLock<CachedToken>);
impl TokenCache {
	/// Builds a cache pre-seeded with a token refreshed at `fetched_at`.
	pub fn with_token(value: impl Into<String>, fetched_at: OffsetDateTime) -> Self {
		Self(RwLock::new(CachedToken { value: value.into(), fetched_at: Some(fetched_at) }))
	}

	/// Current token value, or an empty string when none is cached.
	pub fn get(&self) -> String {
		self.0.read().value.clone()
	}

	/// Copies the value and refresh timestamp under one read lock.
	pub fn snapshot(&self) -> CachedToken {
		self.0.read().clone()
	}

	/// Overwrites the token and records the current instant as the refresh time.
	pub fn set(&self, value: impl Into<String>) {
		self.set_at(value, OffsetDateTime::now_utc());
	}

	/// Overwrites the token, recording `fetched_at` as the refresh time.
	pub fn set_at(&self, value: impl Into<String>, fetched_at: OffsetDateTime) {
		*self.0.write() = CachedToken { value: value.into(), fetched_at: Some(fetched_at) };
	}

	/// Drops the token; the refresh timestamp is kept for debouncing.
	pub fn clear(&self) {
		self.0.write().value.clear();
	}

	/// Clears the token only if it still equals `stale`, leaving a concurrent refresh intact.
	///
	/// Returns `true` when the cache was cleared.
	pub fn invalidate(&self, stale: &str) -> bool {
		let mut guard = self.0.write();

		if guard.value == stale {
			guard.value.clear();

			true
		} else {
			false
		}
	}

	/// Time elapsed between the last successful refresh and `now`, if any refresh happened.
	pub fn elapsed_since_refresh(&self, now: OffsetDateTime) -> Option<Duration> {
		self.0.read().fetched_at.map(|at| now - at)
	}
}
