//! Bearer-token relay for plugin backends: exchange a refresh token for access tokens, cache
//! them per instance, renew them in the background, and proxy resource calls with a debounced
//! retry when the upstream rejects the bearer.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod datasource;
pub mod error;
pub mod host;
pub mod http;
pub mod obs;
pub mod proxy;
pub mod settings;
pub mod token;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		datasource::ReqwestDatasource,
		host::InstanceSettings,
		settings::ProxyOptions,
	};

	/// Builds host settings pointing both the API and auth endpoints at `base_url`.
	pub fn test_settings(
		base_url: &str,
		api_postfix: &str,
		refresh_token: &str,
	) -> InstanceSettings {
		InstanceSettings::new(
			serde_json::json!({ "url": base_url, "apiPostfix": api_postfix }),
			[("token", refresh_token)],
		)
	}

	/// Options with renewal pushed far enough out that it never fires during a test.
	pub fn quiet_options() -> ProxyOptions {
		ProxyOptions::default()
			.with_renew_warmup(Duration::days(1))
			.with_renew_interval(Duration::days(1))
	}

	/// Constructs a [`ReqwestDatasource`] against an `httpmock` server URL.
	pub fn build_reqwest_test_datasource(
		base_url: &str,
		api_postfix: &str,
		refresh_token: &str,
		options: ProxyOptions,
	) -> ReqwestDatasource {
		let settings = test_settings(base_url, api_postfix, refresh_token);

		ReqwestDatasource::with_options(&settings, options)
			.expect("Failed to build reqwest-backed datasource for tests.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
