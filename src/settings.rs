//! Instance settings: credentials parsed from host-decrypted JSON plus relay tuning knobs.
//!
//! `json_data` carries `url` and `apiPostfix` (and optionally `authUrl`, `retryOn`,
//! `debounceSeconds`, `renewIntervalMinutes`, `renewWarmupSeconds`); the refresh token lives in
//! the secure map under `token`. Parsing goes through `serde_path_to_error` so a malformed
//! document names the failing field and fails instance construction before any request is
//! handled.

// crates.io
use http::StatusCode;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	host::InstanceSettings,
	token::{RefreshToken, RenewSchedule},
};

/// Path appended to the auth base URL for refresh-token exchanges.
pub const TOKEN_ENDPOINT_PATH: &str = "/api/v2/access-token";
/// Secure settings key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "token";

/// Upstream locations and the long-lived credential for one datasource instance.
#[derive(Clone, Debug)]
pub struct Credentials {
	/// Base URL of the auth service (defaults to the API base URL).
	pub auth_base_url: String,
	/// Base URL of the upstream API.
	pub api_base_url: String,
	/// Prefix inserted between the API base URL and the proxied path.
	pub api_path_prefix: String,
	/// Long-lived refresh credential.
	pub refresh_token: RefreshToken,
}
impl Credentials {
	/// Validates both base URLs and builds the credential set.
	pub fn new(
		auth_base_url: impl Into<String>,
		api_base_url: impl Into<String>,
		api_path_prefix: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let api_base_url = validate_url("url", api_base_url.into())?;
		let auth_base_url = validate_url("authUrl", auth_base_url.into())?;
		let refresh_token = refresh_token.into();

		if refresh_token.is_empty() {
			return Err(ConfigError::MissingRefreshToken);
		}

		Ok(Self {
			auth_base_url,
			api_base_url,
			api_path_prefix: api_path_prefix.into(),
			refresh_token: RefreshToken::new(refresh_token),
		})
	}

	/// Full URL of the refresh-token exchange endpoint.
	pub fn token_endpoint(&self) -> String {
		format!("{}{TOKEN_ENDPOINT_PATH}", self.auth_base_url)
	}

	/// Upstream URL for a proxied call: base + prefix + suffix, concatenated verbatim.
	pub fn api_url(&self, suffix: &str) -> String {
		format!("{}{}{suffix}", self.api_base_url, self.api_path_prefix)
	}
}

/// Decides which upstream statuses count as an authorization failure worth a reactive refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RetryPolicyRepr")]
pub enum RetryPolicy {
	/// Only `401 Unauthorized`.
	#[default]
	Unauthorized,
	/// Any status outside the 2xx range.
	NonSuccess,
	/// An explicit status list.
	Statuses(BTreeSet<u16>),
}
impl RetryPolicy {
	/// Returns `true` when `status` should trigger the (debounced) refresh-and-retry.
	pub fn is_auth_failure(&self, status: StatusCode) -> bool {
		match self {
			Self::Unauthorized => status == StatusCode::UNAUTHORIZED,
			Self::NonSuccess => !status.is_success(),
			Self::Statuses(codes) => codes.contains(&status.as_u16()),
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RetryPolicyRepr {
	Named(RetryPolicyName),
	Statuses(BTreeSet<u16>),
}
impl From<RetryPolicyRepr> for RetryPolicy {
	fn from(repr: RetryPolicyRepr) -> Self {
		match repr {
			RetryPolicyRepr::Named(RetryPolicyName::Unauthorized) => Self::Unauthorized,
			RetryPolicyRepr::Named(RetryPolicyName::NonSuccess) => Self::NonSuccess,
			RetryPolicyRepr::Statuses(codes) => Self::Statuses(codes),
		}
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
enum RetryPolicyName {
	Unauthorized,
	NonSuccess,
}

/// Timing and retry knobs for one instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyOptions {
	/// Minimum time since the last successful refresh before a reactive refresh may run.
	pub debounce_window: Duration,
	/// Delay before the background renewer's first cycle is scheduled.
	pub renew_warmup: Duration,
	/// Period between background renewals.
	pub renew_interval: Duration,
	/// Status predicate for reactive refreshes.
	pub retry_policy: RetryPolicy,
}
impl ProxyOptions {
	const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::minutes(2);
	const DEFAULT_RENEW_INTERVAL: Duration = Duration::minutes(40);
	const DEFAULT_RENEW_WARMUP: Duration = Duration::minutes(1);

	/// Overrides the debounce window (negative values clamp to zero).
	pub fn with_debounce_window(mut self, window: Duration) -> Self {
		self.debounce_window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Overrides the renewer warm-up delay (negative values clamp to zero).
	pub fn with_renew_warmup(mut self, warmup: Duration) -> Self {
		self.renew_warmup = if warmup.is_negative() { Duration::ZERO } else { warmup };

		self
	}

	/// Overrides the renewer period.
	pub fn with_renew_interval(mut self, interval: Duration) -> Self {
		self.renew_interval = interval;

		self
	}

	/// Overrides the reactive-refresh status predicate.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Schedule handed to the background renewer.
	pub fn renew_schedule(&self) -> RenewSchedule {
		RenewSchedule { warmup: self.renew_warmup, interval: self.renew_interval }
	}

	fn validate(self) -> Result<Self, ConfigError> {
		if !self.renew_interval.is_positive() {
			return Err(ConfigError::NonPositiveRenewInterval);
		}

		Ok(self)
	}
}
impl Default for ProxyOptions {
	fn default() -> Self {
		Self {
			debounce_window: Self::DEFAULT_DEBOUNCE_WINDOW,
			renew_warmup: Self::DEFAULT_RENEW_WARMUP,
			renew_interval: Self::DEFAULT_RENEW_INTERVAL,
			retry_policy: RetryPolicy::default(),
		}
	}
}

/// Fully parsed instance configuration.
#[derive(Clone, Debug)]
pub struct Settings {
	/// Credentials and upstream locations.
	pub credentials: Credentials,
	/// Effective tuning knobs.
	pub options: ProxyOptions,
}
impl Settings {
	/// Parses host settings, layering any tuning fields found in `json_data` over `base`.
	pub fn parse(settings: &InstanceSettings, base: ProxyOptions) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_slice(&settings.json_data);
		let json: JsonData = serde_path_to_error::deserialize(de)?;
		let refresh_token = settings
			.decrypted_secure_json_data
			.get(REFRESH_TOKEN_KEY)
			.cloned()
			.unwrap_or_default();
		let auth_base_url = json.auth_url.clone().unwrap_or_else(|| json.url.clone());
		let credentials = Credentials::new(
			auth_base_url,
			json.url.clone(),
			json.api_postfix.clone(),
			refresh_token,
		)?;
		let options = json.apply(base).validate()?;

		Ok(Self { credentials, options })
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonData {
	url: String,
	#[serde(default)]
	api_postfix: String,
	#[serde(default)]
	auth_url: Option<String>,
	#[serde(default)]
	retry_on: Option<RetryPolicy>,
	#[serde(default)]
	debounce_seconds: Option<u32>,
	#[serde(default)]
	renew_interval_minutes: Option<u32>,
	#[serde(default)]
	renew_warmup_seconds: Option<u32>,
}
impl JsonData {
	fn apply(self, mut options: ProxyOptions) -> ProxyOptions {
		if let Some(policy) = self.retry_on {
			options.retry_policy = policy;
		}
		if let Some(secs) = self.debounce_seconds {
			options.debounce_window = Duration::seconds(i64::from(secs));
		}
		if let Some(mins) = self.renew_interval_minutes {
			options.renew_interval = Duration::minutes(i64::from(mins));
		}
		if let Some(secs) = self.renew_warmup_seconds {
			options.renew_warmup = Duration::seconds(i64::from(secs));
		}

		options
	}
}

fn validate_url(field: &'static str, value: String) -> Result<String, ConfigError> {
	match Url::parse(&value) {
		Ok(_) => Ok(value),
		Err(source) => Err(ConfigError::InvalidUrl { field, value, source }),
	}
}
