//! Request proxy: attaches the cached bearer, forwards to the upstream API, and performs at most
//! one debounced refresh-and-retry when the upstream rejects the token.
//!
//! The retry decision is two-fold: the [`RetryPolicy`] must classify the status as an
//! authorization failure, and the last successful refresh must be older than the debounce
//! window. The window bounds refreshes to one per window no matter how many calls observe a
//! sustained outage.

// crates.io
use http::{
	HeaderValue, Method,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, Endpoint},
	host::ResourceRequest,
	http::{ProxyHttpClient, ProxyResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	settings::{Credentials, ProxyOptions, RetryPolicy},
	token::{AccessToken, TokenRefresher},
};

/// Reserved resource path that mints a token for the caller instead of proxying.
pub const ACCESS_TOKEN_PATH: &str = "access-token";

/// Returns `true` when `path` names the reserved token resource (a leading `/` is ignored).
pub fn is_token_path(path: &str) -> bool {
	path.trim_start_matches('/') == ACCESS_TOKEN_PATH
}

/// Upstream call derived from an inbound resource request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyRequest {
	/// HTTP method, copied verbatim.
	pub method: Method,
	/// URL suffix appended to `api_base_url + api_path_prefix`.
	pub path: String,
	/// Inbound body; dropped for GET.
	pub body: Vec<u8>,
	/// Whether the inbound call targeted the reserved token path.
	pub is_token_path: bool,
}
impl ProxyRequest {
	/// Creates a request, deriving the token-path flag from `path`.
	pub fn new(method: Method, path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
		let path = path.into();

		Self { is_token_path: is_token_path(&path), method, path, body: body.into() }
	}

	/// Body sent upstream: empty for GET whatever the caller supplied.
	pub fn outbound_body(&self) -> Vec<u8> {
		if self.method == Method::GET { Vec::new() } else { self.body.clone() }
	}
}
impl From<&ResourceRequest> for ProxyRequest {
	fn from(request: &ResourceRequest) -> Self {
		Self {
			method: request.method.clone(),
			path: request.url.clone(),
			body: request.body.clone(),
			is_token_path: is_token_path(&request.path),
		}
	}
}

/// Forwards resource calls upstream with the instance's cached bearer.
pub struct RequestProxy<C>
where
	C: ?Sized + ProxyHttpClient,
{
	refresher: Arc<TokenRefresher<C>>,
	http_client: Arc<C>,
	credentials: Arc<Credentials>,
	debounce_window: Duration,
	retry_policy: RetryPolicy,
}
impl<C> RequestProxy<C>
where
	C: ?Sized + ProxyHttpClient,
{
	/// Creates a proxy sharing `refresher`'s cache.
	pub fn new(
		refresher: Arc<TokenRefresher<C>>,
		http_client: Arc<C>,
		credentials: Arc<Credentials>,
		options: &ProxyOptions,
	) -> Self {
		Self {
			refresher,
			http_client,
			credentials,
			debounce_window: options.debounce_window,
			retry_policy: options.retry_policy.clone(),
		}
	}

	/// Sends `request` upstream, refreshing first if no token is cached and retrying once after
	/// a debounced reactive refresh.
	pub async fn forward(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
		const KIND: FlowKind = FlowKind::Proxy;

		let span = FlowSpan::new(KIND, "forward");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.forward_with_retry(request)).await;

		obs::record_result(KIND, &result);

		result
	}

	async fn forward_with_retry(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
		let cache = self.refresher.cache();
		let mut token = AccessToken::new(cache.get());

		if token.expose().is_empty() {
			token = self.refresher.refresh().await?;
		}

		let response = self.send(request, &token).await?;

		if !self.retry_policy.is_auth_failure(response.status) {
			return Ok(response);
		}

		let since_refresh = cache.elapsed_since_refresh(OffsetDateTime::now_utc());

		if since_refresh.is_some_and(|elapsed| elapsed <= self.debounce_window) {
			self.refresher.metrics().record_debounced();
			obs::record_flow_outcome(FlowKind::Proxy, FlowOutcome::Debounced);
			obs::record_debounced_refresh(response.status.as_u16(), since_refresh);

			return Ok(response);
		}

		// The rejected response was fully read by the transport; only the retry is relayed.
		drop(response);

		let refreshed = match self.refresher.refresh().await {
			Ok(refreshed) => refreshed,
			Err(err) => {
				cache.invalidate(token.expose());

				return Err(err);
			},
		};

		obs::record_flow_outcome(FlowKind::Proxy, FlowOutcome::Retry);

		self.send(request, &refreshed).await
	}

	async fn send(&self, request: &ProxyRequest, token: &AccessToken) -> Result<ProxyResponse> {
		let outbound = http::Request::builder()
			.method(request.method.clone())
			.uri(self.credentials.api_url(&request.path))
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.header(AUTHORIZATION, token.bearer())
			.body(request.outbound_body())
			.map_err(ConfigError::from)?;

		Ok(self.http_client.execute(Endpoint::Api, outbound).await?)
	}
}
impl<C> Debug for RequestProxy<C>
where
	C: ?Sized + ProxyHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestProxy")
			.field("api_base_url", &self.credentials.api_base_url)
			.field("api_path_prefix", &self.credentials.api_path_prefix)
			.field("debounce_window", &self.debounce_window)
			.field("retry_policy", &self.retry_policy)
			.finish()
	}
}
