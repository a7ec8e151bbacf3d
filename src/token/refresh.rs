//! Refresh-token exchange against `{auth}/api/v2/access-token`.
//!
//! [`TokenRefresher::refresh`] posts `{"refreshToken": ..}` to the auth endpoint. A 200 body is
//! read as the bare access token and written to the [`TokenCache`]; any other status becomes a
//! typed [`Error`], preferring the provider's `{"message": ..}` envelope when it has one.
//! Nothing is retried here: the proxy owns the single reactive retry and the renewer owns the
//! periodic one.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, Endpoint},
	http::{ProxyHttpClient, ProxyResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	settings::Credentials,
	token::{AccessToken, TokenCache},
};

/// Exchanges the instance's refresh token for access tokens and caches them.
pub struct TokenRefresher<C>
where
	C: ?Sized + ProxyHttpClient,
{
	credentials: Arc<Credentials>,
	http_client: Arc<C>,
	cache: Arc<TokenCache>,
	metrics: Arc<RefreshMetrics>,
}
impl<C> TokenRefresher<C>
where
	C: ?Sized + ProxyHttpClient,
{
	/// Creates a refresher writing into `cache`.
	pub fn new(
		credentials: Arc<Credentials>,
		http_client: Arc<C>,
		cache: Arc<TokenCache>,
	) -> Self {
		Self { credentials, http_client, cache, metrics: Default::default() }
	}

	/// Cache this refresher writes to.
	pub fn cache(&self) -> &Arc<TokenCache> {
		&self.cache
	}

	/// Refresh counters for this instance.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Performs one refresh-token exchange and stores the resulting token.
	pub async fn refresh(&self) -> Result<AccessToken> {
		self.observe("store", async { self.exchange().await.map(|(token, _)| token) }).await
	}

	/// Like [`TokenRefresher::refresh`], but also hands back the unmodified token-endpoint
	/// response so it can be relayed to the caller.
	pub async fn refresh_forwarded(&self) -> Result<(AccessToken, ProxyResponse)> {
		self.observe("forward", self.exchange()).await
	}

	async fn observe<T, Fut>(&self, stage: &'static str, exchange: Fut) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, stage);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(exchange).await;

		match &result {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		obs::record_result(KIND, &result);

		result
	}

	async fn exchange(&self) -> Result<(AccessToken, ProxyResponse)> {
		let body = serde_json::to_vec(&RefreshRequestBody {
			refresh_token: self.credentials.refresh_token.expose(),
		})
		.map_err(ConfigError::EncodeBody)?;
		let request = http::Request::builder()
			.method(Method::POST)
			.uri(self.credentials.token_endpoint())
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.body(body)
			.map_err(ConfigError::from)?;
		let response = self.http_client.execute(Endpoint::Token, request).await?;

		if response.status != StatusCode::OK {
			return Err(rejection(&response));
		}

		let token = parse_token_body(&response.body)?;

		self.cache.set(token.expose());

		Ok((token, response))
	}
}
impl<C> Debug for TokenRefresher<C>
where
	C: ?Sized + ProxyHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefresher")
			.field("token_endpoint", &self.credentials.token_endpoint())
			.field("cache", &self.cache)
			.finish()
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequestBody<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenBody {
	Bare(String),
	Envelope {
		#[serde(rename = "accessToken", alias = "access_token")]
		access_token: String,
	},
}

#[derive(Deserialize)]
struct ErrorEnvelope {
	#[serde(default)]
	message: String,
}

/// Extracts the bearer from a 200 body: a JSON string, a `{accessToken}` object, or (for
/// non-JSON bodies only) the raw text with surrounding quotes stripped.
fn parse_token_body(body: &[u8]) -> Result<AccessToken> {
	let token = match serde_json::from_slice::<serde_json::Value>(body) {
		Ok(value) => match serde_json::from_value::<TokenBody>(value) {
			Ok(TokenBody::Bare(token)) | Ok(TokenBody::Envelope { access_token: token }) => token,
			Err(_) => return Err(Error::UnexpectedTokenBody),
		},
		Err(_) => String::from_utf8_lossy(body).trim().trim_matches('"').to_owned(),
	};

	if token.is_empty() {
		return Err(Error::EmptyToken);
	}

	Ok(AccessToken::new(token))
}

fn rejection(response: &ProxyResponse) -> Error {
	let status = response.status.as_u16();

	match serde_json::from_slice::<ErrorEnvelope>(&response.body) {
		Ok(envelope) if !envelope.message.is_empty() =>
			Error::AuthRejected { status, message: envelope.message },
		_ => Error::AuthFailed { status, body: response.text() },
	}
}
