#![allow(dead_code)]

// std
use std::{future, sync::Arc};
// crates.io
use http::{
	Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use bearer_relay::{
	datasource::Datasource,
	error::Endpoint,
	host::InstanceSettings,
	http::{HttpFuture, HttpRequest, ProxyHttpClient, ProxyResponse},
	settings::ProxyOptions,
	token::TokenCache,
};

type Handler = dyn Fn(Endpoint, usize) -> ProxyResponse + Send + Sync;

/// Request as observed by a [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct Recorded {
	pub endpoint: Endpoint,
	pub method: Method,
	pub uri: String,
	pub authorization: Option<String>,
	pub content_type: Option<String>,
	pub header_names: Vec<String>,
	pub body: Vec<u8>,
}

/// In-memory transport answering from a closure keyed by endpoint and per-endpoint call index.
pub struct ScriptedTransport {
	handler: Box<Handler>,
	requests: Mutex<Vec<Recorded>>,
}
impl ScriptedTransport {
	pub fn new<F>(handler: F) -> Arc<Self>
	where
		F: 'static + Fn(Endpoint, usize) -> ProxyResponse + Send + Sync,
	{
		Arc::new(Self { handler: Box::new(handler), requests: Default::default() })
	}

	pub fn requests(&self) -> Vec<Recorded> {
		self.requests.lock().clone()
	}

	pub fn calls(&self, endpoint: Endpoint) -> usize {
		self.requests.lock().iter().filter(|r| r.endpoint == endpoint).count()
	}

	pub fn api_bearers(&self) -> Vec<Option<String>> {
		self.requests
			.lock()
			.iter()
			.filter(|r| r.endpoint == Endpoint::Api)
			.map(|r| r.authorization.clone())
			.collect()
	}
}
impl ProxyHttpClient for ScriptedTransport {
	fn execute(&self, endpoint: Endpoint, request: HttpRequest) -> HttpFuture<'_> {
		let index = self.calls(endpoint);
		let header = |name| {
			request.headers().get(name).and_then(|v| v.to_str().ok()).map(ToOwned::to_owned)
		};
		let recorded = Recorded {
			endpoint,
			method: request.method().clone(),
			uri: request.uri().to_string(),
			authorization: header(AUTHORIZATION),
			content_type: header(CONTENT_TYPE),
			header_names: request.headers().keys().map(|name| name.as_str().to_owned()).collect(),
			body: request.body().clone(),
		};

		self.requests.lock().push(recorded);

		let response = (self.handler)(endpoint, index);

		Box::pin(async move { Ok(response) })
	}
}

/// Transport whose calls never complete.
#[derive(Debug, Default)]
pub struct HangingTransport;
impl ProxyHttpClient for HangingTransport {
	fn execute(&self, _endpoint: Endpoint, _request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(future::pending())
	}
}

pub const BASE_URL: &str = "http://relay.test";

pub fn settings(base_url: &str, api_postfix: &str, refresh_token: &str) -> InstanceSettings {
	InstanceSettings::new(
		serde_json::json!({ "url": base_url, "apiPostfix": api_postfix }),
		[("token", refresh_token)],
	)
}

/// Options whose renewer never fires within a test.
pub fn quiet_options() -> ProxyOptions {
	ProxyOptions::default()
		.with_renew_warmup(Duration::days(1))
		.with_renew_interval(Duration::days(1))
}

/// Cache holding `token` refreshed `age` ago.
pub fn aged_cache(token: &str, age: Duration) -> Arc<TokenCache> {
	Arc::new(TokenCache::with_token(token, OffsetDateTime::now_utc() - age))
}

pub fn token_ok(token: &str) -> ProxyResponse {
	ProxyResponse::new(StatusCode::OK, format!("\"{token}\""))
}

pub fn status(code: u16, body: &str) -> ProxyResponse {
	ProxyResponse::new(
		StatusCode::from_u16(code).expect("Test status code should be valid."),
		body.to_owned(),
	)
}

pub fn scripted_datasource<C>(
	transport: &Arc<C>,
	options: ProxyOptions,
	cache: Arc<TokenCache>,
) -> Datasource<C>
where
	C: ProxyHttpClient,
{
	let settings = settings(BASE_URL, "/api", "rt-1");

	Datasource::with_cache(&settings, options, Arc::clone(transport), cache)
		.expect("Scripted datasource should build.")
}
