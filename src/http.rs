//! Transport primitives for token exchanges and proxied calls.
//!
//! The module exposes [`ProxyHttpClient`], the relay's only dependency on an HTTP stack, and
//! [`ProxyResponse`], the fully-read response both the refresher and the proxy consume.
//! Implementations must read the body to completion before resolving so connections are
//! always released, even when the caller discards the response for a retry.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use http::{HeaderMap, StatusCode};
// self
use crate::{
	_prelude::*,
	error::{Endpoint, TransportError},
};

/// Request type accepted by [`ProxyHttpClient::execute`].
pub type HttpRequest = http::Request<Vec<u8>>;

/// Boxed future returned by [`ProxyHttpClient::execute`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ProxyResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports used for both the token endpoint and the upstream API.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by the
/// refresher, the proxy, and the background renewer of an instance. The returned future must
/// own whatever state it needs; dropping it aborts the in-flight exchange.
pub trait ProxyHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once the whole response body has been read.
	///
	/// `endpoint` labels transport failures so callers can tell token and API outages apart.
	fn execute(&self, endpoint: Endpoint, request: HttpRequest) -> HttpFuture<'_>;
}

/// Opaque upstream response relayed back to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyResponse {
	/// Upstream status code.
	pub status: StatusCode,
	/// Upstream headers, relayed verbatim.
	pub headers: HeaderMap,
	/// Fully-read upstream body.
	pub body: Vec<u8>,
}
impl ProxyResponse {
	/// Creates a response with no headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ProxyHttpClient for ReqwestHttpClient {
	fn execute(&self, endpoint: Endpoint, request: HttpRequest) -> HttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)
				.map_err(|e| TransportError::network(endpoint, e))?;
			let response =
				client.execute(request).await.map_err(|e| TransportError::network(endpoint, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(|e| TransportError::network(endpoint, e))?.to_vec();

			Ok(ProxyResponse { status, headers, body })
		})
	}
}
