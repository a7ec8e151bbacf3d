//! Plugin-host contracts: the inbound resource call, the response sender, instance settings,
//! and the disposal hook.
//!
//! The host owns instance management and settings decryption; this module only describes the
//! narrow shapes the relay consumes from it ([`InstanceSettings`], [`ResourceRequest`],
//! [`CallContext`]) and the ones it hands back ([`ResourceResponse`] through a
//! [`CallResourceResponseSender`]).

// crates.io
use http::{HeaderMap, HeaderValue, Method, header::CONTENT_TYPE};
// self
use crate::{_prelude::*, http::ProxyResponse};

/// Boxed future returned by [`CallResourceHandler::call_resource`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Decrypted settings the host passes when it instantiates a datasource.
#[derive(Clone, Default)]
pub struct InstanceSettings {
	/// Raw plain-text settings JSON (`url`, `apiPostfix`, tuning knobs).
	pub json_data: Vec<u8>,
	/// Secure settings after host-side decryption (`token` holds the refresh token).
	pub decrypted_secure_json_data: HashMap<String, String>,
}
impl InstanceSettings {
	/// Builds settings from a JSON document and secure key/value pairs.
	pub fn new<K, V>(
		json_data: serde_json::Value,
		secure: impl IntoIterator<Item = (K, V)>,
	) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			json_data: json_data.to_string().into_bytes(),
			decrypted_secure_json_data: secure
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}
impl Debug for InstanceSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InstanceSettings")
			.field("json_data", &String::from_utf8_lossy(&self.json_data))
			.field("secure_keys", &self.decrypted_secure_json_data.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Per-call context supplied by the host.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
	/// Fires when the host abandons the call.
	pub cancellation: CancellationToken,
}
impl CallContext {
	/// Creates a context bound to the provided cancellation token.
	pub fn with_cancellation(cancellation: CancellationToken) -> Self {
		Self { cancellation }
	}
}

/// Inbound resource call as delivered by the host.
#[derive(Clone, Debug)]
pub struct ResourceRequest {
	/// HTTP method of the front-end call.
	pub method: Method,
	/// Resource path relative to the datasource (e.g. `access-token`, `widgets`).
	pub path: String,
	/// Resource path plus query string, used to build the upstream URL.
	pub url: String,
	/// Front-end request headers.
	///
	/// Never forwarded upstream; proxied calls carry only the relay's own `Authorization` and
	/// `Content-Type`.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Vec<u8>,
}
impl ResourceRequest {
	/// Creates a request whose URL suffix equals its path.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		let path = path.into();

		Self { method, url: path.clone(), path, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Overrides the URL suffix (path plus query string).
	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();

		self
	}

	/// Attaches a request body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}
}

/// Response handed back to the host for one resource call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Vec<u8>,
}
impl ResourceResponse {
	/// Renders an error as `{"error": "<message>"}` with the error's status.
	pub fn from_error(err: &Error) -> Self {
		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		let body = serde_json::json!({ "error": err.to_string() }).to_string().into_bytes();

		Self { status: err.status(), headers, body }
	}

	/// Returns `true` when the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}
impl From<ProxyResponse> for ResourceResponse {
	fn from(response: ProxyResponse) -> Self {
		Self { status: response.status.as_u16(), headers: response.headers, body: response.body }
	}
}

/// Channel the host provides to receive the single response of a call.
pub trait CallResourceResponseSender
where
	Self: Send,
{
	/// Delivers the response; errors mean the host could not accept it.
	fn send(&mut self, response: ResourceResponse) -> Result<()>;
}
impl CallResourceResponseSender for Vec<ResourceResponse> {
	fn send(&mut self, response: ResourceResponse) -> Result<()> {
		self.push(response);

		Ok(())
	}
}

/// Host-facing handler for `/resources/*` calls.
pub trait CallResourceHandler
where
	Self: Send + Sync,
{
	/// Services one resource call, invoking `sender` exactly once unless an error is returned.
	fn call_resource<'a>(
		&'a self,
		ctx: &'a CallContext,
		request: ResourceRequest,
		sender: &'a mut dyn CallResourceResponseSender,
	) -> HandlerFuture<'a>;
}

/// Hook the host invokes before discarding an instance.
pub trait InstanceDisposer {
	/// Releases instance-owned background work.
	fn dispose(&self);
}
