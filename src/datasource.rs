//! Per-instance datasource: wires the cache, refresher, proxy, and renewer together and services
//! host resource calls.
//!
//! Every call produces exactly one [`ResourceResponse`]. Failures from either route, host
//! cancellation, and panics raised while servicing a call are all converted into JSON error
//! responses at this boundary so one bad request never takes the instance down.

// std
use std::{any::Any, panic::AssertUnwindSafe};
// crates.io
use futures::FutureExt;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	host::{
		CallContext, CallResourceHandler, CallResourceResponseSender, HandlerFuture,
		InstanceDisposer, InstanceSettings, ResourceRequest, ResourceResponse,
	},
	http::ProxyHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	proxy::{ProxyRequest, RequestProxy},
	settings::{ProxyOptions, Settings},
	token::{RefreshMetrics, Renewer, RenewerHandle, TokenCache, TokenRefresher},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Datasource specialized for the crate's default reqwest transport.
pub type ReqwestDatasource = Datasource<ReqwestHttpClient>;

/// One configured relay instance.
///
/// Construction parses the host settings and starts the background renewer on the current
/// tokio runtime; the renewer stops on [`InstanceDisposer::dispose`] or when the datasource is
/// dropped.
pub struct Datasource<C>
where
	C: ?Sized + ProxyHttpClient,
{
	refresher: Arc<TokenRefresher<C>>,
	proxy: RequestProxy<C>,
	renewer: RenewerHandle,
	options: ProxyOptions,
}
impl<C> Datasource<C>
where
	C: ?Sized + ProxyHttpClient,
{
	/// Creates an instance with a fresh token cache and the caller-provided transport.
	pub fn with_http_client(
		settings: &InstanceSettings,
		options: ProxyOptions,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self, ConfigError> {
		Self::with_cache(settings, options, http_client, Default::default())
	}

	/// Creates an instance around an existing token cache.
	pub fn with_cache(
		settings: &InstanceSettings,
		options: ProxyOptions,
		http_client: impl Into<Arc<C>>,
		cache: Arc<TokenCache>,
	) -> Result<Self, ConfigError> {
		let Settings { credentials, options } = Settings::parse(settings, options)?;
		let credentials = Arc::new(credentials);
		let http_client = http_client.into();
		let refresher = Arc::new(TokenRefresher::new(
			Arc::clone(&credentials),
			Arc::clone(&http_client),
			cache,
		));
		let proxy = RequestProxy::new(Arc::clone(&refresher), http_client, credentials, &options);
		let renewer = Renewer::spawn(Arc::clone(&refresher), options.renew_schedule())?;

		Ok(Self { refresher, proxy, renewer, options })
	}

	/// Token cache shared by calls and the renewer.
	pub fn cache(&self) -> &Arc<TokenCache> {
		self.refresher.cache()
	}

	/// Refresh counters for this instance.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		self.refresher.metrics()
	}

	/// Handle of the background renewer.
	pub fn renewer(&self) -> &RenewerHandle {
		&self.renewer
	}

	/// Effective options after settings overrides.
	pub fn options(&self) -> &ProxyOptions {
		&self.options
	}

	/// Services one resource call; errors come back as JSON error responses.
	pub async fn handle(&self, ctx: &CallContext, request: ResourceRequest) -> ResourceResponse {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "call_resource");
		let path = request.path.clone();
		let call = AssertUnwindSafe(self.route(request)).catch_unwind();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				tokio::select! {
					biased;
					_ = ctx.cancellation.cancelled() => Err(Error::Cancelled),
					outcome = call => outcome.unwrap_or_else(|payload| {
						Err(Error::Fault { message: panic_message(payload.as_ref()) })
					}),
				}
			})
			.await;

		obs::record_result(KIND, &result);

		match result {
			Ok(response) => response,
			Err(err) => {
				obs::record_call_failure(&path, &err);

				ResourceResponse::from_error(&err)
			},
		}
	}

	async fn route(&self, request: ResourceRequest) -> Result<ResourceResponse> {
		let request = ProxyRequest::from(&request);

		if request.is_token_path {
			let (_, response) = self.refresher.refresh_forwarded().await?;

			return Ok(response.into());
		}

		Ok(self.proxy.forward(&request).await?.into())
	}
}
#[cfg(feature = "reqwest")]
impl Datasource<ReqwestHttpClient> {
	/// Creates an instance with default options and a reqwest transport.
	pub fn new(settings: &InstanceSettings) -> Result<Self, ConfigError> {
		Self::with_options(settings, ProxyOptions::default())
	}

	/// Creates an instance with a reqwest transport, layering settings overrides over `options`.
	pub fn with_options(
		settings: &InstanceSettings,
		options: ProxyOptions,
	) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().build()?;

		Self::with_http_client(settings, options, ReqwestHttpClient::with_client(client))
	}
}
impl<C> CallResourceHandler for Datasource<C>
where
	C: ?Sized + ProxyHttpClient,
{
	fn call_resource<'a>(
		&'a self,
		ctx: &'a CallContext,
		request: ResourceRequest,
		sender: &'a mut dyn CallResourceResponseSender,
	) -> HandlerFuture<'a> {
		Box::pin(async move {
			let response = self.handle(ctx, request).await;

			sender.send(response)
		})
	}
}
impl<C> InstanceDisposer for Datasource<C>
where
	C: ?Sized + ProxyHttpClient,
{
	fn dispose(&self) {
		self.renewer.shutdown();
	}
}
impl<C> Debug for Datasource<C>
where
	C: ?Sized + ProxyHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Datasource")
			.field("proxy", &self.proxy)
			.field("renewer_running", &self.renewer.is_running())
			.finish()
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_owned()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"non-string panic payload".into()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::Method;
	// self
	use super::*;

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn call_resource_sends_once_and_dispose_stops_renewer() {
		// self
		use crate::_preludet::{build_reqwest_test_datasource, quiet_options};

		let server = httpmock::MockServer::start_async().await;
		let token = server
			.mock_async(|when, then| {
				when.method(httpmock::Method::POST).path("/api/v2/access-token");
				then.status(200).body("\"tok-A\"");
			})
			.await;
		let datasource =
			build_reqwest_test_datasource(&server.base_url(), "/api", "rt-1", quiet_options());
		let mut sent = Vec::new();

		datasource
			.call_resource(
				&CallContext::default(),
				ResourceRequest::new(Method::GET, "access-token"),
				&mut sent,
			)
			.await
			.expect("Sending into a vector should not fail.");
		token.assert_async().await;

		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].status, 200);
		assert!(datasource.renewer().is_running());

		datasource.dispose();

		for _ in 0..16 {
			if !datasource.renewer().is_running() {
				break;
			}

			tokio::task::yield_now().await;
		}

		assert!(!datasource.renewer().is_running());
	}

	#[test]
	fn panic_payloads_render_as_text() {
		let borrowed: Box<dyn Any + Send> = Box::new("boom");
		let owned: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
		let opaque: Box<dyn Any + Send> = Box::new(7_u8);

		assert_eq!(panic_message(borrowed.as_ref()), "boom");
		assert_eq!(panic_message(owned.as_ref()), "kaboom");
		assert_eq!(panic_message(opaque.as_ref()), "non-string panic payload");
	}
}
