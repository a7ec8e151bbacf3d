mod common;

// std
use std::sync::Arc;
// crates.io
use http::Method;
use serde_json::json;
use time::Duration;
// self
use bearer_relay::{
	datasource::Datasource,
	error::{ConfigError, Endpoint},
	host::{CallContext, CallResourceHandler, InstanceSettings, ResourceRequest},
};
use common::{
	BASE_URL, HangingTransport, ScriptedTransport, aged_cache, quiet_options, scripted_datasource,
	settings, status, token_ok,
};

fn error_message(body: &[u8]) -> String {
	let body: serde_json::Value =
		serde_json::from_slice(body).expect("Error body should be valid JSON.");

	body["error"].as_str().expect("Error body should carry a string message.").to_owned()
}

fn build(settings: &InstanceSettings) -> Result<Datasource<ScriptedTransport>, ConfigError> {
	let transport = ScriptedTransport::new(|_, _| status(200, ""));

	Datasource::with_http_client(settings, quiet_options(), transport)
}

#[tokio::test]
async fn panicking_transport_yields_fault_and_instance_survives() {
	let transport = ScriptedTransport::new(|endpoint, n| match (endpoint, n) {
		(Endpoint::Token, _) => token_ok("tok-A"),
		(Endpoint::Api, 0) => panic!("transport exploded"),
		(Endpoint::Api, _) => status(200, "ok"),
	});
	let datasource = scripted_datasource(&transport, quiet_options(), Default::default());
	let ctx = CallContext::default();
	let failed = datasource.handle(&ctx, ResourceRequest::new(Method::GET, "/widgets")).await;

	assert_eq!(failed.status, 500);
	assert!(error_message(&failed.body).contains("transport exploded"));

	let recovered = datasource.handle(&ctx, ResourceRequest::new(Method::GET, "/widgets")).await;

	assert_eq!(recovered.status, 200);
	assert_eq!(recovered.body, b"ok".to_vec());
	assert_eq!(datasource.cache().get(), "tok-A");
}

#[tokio::test]
async fn cancellation_aborts_in_flight_call() {
	let transport = Arc::new(HangingTransport);
	let datasource =
		scripted_datasource(&transport, quiet_options(), aged_cache("tok-A", Duration::seconds(1)));
	let ctx = CallContext::default();
	let cancellation = ctx.cancellation.clone();
	let (response, ()) = tokio::join!(
		datasource.handle(&ctx, ResourceRequest::new(Method::GET, "/widgets")),
		async move {
			tokio::task::yield_now().await;
			cancellation.cancel();
		},
	);

	assert_eq!(response.status, 400);
	assert_eq!(error_message(&response.body), "Resource call was cancelled.");
}

#[tokio::test]
async fn cancelled_context_skips_outbound_work() {
	let transport = ScriptedTransport::new(|_, _| token_ok("tok-A"));
	let datasource = scripted_datasource(&transport, quiet_options(), Default::default());
	let ctx = CallContext::default();

	ctx.cancellation.cancel();

	let response = datasource.handle(&ctx, ResourceRequest::new(Method::GET, "/widgets")).await;

	assert_eq!(response.status, 400);
	assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn call_resource_sends_error_responses_exactly_once() {
	let transport = ScriptedTransport::new(|endpoint, _| match endpoint {
		Endpoint::Token => status(500, "auth down"),
		Endpoint::Api => status(200, ""),
	});
	let datasource = scripted_datasource(&transport, quiet_options(), Default::default());
	let mut sent = Vec::new();

	datasource
		.call_resource(
			&CallContext::default(),
			ResourceRequest::new(Method::GET, "/widgets"),
			&mut sent,
		)
		.await
		.expect("Sending into a vector should not fail.");

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].status, 400);
	assert_eq!(
		error_message(&sent[0].body),
		"Failed to fetch token, status: 500, response: auth down"
	);
	assert_eq!(transport.calls(Endpoint::Api), 0);
}

#[tokio::test]
async fn malformed_settings_fail_construction() {
	let missing_url = InstanceSettings::new(json!({ "apiPostfix": "/api" }), [("token", "rt-1")]);
	let bad_url = settings("not a url", "/api", "rt-1");
	let no_token = InstanceSettings::new(json!({ "url": BASE_URL }), [("other", "x")]);
	let empty_token = settings(BASE_URL, "/api", "");
	let zero_interval = InstanceSettings::new(
		json!({ "url": BASE_URL, "renewIntervalMinutes": 0 }),
		[("token", "rt-1")],
	);

	assert!(matches!(build(&missing_url), Err(ConfigError::InvalidSettings { .. })));
	assert!(matches!(build(&bad_url), Err(ConfigError::InvalidUrl { field: "url", .. })));
	assert!(matches!(build(&no_token), Err(ConfigError::MissingRefreshToken)));
	assert!(matches!(build(&empty_token), Err(ConfigError::MissingRefreshToken)));
	assert!(matches!(build(&zero_interval), Err(ConfigError::NonPositiveRenewInterval)));
}

#[tokio::test]
async fn settings_overrides_reach_the_instance() {
	let settings = InstanceSettings::new(
		json!({
			"url": BASE_URL,
			"authUrl": "http://auth.test",
			"debounceSeconds": 5,
			"retryOn": [401, 419],
		}),
		[("token", "rt-1")],
	);
	let transport = ScriptedTransport::new(|endpoint, _| match endpoint {
		Endpoint::Token => token_ok("tok-A"),
		Endpoint::Api => status(200, ""),
	});
	let datasource = Datasource::<ScriptedTransport>::with_http_client(
		&settings,
		quiet_options(),
		Arc::clone(&transport),
	)
	.expect("Datasource should build with overrides.");

	assert_eq!(datasource.options().debounce_window, Duration::seconds(5));

	datasource.handle(&CallContext::default(), ResourceRequest::new(Method::GET, "/x")).await;

	let uris = transport.requests().into_iter().map(|r| r.uri).collect::<Vec<_>>();

	assert_eq!(uris, ["http://auth.test/api/v2/access-token", "http://relay.test/x"]);
}

#[test]
fn construction_requires_a_runtime() {
	let settings = settings(BASE_URL, "/api", "rt-1");

	assert!(matches!(build(&settings), Err(ConfigError::NoRuntime)));
}
