//! Relay-level error types shared across the refresher, proxy, and dispatcher.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, body read).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Token endpoint refused the refresh token and explained why.
	#[error("{message}")]
	AuthRejected {
		/// HTTP status returned by the token endpoint.
		status: u16,
		/// Provider-supplied `message` field.
		message: String,
	},
	/// Token endpoint refused the refresh token without a usable error envelope.
	#[error("Failed to fetch token, status: {status}, response: {body}")]
	AuthFailed {
		/// HTTP status returned by the token endpoint.
		status: u16,
		/// Raw response body, lossily decoded.
		body: String,
	},
	/// Token endpoint answered 200 but the body held no token.
	#[error("Token endpoint returned an empty access token.")]
	EmptyToken,
	/// Token endpoint answered 200 with JSON that is neither a string nor an access-token object.
	#[error("Token endpoint returned JSON without an access token.")]
	UnexpectedTokenBody,
	/// The host cancelled the inbound call before it completed.
	#[error("Resource call was cancelled.")]
	Cancelled,
	/// A panic escaped while servicing a single call.
	#[error("Unexpected fault while handling the resource call: {message}")]
	Fault {
		/// Panic payload rendered as text.
		message: String,
	},
}
impl Error {
	/// HTTP status used when this error is reported back through a resource response.
	pub fn status(&self) -> u16 {
		match self {
			Self::Fault { .. } => 500,
			_ => 400,
		}
	}
}

/// Configuration and validation failures raised while building an instance.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// Settings JSON could not be parsed.
	#[error("Datasource settings are invalid at `{path}`.")]
	InvalidSettings {
		/// Field path where parsing failed.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// A configured base URL cannot be parsed.
	#[error("Configured {field} `{value}` is not a valid URL.")]
	InvalidUrl {
		/// Settings field that carried the URL.
		field: &'static str,
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Secure settings carry no refresh token.
	#[error("Secure settings are missing the refresh token.")]
	MissingRefreshToken,
	/// Refresh request body could not be serialized.
	#[error("Refresh request body could not be encoded.")]
	EncodeBody(#[source] serde_json::Error),
	/// Background renewal period must be positive.
	#[error("The renew interval must be positive.")]
	NonPositiveRenewInterval,
	/// Background renewal needs a tokio runtime at construction time.
	#[error("No tokio runtime is available to host the token renewer.")]
	NoRuntime,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::InvalidSettings { path, source: e.into_inner() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Which upstream was being called.
		endpoint: Endpoint,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: Endpoint,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

/// Upstream endpoint a transport failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
	/// `POST {auth}/api/v2/access-token`.
	Token,
	/// Proxied upstream API call.
	Api,
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Token => f.write_str("the token endpoint"),
			Self::Api => f.write_str("the upstream API"),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn auth_rejected_displays_provider_message_verbatim() {
		let err = Error::AuthRejected { status: 403, message: "refresh token revoked".into() };

		assert_eq!(err.to_string(), "refresh token revoked");
		assert_eq!(err.status(), 400);
	}

	#[test]
	fn faults_map_to_server_error_status() {
		let err = Error::Fault { message: "boom".into() };

		assert_eq!(err.status(), 500);
		assert!(err.to_string().contains("boom"));
	}

	#[test]
	fn settings_errors_keep_the_failing_path() {
		let de = &mut serde_json::Deserializer::from_str(r#"{"url": 7}"#);
		let err = serde_path_to_error::deserialize::<_, HashMap<String, String>>(de)
			.expect_err("Numeric url should fail to deserialize as a string.");
		let config = ConfigError::from(err);

		assert!(matches!(&config, ConfigError::InvalidSettings { path, .. } if path == "url"));
		assert!(StdError::source(&config).is_some());
	}
}
