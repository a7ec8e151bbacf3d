//! Secret wrappers that redact token material.

// self
use crate::_prelude::*;

/// Long-lived refresh credential read from secure settings; redacted in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(String);
impl RefreshToken {
	/// Wraps a new refresh credential.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner credential. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for RefreshToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("RefreshToken").field(&"<redacted>").finish()
	}
}

/// Short-lived bearer issued by the token endpoint; redacted in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a new access token.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `Authorization` header value for this token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let access = AccessToken::new("tok-A");
		let refresh = RefreshToken::new("rt-1");

		assert_eq!(format!("{access:?}"), "AccessToken(\"<redacted>\")");
		assert_eq!(format!("{access}"), "<redacted>");
		assert_eq!(format!("{refresh:?}"), "RefreshToken(\"<redacted>\")");
		assert_eq!(access.bearer(), "Bearer tok-A");
	}
}
