//! Service-level error types shared across flows, stores, and the HTTP surface.

// self
use crate::{
	_prelude::*, accounts::AccountStoreError, auth::Provider, provider::ProviderDescriptorError,
	store::StoreError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Each variant maps onto exactly one HTTP status through [`Error::status`]; callers at the
/// HTTP boundary never inspect messages to decide how to respond.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential store could not be reached or timed out.
	#[error("Credential store is unavailable: {0}")]
	StoreUnavailable(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Relational account store failure outside of a deletion.
	#[error(transparent)]
	Accounts(#[from] AccountStoreError),

	/// Request was missing required input or is otherwise malformed.
	#[error("Invalid request: {reason}.")]
	InvalidRequest {
		/// Human-readable reason string.
		reason: String,
	},
	/// Callback state is unknown, expired, or already consumed.
	#[error("OAuth state is invalid or has expired.")]
	InvalidOrExpiredState,
	/// Provider rejected the authorization code or the token endpoint misbehaved.
	#[error("Authorization code exchange failed: {reason}.")]
	TokenExchangeFailed {
		/// Provider- or transport-supplied reason string.
		reason: String,
	},
	/// Profile endpoint failed or returned an unusable profile.
	#[error("Profile fetch failed: {reason}.")]
	ProfileFetchFailed {
		/// Provider- or transport-supplied reason string.
		reason: String,
	},
	/// Bearer credential is missing, invalid, expired, or its principal no longer exists.
	#[error("Authentication required: {reason}.")]
	Unauthenticated {
		/// Human-readable reason string.
		reason: String,
	},
	/// Principal is authenticated but not allowed to perform the action.
	#[error("Access denied: {reason}.")]
	Forbidden {
		/// Human-readable reason string.
		reason: String,
	},
	/// Client exceeded the request ceiling for the current window.
	#[error("Rate limit exceeded; retry after the current window.")]
	RateLimitExceeded {
		/// Length of the fixed window that was exhausted.
		window: Duration,
	},
	/// Account deletion failed and every change was rolled back.
	#[error("Account deletion failed and was rolled back.")]
	DeletionFailed {
		/// Underlying relational store failure.
		#[source]
		source: AccountStoreError,
	},
}
impl Error {
	/// HTTP status code that represents this error at the service boundary.
	pub fn status(&self) -> u16 {
		match self {
			Self::InvalidRequest { .. }
			| Self::InvalidOrExpiredState
			| Self::TokenExchangeFailed { .. }
			| Self::ProfileFetchFailed { .. } => 400,
			Self::Unauthenticated { .. } => 401,
			Self::Forbidden { .. } => 403,
			Self::RateLimitExceeded { .. } => 429,
			Self::StoreUnavailable(_) | Self::Config(ConfigError::ProviderNotConfigured { .. }) =>
				503,
			Self::Config(_)
			| Self::Accounts(_)
			| Self::DeletionFailed { .. } => 500,
		}
	}

	/// Returns `true` when the failure was caused by the caller rather than the service.
	pub fn is_client_error(&self) -> bool {
		(400..500).contains(&self.status())
	}

	pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
		Self::InvalidRequest { reason: reason.into() }
	}

	pub(crate) fn unauthenticated(reason: impl Into<String>) -> Self {
		Self::Unauthenticated { reason: reason.into() }
	}

	pub(crate) fn forbidden(reason: impl Into<String>) -> Self {
		Self::Forbidden { reason: reason.into() }
	}
}

/// Configuration and wiring failures.
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
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Descriptor validation failed.
	#[error(transparent)]
	Descriptor(#[from] ProviderDescriptorError),
	/// Required environment variable is absent or empty.
	#[error("Configuration value `{key}` is required.")]
	Missing {
		/// Variable name.
		key: &'static str,
	},
	/// Environment variable could not be parsed.
	#[error("Configuration value `{key}` is invalid: {value:?}.")]
	InvalidValue {
		/// Variable name.
		key: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
	/// Provider credentials were not supplied, so its endpoints are disabled.
	#[error("Provider `{provider}` is not configured.")]
	ProviderNotConfigured {
		/// Provider that was requested.
		provider: Provider,
	},
	/// Router was served without the peer address the rate limiter keys on.
	#[error("Client address is unavailable; serve the router with connect info.")]
	MissingPeerAddress,
	/// Bearer credential could not be signed.
	#[error("Bearer credential could not be signed.")]
	Signing {
		/// Underlying signing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
