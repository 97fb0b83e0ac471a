//! JSON response envelope, pagination convention, and error responses.

// crates.io
use axum::{
	Json,
	http::StatusCode,
	response::{IntoResponse, Response},
};
// self
use crate::{_prelude::*, error::ConfigError};

/// Uniform JSON body `{success, data?, error?, message?}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
	/// Whether the request succeeded.
	pub success: bool,
	/// Payload on success.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	/// Stable error code on failure.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	/// Human-readable message.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}
impl<T> Envelope<T> {
	/// Successful response carrying `data`.
	pub fn ok(data: T) -> Self {
		Self { success: true, data: Some(data), error: None, message: None }
	}

	/// Attaches a message.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());

		self
	}
}
impl Envelope<()> {
	/// Successful response without a payload.
	pub fn message(message: impl Into<String>) -> Self {
		Self { success: true, data: None, error: None, message: Some(message.into()) }
	}

	/// Failed response.
	pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			success: false,
			data: None,
			error: Some(error.into()),
			message: Some(message.into()),
		}
	}
}
impl<T> IntoResponse for Envelope<T>
where
	T: Serialize,
{
	fn into_response(self) -> Response {
		Json(self).into_response()
	}
}

/// Page size bounds for list endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSettings {
	/// Page size used when the client sends none.
	pub default_page_size: u64,
	/// Largest page size a client may request.
	pub max_page_size: u64,
}
impl PageSettings {
	/// Creates page settings; the default is clamped into `1..=max`.
	pub fn new(default_page_size: u64, max_page_size: u64) -> Self {
		let max_page_size = max_page_size.max(1);

		Self { default_page_size: default_page_size.clamp(1, max_page_size), max_page_size }
	}
}

/// Raw `?page=&page_size=` query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PageQuery {
	/// One-based page number.
	pub page: Option<u64>,
	/// Requested page size.
	pub page_size: Option<u64>,
}

/// Clamped page selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
	/// One-based page number, at least 1.
	pub page: u64,
	/// Page size within `1..=max_page_size`.
	pub page_size: u64,
}
impl PageRequest {
	/// Resolves `query` against `settings`.
	pub fn resolve(query: PageQuery, settings: &PageSettings) -> Self {
		Self {
			page: query.page.unwrap_or(1).max(1),
			page_size: query
				.page_size
				.unwrap_or(settings.default_page_size)
				.clamp(1, settings.max_page_size),
		}
	}

	/// Rows to skip.
	pub fn offset(&self) -> u64 {
		(self.page - 1).saturating_mul(self.page_size)
	}
}

/// Pagination block of a list response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
	/// One-based page number.
	pub page: u64,
	/// Page size.
	pub page_size: u64,
	/// Total rows across all pages.
	pub total: u64,
	/// Total page count.
	pub total_pages: u64,
}
impl Pagination {
	/// Describes `request` over `total` rows.
	pub fn new(request: PageRequest, total: u64) -> Self {
		Self {
			page: request.page,
			page_size: request.page_size,
			total,
			total_pages: total.div_ceil(request.page_size.max(1)),
		}
	}
}

/// List body `{success, data, pagination}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
	/// Always `true`.
	pub success: bool,
	/// Rows of the current page.
	pub data: Vec<T>,
	/// Page description.
	pub pagination: Pagination,
}
impl<T> Paginated<T> {
	/// Wraps a page of rows.
	pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
		Self { success: true, data, pagination: Pagination::new(request, total) }
	}
}
impl<T> IntoResponse for Paginated<T>
where
	T: Serialize,
{
	fn into_response(self) -> Response {
		Json(self).into_response()
	}
}

impl Error {
	/// Stable machine-readable code used in error envelopes.
	pub fn code(&self) -> &'static str {
		match self {
			Self::InvalidRequest { .. } => "invalid_request",
			Self::InvalidOrExpiredState => "invalid_or_expired_state",
			Self::TokenExchangeFailed { .. } => "token_exchange_failed",
			Self::ProfileFetchFailed { .. } => "profile_fetch_failed",
			Self::Unauthenticated { .. } => "unauthenticated",
			Self::Forbidden { .. } => "forbidden",
			Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
			Self::StoreUnavailable(_) => "store_unavailable",
			Self::DeletionFailed { .. } => "deletion_failed",
			Self::Config(ConfigError::ProviderNotConfigured { .. }) => "provider_not_configured",
			Self::Config(_) | Self::Accounts(_) => "internal_error",
		}
	}
}
impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status =
			StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		// Server-side details stay in the logs.
		let message = match &self {
			Self::StoreUnavailable(_) => "Service is temporarily unavailable.".into(),
			Self::Config(ConfigError::ProviderNotConfigured { .. }) => self.to_string(),
			_ if status.is_server_error() => "Internal server error.".into(),
			_ => self.to_string(),
		};

		(status, Envelope::failure(self.code(), message)).into_response()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{accounts::AccountStoreError, store::StoreError};

	#[test]
	fn envelope_omits_absent_fields() {
		let body = serde_json::to_value(Envelope::ok(json!({ "id": 1 })))
			.expect("Envelope should serialize.");

		assert_eq!(body, json!({ "success": true, "data": { "id": 1 } }));

		let body = serde_json::to_value(Envelope::failure("forbidden", "Access denied."))
			.expect("Envelope should serialize.");

		assert_eq!(
			body,
			json!({ "success": false, "error": "forbidden", "message": "Access denied." })
		);
	}

	#[test]
	fn page_requests_are_clamped() {
		let settings = PageSettings::new(20, 100);

		assert_eq!(
			PageRequest::resolve(PageQuery::default(), &settings),
			PageRequest { page: 1, page_size: 20 }
		);
		assert_eq!(
			PageRequest::resolve(PageQuery { page: Some(0), page_size: Some(1_000) }, &settings),
			PageRequest { page: 1, page_size: 100 }
		);
		let third = PageQuery { page: Some(3), page_size: Some(0) };

		assert_eq!(PageRequest::resolve(third, &settings).offset(), 2);
	}

	#[test]
	fn total_pages_round_up() {
		let request = PageRequest { page: 2, page_size: 20 };

		assert_eq!(Pagination::new(request, 0).total_pages, 0);
		assert_eq!(Pagination::new(request, 20).total_pages, 1);
		assert_eq!(Pagination::new(request, 41).total_pages, 3);
	}

	#[test]
	fn server_errors_hide_details() {
		let response =
			Error::from(StoreError::Unavailable { message: "10.0.0.3:6379 refused".into() })
				.into_response();

		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

		let response = Error::DeletionFailed {
			source: AccountStoreError::Backend { message: "database is locked".into() },
		}
		.into_response();

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

		let response = Error::InvalidOrExpiredState.into_response();

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}
}
