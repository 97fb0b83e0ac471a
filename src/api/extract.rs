//! Request extractors for authenticated principals and page selections.

// crates.io
use axum::{
	extract::{FromRequestParts, OptionalFromRequestParts, Query},
	http::request::Parts,
};
// self
use crate::{
	_prelude::*,
	api::{ApiState, PageQuery, PageRequest, session},
	auth::Principal,
	token::BearerClaims,
};

/// Principal resolved from the request's bearer credential.
///
/// Rejects with [`Error::Unauthenticated`] when the credential is missing, invalid,
/// expired, or names a principal that no longer exists, and with [`Error::Forbidden`]
/// when the account is suspended.
#[derive(Clone, Debug)]
pub struct CurrentPrincipal {
	/// Verified claims.
	pub claims: BearerClaims,
	/// Stored principal.
	pub principal: Principal,
}
impl FromRequestParts<ApiState> for CurrentPrincipal {
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self> {
		if let Some(current) = parts.extensions.get::<CurrentPrincipal>() {
			return Ok(current.clone());
		}

		let token = session::bearer_token(&parts.headers)
			.ok_or_else(|| Error::unauthenticated("bearer credential is missing"))?;
		let (claims, principal) = state.flows.authenticate(&token).await?;
		let current = Self { claims, principal };

		parts.extensions.insert(current.clone());

		Ok(current)
	}
}

/// `Option<CurrentPrincipal>` for public routes: `None` without a credential, but a
/// credential that is present and fails verification still rejects the request.
impl OptionalFromRequestParts<ApiState> for CurrentPrincipal {
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Option<Self>> {
		if parts.extensions.get::<CurrentPrincipal>().is_none()
			&& session::bearer_token(&parts.headers).is_none()
		{
			return Ok(None);
		}

		<Self as FromRequestParts<ApiState>>::from_request_parts(parts, state).await.map(Some)
	}
}

/// [`CurrentPrincipal`] holding the admin role.
#[derive(Clone, Debug)]
pub struct AdminPrincipal(pub CurrentPrincipal);
impl FromRequestParts<ApiState> for AdminPrincipal {
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self> {
		let current =
			<CurrentPrincipal as FromRequestParts<ApiState>>::from_request_parts(parts, state)
				.await?;

		if !current.principal.is_admin() {
			return Err(Error::forbidden("administrator role is required"));
		}

		Ok(Self(current))
	}
}

impl FromRequestParts<ApiState> for PageRequest {
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self> {
		let Query(query) = Query::<PageQuery>::try_from_uri(&parts.uri)
			.map_err(|e| Error::invalid_request(e.body_text()))?;

		Ok(PageRequest::resolve(query, &state.settings.pagination))
	}
}
