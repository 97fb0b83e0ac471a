//! Session cookie and bearer credential transport.

// crates.io
use axum::http::{
	HeaderMap,
	header::{AUTHORIZATION, COOKIE},
};
use cookie::{Cookie, SameSite};
// self
use crate::_prelude::*;

/// Name of the cookie carrying the bearer credential.
pub const SESSION_COOKIE: &str = "chatshare_session";
/// Lifetime of the session cookie.
pub const SESSION_MAX_AGE: Duration = Duration::days(7);

/// Builds the session cookie for `token`; `Secure` only in production.
pub fn session_cookie(token: &str, production: bool) -> Cookie<'static> {
	Cookie::build((SESSION_COOKIE, token.to_owned()))
		.path("/")
		.http_only(true)
		.same_site(SameSite::Lax)
		.secure(production)
		.max_age(SESSION_MAX_AGE)
		.build()
}

/// Builds a cookie that makes the browser drop the session.
pub fn expired_session_cookie(production: bool) -> Cookie<'static> {
	let mut cookie = session_cookie("", production);

	cookie.make_removal();

	cookie
}

/// Reads the bearer credential from `Authorization: Bearer`, falling back to the session
/// cookie.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
	authorization_bearer(headers).or_else(|| session_token(headers))
}

fn authorization_bearer(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.trim().split_once(' ')?;

	if !scheme.eq_ignore_ascii_case("bearer") {
		return None;
	}

	let token = token.trim();

	(!token.is_empty()).then(|| token.to_owned())
}

fn session_token(headers: &HeaderMap) -> Option<String> {
	headers
		.get_all(COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(Cookie::split_parse)
		.filter_map(|cookie| cookie.ok())
		.find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty())
		.map(|cookie| cookie.value().to_owned())
}
