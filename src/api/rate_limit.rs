//! Rate-limit middleware applied in front of every route.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	extract::{ConnectInfo, Request, State},
	http::{HeaderMap, HeaderValue},
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	api::ApiState,
	error::ConfigError,
	obs::{self, FlowKind, FlowOutcome},
};

const FORWARDED_FOR: &str = "x-forwarded-for";
const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Counts the request against its client key and short-circuits once the ceiling is hit.
///
/// A request whose client cannot be identified is refused rather than counted in a shared
/// bucket.
pub async fn enforce(State(state): State<ApiState>, request: Request, next: Next) -> Response {
	let connect_info = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
	let Some(key) =
		client_key(request.headers(), connect_info, state.settings.trust_forwarded_for)
	else {
		let err = Error::from(ConfigError::MissingPeerAddress);

		obs::error_event(FlowKind::RateLimit, "client_key", &err);
		obs::record_flow_outcome(FlowKind::RateLimit, FlowOutcome::Failure);

		return err.into_response();
	};
	let decision = match state.limiter.check(&key).await {
		Ok(decision) => decision,
		Err(e) => return e.into_response(),
	};
	let mut response = next.run(request).await;
	let headers = response.headers_mut();

	headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
	headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining()));

	response
}

/// Derives the per-client discriminator.
///
/// `X-Forwarded-For` is honoured only behind a trusted proxy; otherwise the peer address
/// is used. Returns `None` when neither identifies the client.
pub fn client_key(
	headers: &HeaderMap,
	peer: Option<SocketAddr>,
	trust_forwarded_for: bool,
) -> Option<String> {
	if trust_forwarded_for {
		let forwarded = headers
			.get(FORWARDED_FOR)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.split(',').next())
			.map(str::trim)
			.filter(|hop| !hop.is_empty());

		if let Some(hop) = forwarded {
			return Some(hop.to_owned());
		}
	}

	peer.map(|addr| addr.ip().to_string())
}
