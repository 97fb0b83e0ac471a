//! Route table and handlers for the identity endpoints.

// crates.io
use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::{
		StatusCode,
		header::{LOCATION, SET_COOKIE},
	},
	middleware,
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
// self
use crate::{
	_prelude::*,
	api::{ApiState, CurrentPrincipal, Envelope, rate_limit, session},
	auth::{Principal, Provider},
};

/// Callback body posted by the front end after the provider redirect.
#[derive(Clone, Debug, Deserialize)]
pub struct CallbackBody {
	/// Authorization code issued by the provider.
	#[serde(default)]
	pub code: String,
	/// State echoed back by the provider.
	#[serde(default)]
	pub state: String,
}

/// Authorize URL offered to clients that open it themselves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeUrl {
	/// Provider authorize URL.
	pub url: String,
	/// Embedded state token.
	pub state: String,
}

/// Successful sign-in payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
	/// Bearer credential, also set as the session cookie.
	pub token: String,
	/// Reconciled principal.
	pub user: Principal,
}

/// Builds the router with the rate-limit layer in front of every route.
///
/// The limiter keys on the peer address, so serve the router with
/// `router.into_make_service_with_connect_info::<SocketAddr>()`. Without it, requests are
/// refused unless a trusted `X-Forwarded-For` header names the client.
pub fn router(state: ApiState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/v1/auth/google/redirect", get(google_redirect))
		.route("/api/v1/auth/line/url", get(line_url))
		.route("/api/v1/auth/google/callback", post(google_callback))
		.route("/api/v1/auth/line/callback", post(line_callback))
		.route("/api/v1/auth/me", get(me))
		.route("/api/v1/auth/logout", post(logout))
		.route("/api/v1/user/account", delete(delete_account))
		.layer(middleware::from_fn_with_state(state.clone(), rate_limit::enforce))
		.with_state(state)
}

async fn health() -> Response {
	Envelope::ok(serde_json::json!({ "status": "ok" })).into_response()
}

async fn google_redirect(State(state): State<ApiState>) -> Result<Response> {
	let request = state.flows.begin_authorization(Provider::Google).await?;

	Ok((StatusCode::FOUND, [(LOCATION, request.authorize_url.to_string())]).into_response())
}

async fn line_url(State(state): State<ApiState>) -> Result<Response> {
	let request = state.flows.begin_authorization(Provider::Line).await?;

	Ok(Envelope::ok(AuthorizeUrl { url: request.authorize_url.into(), state: request.state })
		.into_response())
}

async fn google_callback(
	State(state): State<ApiState>,
	body: Result<Json<CallbackBody>, JsonRejection>,
) -> Result<Response> {
	callback(&state, Provider::Google, body).await
}

async fn line_callback(
	State(state): State<ApiState>,
	body: Result<Json<CallbackBody>, JsonRejection>,
) -> Result<Response> {
	callback(&state, Provider::Line, body).await
}

async fn callback(
	state: &ApiState,
	provider: Provider,
	body: Result<Json<CallbackBody>, JsonRejection>,
) -> Result<Response> {
	let Json(body) = body.map_err(|e| Error::invalid_request(e.body_text()))?;
	let login = state.flows.complete_authorization(provider, &body.code, &body.state).await?;
	let token = login.token.token.expose().to_owned();
	let cookie = session::session_cookie(&token, state.settings.production);
	let payload = LoginPayload { token, user: login.principal };
	let message = if login.created { "Account created." } else { "Signed in." };

	Ok(([(SET_COOKIE, cookie.to_string())], Envelope::ok(payload).with_message(message))
		.into_response())
}

async fn me(current: CurrentPrincipal) -> Response {
	Envelope::ok(current.principal).into_response()
}

async fn logout(State(state): State<ApiState>, _current: CurrentPrincipal) -> Response {
	let cookie = session::expired_session_cookie(state.settings.production);

	([(SET_COOKIE, cookie.to_string())], Envelope::message("Signed out.")).into_response()
}

async fn delete_account(
	State(state): State<ApiState>,
	current: CurrentPrincipal,
) -> Result<Response> {
	state.lifecycle.delete_account(&current.principal.id).await?;

	let cookie = session::expired_session_cookie(state.settings.production);

	Ok(([(SET_COOKIE, cookie.to_string())], Envelope::message("Account deleted.")).into_response())
}
