mod common;

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Router,
	body::{self, Body},
	extract::connect_info::MockConnectInfo,
	http::{
		Request, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
	},
	response::Response,
	routing,
};
use httpmock::prelude::*;
use serde_json::{Value, json};
use time::Duration;
use tower::ServiceExt;
// self
use chatshare_identity::{
	api::{self, AdminPrincipal, CurrentPrincipal, PageRequest, Paginated},
	auth::Provider,
	limiter::RateLimitPolicy,
};
use common::*;

const GENEROUS: RateLimitPolicy = RateLimitPolicy::new(1_000, Duration::minutes(15));

const CLIENT: ([u8; 4], u16) = ([203, 0, 113, 9], 51_234);

/// Identity router as served behind `into_make_service_with_connect_info`.
fn served(state: api::ApiState) -> Router {
	served_by(state, CLIENT)
}

fn served_by(state: api::ApiState, peer: impl Into<SocketAddr>) -> Router {
	api::router(state).layer(MockConnectInfo(peer.into()))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
	app.clone().oneshot(request).await.expect("Router should always answer.")
}

async fn json_body(response: Response) -> Value {
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Body should be readable.");

	serde_json::from_slice(&bytes).expect("Body should be JSON.")
}

async fn text_body(response: Response) -> String {
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Body should be readable.");

	String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8.")
}

fn get(uri: &str) -> Request<Body> {
	Request::get(uri).body(Body::empty()).expect("Request fixture should build.")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
	Request::post(uri)
		.header(CONTENT_TYPE, "application/json")
		.body(Body::from(body.to_string()))
		.expect("Request fixture should build.")
}

fn with_bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
	Request::builder()
		.method(method)
		.uri(uri)
		.header(AUTHORIZATION, format!("Bearer {token}"))
		.body(Body::empty())
		.expect("Request fixture should build.")
}

async fn admin_only(AdminPrincipal(current): AdminPrincipal) -> String {
	current.principal.email
}

async fn greeting(principal: Option<CurrentPrincipal>) -> String {
	principal.map_or_else(|| "anonymous".into(), |current| current.principal.email)
}

async fn empty_page(page: PageRequest) -> Paginated<u64> {
	Paginated::new(Vec::new(), page, 41)
}

/// Mounts the admin, optional-principal and pagination extractors on their own routes.
fn extractor_router(state: api::ApiState) -> Router {
	Router::new()
		.route("/admin", routing::get(admin_only))
		.route("/chats", routing::get(empty_page))
		.route("/feed", routing::get(greeting))
		.with_state(state)
}

async fn set_column(h: &Harness, column: &str, value: &str) {
	let sql = format!("UPDATE principals SET {column} = ?1 WHERE provider_subject_id = 'U4af'");

	sqlx::query(&sql)
		.bind(value)
		.execute(h.accounts.pool())
		.await
		.expect("Fixture update should succeed.");
}

/// Signs a LINE user in through the HTTP surface and returns the bearer credential.
async fn sign_in_line(app: &Router, server: &MockServer) -> (String, Value) {
	mock_token_success(server, Provider::Line, "access-line").await;
	mock_profile(server, Provider::Line, "access-line", &line_profile("U4af", "Brown")).await;

	let url = json_body(send(app, get("/api/v1/auth/line/url")).await).await;
	let state = url["data"]["state"].as_str().expect("State should be a string.").to_owned();
	let response = send(
		app,
		post_json("/api/v1/auth/line/callback", &json!({ "code": "code-1", "state": state })),
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);

	let cookie = response
		.headers()
		.get(SET_COOKIE)
		.and_then(|value| value.to_str().ok())
		.expect("Callback should set the session cookie.")
		.to_owned();

	assert!(cookie.starts_with("chatshare_session="));
	assert!(cookie.contains("HttpOnly"));

	let body = json_body(response).await;
	let token = body["data"]["token"].as_str().expect("Token should be a string.").to_owned();

	assert!(cookie.contains(&token));

	(token, body)
}

#[tokio::test]
async fn health_reports_ok_with_rate_limit_headers() {
	let server = MockServer::start_async().await;
	let app = served(harness(&server).await.api_state(GENEROUS));
	let response = send(&app, get("/health")).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers()["x-ratelimit-limit"], "1000");
	assert_eq!(response.headers()["x-ratelimit-remaining"], "999");
	assert_eq!(json_body(response).await, json!({ "success": true, "data": { "status": "ok" } }));
}

#[tokio::test]
async fn google_redirect_points_at_the_authorize_endpoint() {
	let server = MockServer::start_async().await;
	let app = served(harness(&server).await.api_state(GENEROUS));
	let response = send(&app, get("/api/v1/auth/google/redirect")).await;

	assert_eq!(response.status(), StatusCode::FOUND);

	let location = response.headers()[LOCATION].to_str().expect("Location should be ASCII.");

	assert!(location.starts_with(&server.url("/google/authorize")));
	assert!(location.contains("state="));
}

#[tokio::test]
async fn line_callback_signs_in_and_sets_the_session() {
	let server = MockServer::start_async().await;
	let app = served(harness(&server).await.api_state(GENEROUS));
	let (_token, body) = sign_in_line(&app, &server).await;

	assert_eq!(body["success"], json!(true));
	assert_eq!(body["message"], json!("Account created."));
	assert_eq!(body["data"]["user"]["email"], json!("U4af@line.user"));
	assert_eq!(body["data"]["user"]["name"], json!("Brown"));
	assert_eq!(body["data"]["user"]["role"], json!("user"));
}

#[tokio::test]
async fn malformed_callback_body_is_a_bad_request() {
	let server = MockServer::start_async().await;
	let app = served(harness(&server).await.api_state(GENEROUS));
	let request = Request::post("/api/v1/auth/google/callback")
		.header(CONTENT_TYPE, "application/json")
		.body(Body::from("{not json"))
		.expect("Request fixture should build.");
	let response = send(&app, request).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_body(response).await["error"], json!("invalid_request"));
}

#[tokio::test]
async fn forged_state_is_rejected_over_http() {
	let server = MockServer::start_async().await;
	let app = served(harness(&server).await.api_state(GENEROUS));
	let response = send(
		&app,
		post_json("/api/v1/auth/google/callback", &json!({ "code": "c", "state": "forged" })),
	)
	.await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_body(response).await["error"], json!("invalid_or_expired_state"));
}

#[tokio::test]
async fn me_requires_a_valid_credential() {
	let server = MockServer::start_async().await;
	let app = served(harness(&server).await.api_state(GENEROUS));
	let missing = send(&app, get("/api/v1/auth/me")).await;

	assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(
		json_body(missing).await,
		json!({
			"success": false,
			"error": "unauthenticated",
			"message": "Authentication required: bearer credential is missing."
		})
	);

	let garbage = send(&app, with_bearer("GET", "/api/v1/auth/me", "not-a-jwt")).await;

	assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);

	let (token, _) = sign_in_line(&app, &server).await;
	let by_header = send(&app, with_bearer("GET", "/api/v1/auth/me", &token)).await;

	assert_eq!(by_header.status(), StatusCode::OK);
	assert_eq!(json_body(by_header).await["data"]["provider"], json!("line"));

	let by_cookie = Request::get("/api/v1/auth/me")
		.header(COOKIE, format!("chatshare_session={token}"))
		.body(Body::empty())
		.expect("Request fixture should build.");

	assert_eq!(send(&app, by_cookie).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn expired_credential_is_rejected() {
	let server = MockServer::start_async().await;
	let h = harness(&server).await;
	let app = served(h.api_state(GENEROUS));
	let (token, _) = sign_in_line(&app, &server).await;

	h.clock.advance(TOKEN_TTL + Duration::seconds(1));

	let response = send(&app, with_bearer("GET", "/api/v1/auth/me", &token)).await;

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
	let server = MockServer::start_async().await;
	let app = served(harness(&server).await.api_state(GENEROUS));
	let (token, _) = sign_in_line(&app, &server).await;
	let response = send(&app, with_bearer("POST", "/api/v1/auth/logout", &token)).await;

	assert_eq!(response.status(), StatusCode::OK);

	let cookie =
		response.headers()[SET_COOKIE].to_str().expect("Cookie should be ASCII.").to_owned();

	assert!(cookie.starts_with("chatshare_session=;"));
	assert!(cookie.contains("Max-Age=0"));
	assert_eq!(json_body(response).await["message"], json!("Signed out."));
}

#[tokio::test]
async fn deleting_the_account_invalidates_its_credential() {
	let server = MockServer::start_async().await;
	let app = served(harness(&server).await.api_state(GENEROUS));
	let (token, _) = sign_in_line(&app, &server).await;
	let response = send(&app, with_bearer("DELETE", "/api/v1/user/account", &token)).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(response.headers().contains_key(SET_COOKIE));
	assert_eq!(json_body(response).await["message"], json!("Account deleted."));

	let after = send(&app, with_bearer("GET", "/api/v1/auth/me", &token)).await;

	assert_eq!(after.status(), StatusCode::UNAUTHORIZED);

	let again = send(&app, with_bearer("DELETE", "/api/v1/user/account", &token)).await;

	assert_eq!(again.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn requests_past_the_ceiling_get_429() {
	let server = MockServer::start_async().await;
	let app = served(
		harness(&server).await.api_state(RateLimitPolicy::new(2, Duration::minutes(15))),
	);

	assert_eq!(send(&app, get("/health")).await.status(), StatusCode::OK);
	assert_eq!(send(&app, get("/health")).await.status(), StatusCode::OK);

	let limited = send(&app, get("/health")).await;

	assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
	assert_eq!(json_body(limited).await["error"], json!("rate_limit_exceeded"));
}

#[tokio::test]
async fn suspended_principal_is_forbidden() {
	let server = MockServer::start_async().await;
	let h = harness(&server).await;
	let app = served(h.api_state(GENEROUS));
	let (token, _) = sign_in_line(&app, &server).await;

	set_column(&h, "status", "suspended").await;

	let response = send(&app, with_bearer("GET", "/api/v1/auth/me", &token)).await;

	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	assert_eq!(json_body(response).await["error"], json!("forbidden"));
}

#[tokio::test]
async fn admin_routes_require_the_admin_role() {
	let server = MockServer::start_async().await;
	let h = harness(&server).await;
	let (token, _) = sign_in_line(&served(h.api_state(GENEROUS)), &server).await;
	let app = extractor_router(h.api_state(GENEROUS));
	let denied = send(&app, with_bearer("GET", "/admin", &token)).await;

	assert_eq!(denied.status(), StatusCode::FORBIDDEN);
	assert_eq!(
		json_body(denied).await["message"],
		json!("Access denied: administrator role is required.")
	);

	set_column(&h, "role", "admin").await;

	let allowed = send(&app, with_bearer("GET", "/admin", &token)).await;

	assert_eq!(allowed.status(), StatusCode::OK);

	assert_eq!(text_body(allowed).await, "U4af@line.user");
}

#[tokio::test]
async fn page_selection_is_clamped_and_described() {
	let server = MockServer::start_async().await;
	let app = extractor_router(harness(&server).await.api_state(GENEROUS));
	let response = send(&app, get("/chats?page=0&page_size=1000")).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		json_body(response).await,
		json!({
			"success": true,
			"data": [],
			"pagination": { "page": 1, "page_size": 100, "total": 41, "total_pages": 1 }
		})
	);

	let defaulted = json_body(send(&app, get("/chats?page=3")).await).await;

	assert_eq!(
		defaulted["pagination"],
		json!({ "page": 3, "page_size": 20, "total": 41, "total_pages": 3 })
	);

	let malformed = send(&app, get("/chats?page=abc")).await;

	assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_body(malformed).await["error"], json!("invalid_request"));
}

#[tokio::test]
async fn each_peer_gets_its_own_budget() {
	let server = MockServer::start_async().await;
	let state = harness(&server).await.api_state(RateLimitPolicy::new(2, Duration::minutes(15)));
	let first = served_by(state.clone(), ([198, 51, 100, 1], 40_000));
	let second = served_by(state, ([198, 51, 100, 2], 40_000));

	assert_eq!(send(&first, get("/health")).await.status(), StatusCode::OK);
	assert_eq!(send(&first, get("/health")).await.status(), StatusCode::OK);
	assert_eq!(send(&first, get("/health")).await.status(), StatusCode::TOO_MANY_REQUESTS);

	let other = send(&second, get("/health")).await;

	assert_eq!(other.status(), StatusCode::OK);
	assert_eq!(other.headers()["x-ratelimit-remaining"], "1");
}

#[tokio::test]
async fn requests_without_a_peer_address_are_refused() {
	let server = MockServer::start_async().await;
	let app = api::router(harness(&server).await.api_state(GENEROUS));
	let response = send(&app, get("/health")).await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(
		json_body(response).await,
		json!({ "success": false, "error": "internal_error", "message": "Internal server error." })
	);
}

#[tokio::test]
async fn public_routes_accept_anonymous_callers_but_not_bad_credentials() {
	let server = MockServer::start_async().await;
	let h = harness(&server).await;
	let (token, _) = sign_in_line(&served(h.api_state(GENEROUS)), &server).await;
	let app = extractor_router(h.api_state(GENEROUS));
	let anonymous = send(&app, get("/feed")).await;

	assert_eq!(text_body(anonymous).await, "anonymous");

	let signed_in = send(&app, with_bearer("GET", "/feed", &token)).await;

	assert_eq!(text_body(signed_in).await, "U4af@line.user");

	let rejected = send(&app, with_bearer("GET", "/feed", "not-a-jwt")).await;

	assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(json_body(rejected).await["error"], json!("unauthenticated"));
}
