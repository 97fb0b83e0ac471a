//! Shared fixtures for integration tests: mock provider endpoints, an in-memory account store,
//! a manual clock, and flows wired against them.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime, macros};
// self
use chatshare_identity::{
	accounts::{AccountLifecycle, SqliteAccountStore},
	api::{ApiSettings, ApiState},
	auth::{Provider, Secret},
	clock::ManualClock,
	flows::{ProviderClient, ReqwestIdentityFlows},
	http::ReqwestHttpClient,
	limiter::{RateLimitPolicy, RateLimiter},
	oauth::ReqwestTransportErrorMapper,
	provider::ProviderDescriptor,
	reqwest::Client as ReqwestClient,
	store::MemoryStore,
	token::BearerTokenService,
	url::Url,
};

pub const CLIENT_ID: &str = "client-it";
pub const CLIENT_SECRET: &str = "secret-it";
pub const JWT_SECRET: &str = "jwt-secret-it";
pub const TOKEN_TTL: Duration = Duration::hours(24);
pub const START: OffsetDateTime = macros::datetime!(2025-11-10 12:00 UTC);

/// Everything a flow test needs to drive and inspect a sign-in.
pub struct Harness {
	pub flows: Arc<ReqwestIdentityFlows>,
	pub store: Arc<MemoryStore>,
	pub accounts: Arc<SqliteAccountStore>,
	pub tokens: Arc<BearerTokenService>,
	pub clock: ManualClock,
}
impl Harness {
	/// Builds API state over the harness with the given rate-limit policy.
	pub fn api_state(&self, policy: RateLimitPolicy) -> ApiState {
		ApiState::new(
			self.flows.clone(),
			Arc::new(RateLimiter::new(self.store.clone(), policy)),
			AccountLifecycle::new(self.accounts.clone()),
			ApiSettings::default(),
		)
	}
}

/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
/// `httpmock` during tests.
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = ReqwestClient::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Descriptor for `provider` whose endpoints live on `server` under `/<provider>/...`.
pub fn mock_descriptor(server: &MockServer, provider: Provider) -> ProviderDescriptor {
	let endpoint = |suffix: &str| {
		Url::parse(&server.url(format!("/{provider}/{suffix}")))
			.expect("Mock endpoint should parse successfully.")
	};
	let builder = ProviderDescriptor::builder(provider)
		.authorization_endpoint(endpoint("authorize"))
		.token_endpoint(endpoint("token"))
		.profile_endpoint(endpoint("profile"));
	let builder = match provider {
		Provider::Google =>
			builder.scopes(["email", "profile"]).authorize_param("access_type", "offline"),
		Provider::Line => builder.scopes(["profile", "openid", "email"]),
	};

	builder.build().expect("Mock descriptor should build successfully.")
}

/// Flows with both providers pointed at `server`, backed by in-memory stores.
pub async fn harness(server: &MockServer) -> Harness {
	let clock = ManualClock::new(START);
	let store = Arc::new(MemoryStore::with_clock(Arc::new(clock.clone())));
	let accounts =
		Arc::new(SqliteAccountStore::open_in_memory().await.expect("Account store should open."));
	let tokens = Arc::new(
		BearerTokenService::new(&Secret::new(JWT_SECRET), TOKEN_TTL)
			.expect("Token service should build.")
			.with_clock(Arc::new(clock.clone())),
	);
	let mut flows = ReqwestIdentityFlows::with_http_client(
		store.clone(),
		accounts.clone(),
		tokens.clone(),
		test_reqwest_http_client(),
		ReqwestTransportErrorMapper,
	)
	.with_clock(Arc::new(clock.clone()));

	for provider in Provider::ALL {
		let redirect = Url::parse(&format!("https://chatshare.example/api/v1/auth/{provider}/callback"))
			.expect("Redirect fixture should parse.");

		flows = flows.with_provider(ProviderClient::new(
			mock_descriptor(server, provider),
			CLIENT_ID,
			Secret::new(CLIENT_SECRET),
			redirect,
		));
	}

	Harness { flows: Arc::new(flows), store, accounts, tokens, clock }
}

/// Token endpoint that answers every exchange with `access_token`.
pub async fn mock_token_success<'a>(
	server: &'a MockServer,
	provider: Provider,
	access_token: &str,
) -> httpmock::Mock<'a> {
	let body = format!(
		"{{\"access_token\":\"{access_token}\",\"token_type\":\"Bearer\",\"expires_in\":3600}}"
	);

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(format!("/{provider}/token"))
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

/// Profile endpoint that answers requests bearing `access_token` with `body`.
pub async fn mock_profile<'a>(
	server: &'a MockServer,
	provider: Provider,
	access_token: &str,
	body: &str,
) -> httpmock::Mock<'a> {
	let authorization = format!("Bearer {access_token}");
	let body = body.to_owned();

	server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{provider}/profile")).header("authorization", authorization);
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

/// Google profile JSON for subject `id`.
pub fn google_profile(id: &str, email: &str, name: &str) -> String {
	format!(
		"{{\"id\":\"{id}\",\"email\":\"{email}\",\"verified_email\":true,\"name\":\"{name}\",\"picture\":\"https://img.example/{id}.png\"}}"
	)
}

/// LINE profile JSON for subject `user_id`.
pub fn line_profile(user_id: &str, name: &str) -> String {
	format!(
		"{{\"userId\":\"{user_id}\",\"displayName\":\"{name}\",\"pictureUrl\":\"https://img.example/{user_id}.png\"}}"
	)
}
