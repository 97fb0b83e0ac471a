//! HTTP surface: sign-in endpoints, bearer extractors, the rate-limit layer, and the
//! response envelope shared with content handlers.

pub mod envelope;
pub mod extract;
pub mod rate_limit;
pub mod routes;
pub mod session;

pub use envelope::*;
pub use extract::*;
pub use routes::router;
pub use session::*;

// self
use crate::{
	_prelude::*,
	accounts::{AccountLifecycle, AccountStore},
	config::Config,
	flows::ReqwestIdentityFlows,
	limiter::RateLimiter,
	store::CredentialStore,
};

/// Request-independent knobs read by handlers and extractors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApiSettings {
	/// Marks the session cookie `Secure`.
	pub production: bool,
	/// Keys the rate limiter on the first `X-Forwarded-For` hop.
	pub trust_forwarded_for: bool,
	/// Pagination defaults for list endpoints.
	pub pagination: PageSettings,
}
impl ApiSettings {
	/// Settings derived from `config`.
	pub fn from_config(config: &Config) -> Self {
		Self {
			production: config.is_production(),
			trust_forwarded_for: config.trust_forwarded_for,
			pagination: config.pagination,
		}
	}
}
impl Default for ApiSettings {
	fn default() -> Self {
		Self {
			production: false,
			trust_forwarded_for: false,
			pagination: PageSettings::new(20, 100),
		}
	}
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
	/// Sign-in flows and bearer resolution.
	pub flows: Arc<ReqwestIdentityFlows>,
	/// Request gate.
	pub limiter: Arc<RateLimiter>,
	/// Account erasure.
	pub lifecycle: AccountLifecycle,
	/// Handler settings.
	pub settings: ApiSettings,
}
impl ApiState {
	/// Assembles state from already-built parts.
	pub fn new(
		flows: Arc<ReqwestIdentityFlows>,
		limiter: Arc<RateLimiter>,
		lifecycle: AccountLifecycle,
		settings: ApiSettings,
	) -> Self {
		Self { flows, limiter, lifecycle, settings }
	}

	/// Wires state from `config` over the provided stores.
	pub fn from_config(
		config: &Config,
		store: Arc<dyn CredentialStore>,
		accounts: Arc<dyn AccountStore>,
	) -> Result<Self> {
		let flows = ReqwestIdentityFlows::from_config(config, store.clone(), accounts.clone())?;
		let limiter = RateLimiter::new(store, config.rate_limit);

		Ok(Self::new(
			Arc::new(flows),
			Arc::new(limiter),
			AccountLifecycle::new(accounts),
			ApiSettings::from_config(config),
		))
	}

	/// Connects to Redis and the relational database named in `config`.
	#[cfg(feature = "redis")]
	pub async fn connect(config: &Config) -> Result<Self> {
		let store = crate::store::RedisStore::connect(&config.redis_url, config.store_timeout).await?;
		let accounts = crate::accounts::SqliteAccountStore::open(&config.database_url).await?;

		Self::from_config(config, Arc::new(store), Arc::new(accounts))
	}
}
impl Debug for ApiState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiState")
			.field("flows", &self.flows)
			.field("limiter", &self.limiter)
			.field("settings", &self.settings)
			.finish()
	}
}
