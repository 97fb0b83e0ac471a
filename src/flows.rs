//! OAuth sign-in orchestration shared by every configured provider.

pub mod authorization;
pub mod state;

mod reconcile;

pub use authorization::*;
pub use state::*;

// self
use crate::{
	_prelude::*,
	accounts::AccountStore,
	auth::{Principal, Provider, Secret},
	clock::{Clock, SystemClock},
	config::{Config, ProviderCredentials},
	error::ConfigError,
	http::{ProviderHttpClient, ReqwestHttpClient},
	mirror::{IdentityMirror, NoopMirror},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
	provider::{ProviderDescriptor, ProviderStrategy, strategy_for},
	store::CredentialStore,
	token::{BearerClaims, BearerTokenService},
};

/// Flows specialized for the crate's default reqwest transport stack.
pub type ReqwestIdentityFlows = IdentityFlows<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Registration of one provider: descriptor, profile strategy, and client credentials.
#[derive(Clone)]
pub struct ProviderClient {
	/// Endpoints and scopes.
	pub descriptor: ProviderDescriptor,
	/// Profile normalizer.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Registered client identifier.
	pub client_id: String,
	/// Registered client secret, sent in the token request body.
	pub client_secret: Secret,
	/// Callback URL registered with the provider.
	pub redirect_uri: Url,
}
impl ProviderClient {
	/// Registers `descriptor` with the built-in strategy for its provider.
	pub fn new(
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		client_secret: Secret,
		redirect_uri: Url,
	) -> Self {
		Self {
			strategy: strategy_for(descriptor.provider),
			descriptor,
			client_id: client_id.into(),
			client_secret,
			redirect_uri,
		}
	}

	/// Registers the production descriptor for `provider` using configured credentials.
	pub fn standard(provider: Provider, credentials: &ProviderCredentials) -> Result<Self> {
		let descriptor = ProviderDescriptor::standard(provider).map_err(ConfigError::from)?;

		Ok(Self::new(
			descriptor,
			credentials.client_id.clone(),
			credentials.client_secret.clone(),
			credentials.redirect_uri.clone(),
		))
	}

	/// Replaces the profile strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Provider this registration belongs to.
	pub fn provider(&self) -> Provider {
		self.descriptor.provider
	}
}
impl Debug for ProviderClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderClient")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.finish_non_exhaustive()
	}
}

/// Coordinates sign-in flows for every registered provider.
///
/// Owns the outbound transport, the credential store used for state tokens, the account
/// store used for reconciliation, the bearer credential signer, and the optional identity
/// mirror. Providers without a registration answer with
/// [`ConfigError::ProviderNotConfigured`].
#[derive(Clone)]
pub struct IdentityFlows<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Store holding one-time state tokens.
	pub store: Arc<dyn CredentialStore>,
	/// Relational principal storage.
	pub accounts: Arc<dyn AccountStore>,
	/// Bearer credential signer and verifier.
	pub tokens: Arc<BearerTokenService>,
	/// Best-effort identity mirror.
	pub mirror: Arc<dyn IdentityMirror>,
	/// Time source for `last_login_at` and registration timestamps.
	pub clock: Arc<dyn Clock>,
	providers: BTreeMap<Provider, ProviderClient>,
}
impl<C, M> IdentityFlows<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates flows that reuse the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn CredentialStore>,
		accounts: Arc<dyn AccountStore>,
		tokens: Arc<BearerTokenService>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			accounts,
			tokens,
			mirror: Arc::new(NoopMirror),
			clock: Arc::new(SystemClock),
			providers: BTreeMap::new(),
		}
	}

	/// Registers (or replaces) a provider.
	pub fn with_provider(mut self, client: ProviderClient) -> Self {
		self.providers.insert(client.provider(), client);

		self
	}

	/// Replaces the identity mirror.
	pub fn with_mirror(mut self, mirror: Arc<dyn IdentityMirror>) -> Self {
		self.mirror = mirror;

		self
	}

	/// Replaces the time source used for reconciliation timestamps.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Registration for `provider`.
	pub fn provider(&self, provider: Provider) -> Result<&ProviderClient> {
		self.providers
			.get(&provider)
			.ok_or_else(|| ConfigError::ProviderNotConfigured { provider }.into())
	}

	/// Providers with a registration, in stable order.
	pub fn configured_providers(&self) -> impl Iterator<Item = Provider> + '_ {
		self.providers.keys().copied()
	}

	/// Resolves a bearer credential to the principal it was issued for.
	///
	/// Verification never touches the credential store. A principal that no longer exists
	/// is [`Error::Unauthenticated`]; a suspended one is [`Error::Forbidden`].
	pub async fn authenticate(&self, bearer: &str) -> Result<(BearerClaims, Principal)> {
		let claims = self.tokens.verify(bearer)?;
		let principal = self
			.accounts
			.find_by_id(&claims.sub)
			.await?
			.ok_or_else(|| Error::unauthenticated("principal no longer exists"))?;

		if !principal.is_active() {
			return Err(Error::forbidden(format!("account is {}", principal.status.as_str())));
		}

		Ok((claims, principal))
	}
}
impl ReqwestIdentityFlows {
	/// Creates flows backed by a default reqwest transport.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		accounts: Arc<dyn AccountStore>,
		tokens: Arc<BearerTokenService>,
	) -> Self {
		Self::with_http_client(
			store,
			accounts,
			tokens,
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
	}

	/// Wires flows from `config`, registering every provider with credentials.
	pub fn from_config(
		config: &Config,
		store: Arc<dyn CredentialStore>,
		accounts: Arc<dyn AccountStore>,
	) -> Result<Self> {
		let tokens = Arc::new(BearerTokenService::new(&config.jwt_secret, config.jwt_ttl)?);
		let http_client = ReqwestHttpClient::with_timeout(config.provider_timeout)?;
		let mut flows = Self::with_http_client(
			store,
			accounts,
			tokens,
			http_client,
			ReqwestTransportErrorMapper,
		);

		for provider in Provider::ALL {
			if let Some(credentials) = config.credentials(provider) {
				flows = flows.with_provider(ProviderClient::standard(provider, credentials)?);
			}
		}

		Ok(flows)
	}
}
impl<C, M> Debug for IdentityFlows<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityFlows")
			.field("providers", &self.providers)
			.field("tokens", &self.tokens)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{accounts::SqliteAccountStore, store::MemoryStore};

	async fn flows() -> ReqwestIdentityFlows {
		let accounts =
			SqliteAccountStore::open_in_memory().await.expect("Account store should open.");
		let tokens = BearerTokenService::new(&Secret::new("signing-secret"), Duration::HOUR)
			.expect("Token service should build.");

		ReqwestIdentityFlows::new(
			Arc::new(MemoryStore::default()),
			Arc::new(accounts),
			Arc::new(tokens),
		)
	}

	#[tokio::test]
	async fn unregistered_provider_is_not_configured() {
		let flows = flows().await;
		let err = flows.provider(Provider::Line).expect_err("LINE is not registered.");

		assert_eq!(err.status(), 503);
	}

	#[tokio::test]
	async fn registration_is_keyed_by_provider() {
		let redirect = Url::parse("https://chatshare.example/api/v1/auth/line/callback")
			.expect("Redirect fixture should parse.");
		let credentials = ProviderCredentials {
			client_id: "channel".into(),
			client_secret: Secret::new("channel-secret"),
			redirect_uri: redirect,
		};
		let flows = flows().await.with_provider(
			ProviderClient::standard(Provider::Line, &credentials)
				.expect("Standard LINE registration should build."),
		);

		assert_eq!(flows.configured_providers().collect::<Vec<_>>(), vec![Provider::Line]);
		assert_eq!(
			flows.provider(Provider::Line).expect("LINE should be registered.").client_id,
			"channel"
		);
	}

	#[tokio::test]
	async fn unknown_bearer_subject_is_unauthenticated() {
		let flows = flows().await;
		let ghost = crate::auth::PrincipalId::new("ghost").expect("Principal fixture should be valid.");
		let issued = flows
			.tokens
			.issue(&ghost, "ghost@example.com", crate::auth::Role::User)
			.expect("Issue should succeed.");
		let err = flows
			.authenticate(issued.token.expose())
			.await
			.expect_err("Deleted principal must not authenticate.");

		assert_eq!(err.status(), 401);
	}
}
