//! Authorization-code sign-in: state issuance, callback handling, and reconciliation.
//!
//! A request walks `Idle → StateIssued → CodeReceived → TokenExchanged → ProfileFetched →
//! Reconciled`. Any failure is terminal for that request; the caller restarts from
//! [`IdentityFlows::begin_authorization`].

// self
use crate::{
	_prelude::*,
	auth::{Principal, Provider},
	flows::{IdentityFlows, ProviderClient, reconcile, state},
	http::ProviderHttpClient,
	mirror::MirroredIdentity,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	token::IssuedToken,
};

/// Stages of a single sign-in attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizationStage {
	/// Nothing has happened yet.
	Idle,
	/// A state token was stored and the authorize URL handed out.
	StateIssued,
	/// The callback's state was consumed; the code is about to be exchanged.
	CodeReceived,
	/// The provider returned an access token.
	TokenExchanged,
	/// The provider profile was fetched and normalized.
	ProfileFetched,
	/// A principal was created or refreshed and a bearer credential issued.
	Reconciled,
}
impl AuthorizationStage {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthorizationStage::Idle => "idle",
			AuthorizationStage::StateIssued => "state_issued",
			AuthorizationStage::CodeReceived => "code_received",
			AuthorizationStage::TokenExchanged => "token_exchanged",
			AuthorizationStage::ProfileFetched => "profile_fetched",
			AuthorizationStage::Reconciled => "reconciled",
		}
	}
}

/// Authorize URL handed to the end user, plus the state embedded in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
	/// Provider the URL targets.
	pub provider: Provider,
	/// One-time state token; valid for [`state::STATE_TTL`].
	pub state: String,
	/// Fully-formed authorize URL.
	pub authorize_url: Url,
}

/// Successful sign-in.
#[derive(Clone, Debug)]
pub struct CompletedLogin {
	/// Reconciled principal.
	pub principal: Principal,
	/// Bearer credential issued for the principal.
	pub token: IssuedToken,
	/// Whether this sign-in registered the principal.
	pub created: bool,
}

impl<C, M> IdentityFlows<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Issues a state token and builds the authorize URL for `provider`.
	pub async fn begin_authorization(&self, provider: Provider) -> Result<AuthorizationRequest> {
		const KIND: FlowKind = FlowKind::BeginAuthorization;

		let span = FlowSpan::new(KIND, "begin_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let client = self.provider(provider)?;
				let state = state::generate_state();

				state::issue_state(self.store.as_ref(), &state).await?;

				let authorize_url = build_authorize_url(client, &state);

				Ok(AuthorizationRequest { provider, state, authorize_url })
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				obs::error_event(KIND, AuthorizationStage::Idle.as_str(), e);
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	/// Handles the provider callback for `provider`.
	///
	/// The state is consumed before anything else touches the network, so a replayed or
	/// concurrent duplicate callback fails with [`Error::InvalidOrExpiredState`] even if
	/// the first attempt fails later on.
	pub async fn complete_authorization(
		&self,
		provider: Provider,
		code: &str,
		state: &str,
	) -> Result<CompletedLogin> {
		const KIND: FlowKind = FlowKind::CompleteAuthorization;

		let span = FlowSpan::new(KIND, "complete_authorization");
		let mut stage = AuthorizationStage::StateIssued;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_callback(provider, code, state, &mut stage)).await;

		match &result {
			Ok(login) => {
				obs::debug_event(
					KIND,
					stage.as_str(),
					&format_args!("principal={} created={}", login.principal.id, login.created),
				);
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(e) => {
				if e.is_client_error() {
					obs::debug_event(KIND, stage.as_str(), e);
				} else {
					obs::error_event(KIND, stage.as_str(), e);
				}

				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn run_callback(
		&self,
		provider: Provider,
		code: &str,
		state: &str,
		stage: &mut AuthorizationStage,
	) -> Result<CompletedLogin> {
		let client = self.provider(provider)?;

		if code.is_empty() {
			return Err(Error::invalid_request("authorization code is required"));
		}
		if state.is_empty() {
			return Err(Error::invalid_request("state is required"));
		}

		state::consume_state(self.store.as_ref(), state).await?;

		*stage = AuthorizationStage::CodeReceived;

		let facade = <BasicFacade<C, M>>::from_descriptor(
			&client.descriptor,
			&client.client_id,
			&client.client_secret,
			&client.redirect_uri,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)?;
		let access_token = facade.exchange_code(code).await?;

		*stage = AuthorizationStage::TokenExchanged;

		let body = facade.fetch_profile(&access_token).await?;
		let profile = client.strategy.normalize_profile(&body)?;

		*stage = AuthorizationStage::ProfileFetched;

		let reconciled =
			reconcile::reconcile(self.accounts.as_ref(), provider, profile, self.clock.now())
				.await?;
		let principal = reconciled.principal;
		let token = self.tokens.issue(&principal.id, &principal.email, principal.role)?;

		*stage = AuthorizationStage::Reconciled;

		if let Err(e) = self.mirror.upsert(&MirroredIdentity::from_principal(&principal)).await {
			obs::warn_event(FlowKind::CompleteAuthorization, "mirror", &e);
		}

		Ok(CompletedLogin { principal, token, created: reconciled.created })
	}
}

fn build_authorize_url(client: &ProviderClient, state: &str) -> Url {
	let descriptor = &client.descriptor;
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &client.client_id);
	pairs.append_pair("redirect_uri", client.redirect_uri.as_str());
	pairs.append_pair("scope", &descriptor.scope_param());
	pairs.append_pair("state", state);

	for (key, value) in &descriptor.authorize_params {
		pairs.append_pair(key, value);
	}

	drop(pairs);

	url
}
