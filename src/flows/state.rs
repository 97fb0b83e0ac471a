//! One-time anti-forgery state tokens.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
// self
use crate::{
	_prelude::*,
	store::{self, CredentialStore, STATE_SENTINEL},
};

/// Lifetime of an issued state token.
pub const STATE_TTL: Duration = Duration::minutes(10);

const STATE_ENTROPY_BYTES: usize = 32;

/// Generates a URL-safe state token carrying 256 bits of randomness.
pub fn generate_state() -> String {
	let mut bytes = [0_u8; STATE_ENTROPY_BYTES];

	rand::rng().fill(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}

/// Persists `state` for [`STATE_TTL`].
pub async fn issue_state(store: &dyn CredentialStore, state: &str) -> Result<()> {
	store.put(&store::state_key(state), STATE_SENTINEL, STATE_TTL).await?;

	Ok(())
}

/// Validates and consumes `state` in a single atomic step.
///
/// Unknown, expired, and already consumed tokens all fail with
/// [`Error::InvalidOrExpiredState`]; a token validates at most once.
pub async fn consume_state(store: &dyn CredentialStore, state: &str) -> Result<()> {
	if state.is_empty() {
		return Err(Error::InvalidOrExpiredState);
	}
	if store.take(&store::state_key(state)).await? {
		Ok(())
	} else {
		Err(Error::InvalidOrExpiredState)
	}
}
