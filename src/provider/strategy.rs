//! Provider strategy hooks that normalize profile payloads.
//!
//! Each provider returns its own profile shape; strategies map those shapes into a
//! [`NormalizedProfile`] so the reconciliation step never branches on the provider.

// self
use crate::{
	_prelude::*,
	auth::{Provider, ProviderSubjectId},
};

/// Strategy hook that turns a provider profile body into a [`NormalizedProfile`].
///
/// Implementors are `Send + Sync` and receive the raw response bytes so they stay
/// independent of any HTTP client.
pub trait ProviderStrategy: Send + Sync {
	/// Provider this strategy understands.
	fn provider(&self) -> Provider;

	/// Parses a profile response body.
	///
	/// Fails with [`Error::ProfileFetchFailed`] when the body is malformed or lacks a
	/// subject identifier.
	fn normalize_profile(&self, body: &[u8]) -> Result<NormalizedProfile>;
}

/// Provider-independent view of an authenticated end user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedProfile {
	/// Identifier assigned by the provider.
	pub subject: ProviderSubjectId,
	/// Email address; synthesized when the provider has none.
	pub email: String,
	/// Whether the provider vouched for the email.
	pub email_verified: bool,
	/// Display name.
	pub display_name: String,
	/// Avatar URL, possibly empty.
	pub avatar_url: String,
}

/// Returns the built-in strategy for `provider`.
pub fn strategy_for(provider: Provider) -> Arc<dyn ProviderStrategy> {
	match provider {
		Provider::Google => Arc::new(GoogleStrategy),
		Provider::Line => Arc::new(LineStrategy),
	}
}

/// Strategy for Google's `oauth2/v2/userinfo` payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct GoogleStrategy;
impl ProviderStrategy for GoogleStrategy {
	fn provider(&self) -> Provider {
		Provider::Google
	}

	fn normalize_profile(&self, body: &[u8]) -> Result<NormalizedProfile> {
		#[derive(Deserialize)]
		struct GoogleProfile {
			#[serde(default)]
			id: String,
			#[serde(default)]
			email: String,
			#[serde(default)]
			verified_email: bool,
			#[serde(default)]
			name: String,
			#[serde(default)]
			picture: String,
		}

		let profile: GoogleProfile = parse_profile(body)?;
		let subject = subject_id(&profile.id)?;
		let email = if profile.email.is_empty() {
			synthesized_email(Provider::Google, &subject)
		} else {
			profile.email
		};

		Ok(NormalizedProfile {
			subject,
			email,
			email_verified: profile.verified_email,
			display_name: profile.name,
			avatar_url: profile.picture,
		})
	}
}

/// Strategy for LINE's `v2/profile` payload.
///
/// LINE never shares a verified email through this endpoint, so every principal receives a
/// synthesized `<userId>@line.user` address with `email_verified = false`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineStrategy;
impl ProviderStrategy for LineStrategy {
	fn provider(&self) -> Provider {
		Provider::Line
	}

	fn normalize_profile(&self, body: &[u8]) -> Result<NormalizedProfile> {
		#[derive(Deserialize)]
		#[serde(rename_all = "camelCase")]
		struct LineProfile {
			#[serde(default)]
			user_id: String,
			#[serde(default)]
			display_name: String,
			#[serde(default)]
			picture_url: String,
		}

		let profile: LineProfile = parse_profile(body)?;
		let subject = subject_id(&profile.user_id)?;

		Ok(NormalizedProfile {
			email: synthesized_email(Provider::Line, &subject),
			subject,
			email_verified: false,
			display_name: profile.display_name,
			avatar_url: profile.picture_url,
		})
	}
}

/// Placeholder email for providers that do not share one.
pub fn synthesized_email(provider: Provider, subject: &ProviderSubjectId) -> String {
	format!("{subject}@{provider}.user")
}

fn parse_profile<T>(body: &[u8]) -> Result<T>
where
	T: for<'de> Deserialize<'de>,
{
	let deserializer = &mut serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(deserializer).map_err(|err| Error::ProfileFetchFailed {
		reason: format!("profile response is malformed at `{}`", err.path()),
	})
}

fn subject_id(raw: &str) -> Result<ProviderSubjectId> {
	ProviderSubjectId::new(raw).map_err(|err| Error::ProfileFetchFailed {
		reason: format!("profile subject is unusable: {err}"),
	})
}
