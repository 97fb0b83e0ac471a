//! Best-effort identity mirror towards an external identity service.
//!
//! Mirroring runs after a successful sign-in. Failures are logged and swallowed; they never
//! change the outcome of the sign-in.

// self
use crate::{_prelude::*, auth::Principal};

/// Boxed future returned by [`IdentityMirror::upsert`].
pub type MirrorFuture<'a> = Pin<Box<dyn Future<Output = Result<(), MirrorError>> + 'a + Send>>;

/// Identity record pushed to the external service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MirroredIdentity {
	/// Stable external identifier, `<provider>_<principal id>`.
	pub uid: String,
	/// Principal email.
	pub email: String,
	/// Whether the email was verified by the provider.
	pub email_verified: bool,
	/// Display name.
	pub display_name: String,
	/// Avatar URL, possibly empty.
	pub avatar_url: String,
}
impl MirroredIdentity {
	/// Projects a principal into its mirrored form.
	pub fn from_principal(principal: &Principal) -> Self {
		Self {
			uid: format!("{}_{}", principal.provider, principal.id),
			email: principal.email.clone(),
			email_verified: principal.email_verified,
			display_name: principal.display_name.clone(),
			avatar_url: principal.avatar_url.clone(),
		}
	}
}

/// Failure reported by an [`IdentityMirror`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Identity mirror failed: {message}.")]
pub struct MirrorError {
	/// Human-readable error payload.
	pub message: String,
}

/// External identity service that receives principal upserts.
pub trait IdentityMirror
where
	Self: Send + Sync,
{
	/// Creates or updates `identity` in the external service.
	fn upsert<'a>(&'a self, identity: &'a MirroredIdentity) -> MirrorFuture<'a>;
}

/// Mirror that accepts every upsert and does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMirror;
impl IdentityMirror for NoopMirror {
	fn upsert<'a>(&'a self, _identity: &'a MirroredIdentity) -> MirrorFuture<'a> {
		Box::pin(async { Ok(()) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{AccountStatus, PrincipalId, Provider, ProviderSubjectId, Role};

	#[test]
	fn uid_combines_provider_and_principal_id() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);
		let principal = Principal {
			id: PrincipalId::new("7c1d").expect("Principal fixture should be valid."),
			email: "a@example.com".into(),
			email_verified: true,
			display_name: "Ann".into(),
			avatar_url: String::new(),
			provider: Provider::Google,
			provider_subject_id: ProviderSubjectId::new("1098")
				.expect("Provider subject fixture should be valid."),
			role: Role::User,
			status: AccountStatus::Active,
			last_login_at: None,
			created_at: now,
			updated_at: now,
		};
		let identity = MirroredIdentity::from_principal(&principal);

		assert_eq!(identity.uid, "google_7c1d");
		assert!(identity.email_verified);
	}
}
