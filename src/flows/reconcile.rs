// self
use crate::{
	_prelude::*,
	accounts::{AccountStore, AccountStoreError, LoginUpdate},
	auth::{AccountStatus, Principal, PrincipalId, Provider, Role},
	provider::NormalizedProfile,
};

/// Result of matching a normalized profile against stored principals.
pub(super) struct Reconciled {
	pub(super) principal: Principal,
	pub(super) created: bool,
}

/// Finds or creates the principal for `(provider, profile.subject)`.
///
/// Returning principals get a profile refresh that leaves role and status untouched. A
/// concurrent first sign-in that wins the insert race turns ours into a refresh.
pub(super) async fn reconcile(
	accounts: &dyn AccountStore,
	provider: Provider,
	profile: NormalizedProfile,
	now: OffsetDateTime,
) -> Result<Reconciled> {
	if let Some(existing) = accounts.find_by_provider_subject(provider, &profile.subject).await? {
		return refresh(accounts, &existing.id, &profile, now).await;
	}

	let candidate = Principal {
		id: PrincipalId::generate(),
		email: profile.email.clone(),
		email_verified: profile.email_verified,
		display_name: profile.display_name.clone(),
		avatar_url: profile.avatar_url.clone(),
		provider,
		provider_subject_id: profile.subject.clone(),
		role: Role::User,
		status: AccountStatus::Active,
		last_login_at: Some(now),
		created_at: now,
		updated_at: now,
	};

	match accounts.insert_principal(&candidate).await {
		Ok(principal) => Ok(Reconciled { principal, created: true }),
		Err(AccountStoreError::Conflict { .. }) => {
			let winner = accounts
				.find_by_provider_subject(provider, &profile.subject)
				.await?
				.ok_or(AccountStoreError::NotFound)?;

			refresh(accounts, &winner.id, &profile, now).await
		},
		Err(e) => Err(e.into()),
	}
}

async fn refresh(
	accounts: &dyn AccountStore,
	id: &PrincipalId,
	profile: &NormalizedProfile,
	now: OffsetDateTime,
) -> Result<Reconciled> {
	let update = LoginUpdate {
		display_name: profile.display_name.clone(),
		avatar_url: profile.avatar_url.clone(),
		email_verified: profile.email_verified,
		last_login_at: now,
	};
	let principal = accounts.update_login(id, &update).await?;

	Ok(Reconciled { principal, created: false })
}
