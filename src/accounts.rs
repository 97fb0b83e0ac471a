//! Relational account store and the account lifecycle built on top of it.
//!
//! Principals are keyed on `(provider, provider_subject_id)`. Deleting an account removes
//! every row the principal owns or that references the principal inside one transaction,
//! in the order listed by [`DELETION_CASCADE`].

pub mod sqlite;

pub use sqlite::SqliteAccountStore;

// self
use crate::{
	_prelude::*,
	auth::{Principal, PrincipalId, Provider, ProviderSubjectId},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Boxed future returned by every [`AccountStore`] operation.
pub type AccountFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, AccountStoreError>> + 'a + Send>>;

/// Ordered deletion cascade; dependents always go before the rows they reference.
///
/// The first block removes rows authored by the principal, the second removes rows other
/// principals attached to chats the principal owns, then the chats and the principal.
pub const DELETION_CASCADE: &[DeletionStep] = &[
	DeletionStep { table: "goods", statement: "DELETE FROM goods WHERE user_id = ?1" },
	DeletionStep { table: "favorites", statement: "DELETE FROM favorites WHERE user_id = ?1" },
	DeletionStep {
		table: "favorite_users",
		statement: "DELETE FROM favorite_users WHERE user_id = ?1 OR target_user_id = ?1",
	},
	DeletionStep { table: "comments", statement: "DELETE FROM comments WHERE user_id = ?1" },
	DeletionStep { table: "views", statement: "DELETE FROM views WHERE user_id = ?1" },
	DeletionStep { table: "shares", statement: "DELETE FROM shares WHERE user_id = ?1" },
	DeletionStep {
		table: "chat_keywords",
		statement: "DELETE FROM chat_keywords WHERE chat_id IN (SELECT id FROM chats WHERE user_id = ?1)",
	},
	DeletionStep {
		table: "favorites",
		statement: "DELETE FROM favorites WHERE chat_id IN (SELECT id FROM chats WHERE user_id = ?1)",
	},
	DeletionStep {
		table: "goods",
		statement: "DELETE FROM goods WHERE chat_id IN (SELECT id FROM chats WHERE user_id = ?1)",
	},
	DeletionStep {
		table: "comments",
		statement: "DELETE FROM comments WHERE chat_id IN (SELECT id FROM chats WHERE user_id = ?1)",
	},
	DeletionStep {
		table: "views",
		statement: "DELETE FROM views WHERE chat_id IN (SELECT id FROM chats WHERE user_id = ?1)",
	},
	DeletionStep {
		table: "shares",
		statement: "DELETE FROM shares WHERE chat_id IN (SELECT id FROM chats WHERE user_id = ?1)",
	},
	DeletionStep { table: "chats", statement: "DELETE FROM chats WHERE user_id = ?1" },
	DeletionStep { table: "principals", statement: "DELETE FROM principals WHERE id = ?1" },
];

/// Persistent principal storage.
pub trait AccountStore
where
	Self: Send + Sync,
{
	/// Finds the principal registered for `(provider, subject)`.
	fn find_by_provider_subject<'a>(
		&'a self,
		provider: Provider,
		subject: &'a ProviderSubjectId,
	) -> AccountFuture<'a, Option<Principal>>;

	/// Finds a principal by internal id.
	fn find_by_id<'a>(&'a self, id: &'a PrincipalId) -> AccountFuture<'a, Option<Principal>>;

	/// Inserts a new principal and returns the stored row.
	///
	/// Fails with [`AccountStoreError::Conflict`] when `(provider, subject)` is taken.
	fn insert_principal<'a>(&'a self, principal: &'a Principal) -> AccountFuture<'a, Principal>;

	/// Applies the profile refresh of a returning sign-in and returns the stored row.
	///
	/// Role and status are never touched.
	fn update_login<'a>(
		&'a self,
		id: &'a PrincipalId,
		update: &'a LoginUpdate,
	) -> AccountFuture<'a, Principal>;

	/// Runs [`DELETION_CASCADE`] for `id` in a single transaction.
	///
	/// Fails with [`AccountStoreError::NotFound`] when no principal row was removed; any
	/// failure leaves every table unchanged.
	fn delete_account<'a>(&'a self, id: &'a PrincipalId) -> AccountFuture<'a, DeletionReport>;
}

/// Errors raised by [`AccountStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AccountStoreError {
	/// Database driver or query failure.
	#[error("Account store backend failed: {message}.")]
	Backend {
		/// Driver-supplied message.
		message: String,
	},
	/// Unique constraint violation.
	#[error("Account store conflict: {message}.")]
	Conflict {
		/// Driver-supplied message.
		message: String,
	},
	/// Target principal does not exist.
	#[error("Principal was not found.")]
	NotFound,
	/// Stored row could not be decoded.
	#[error("Stored principal row is corrupted: {message}.")]
	Corrupted {
		/// What failed to decode.
		message: String,
	},
}

/// Profile fields refreshed on every returning sign-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginUpdate {
	/// Display name reported by the provider.
	pub display_name: String,
	/// Avatar URL reported by the provider.
	pub avatar_url: String,
	/// Whether the provider vouched for the email.
	pub email_verified: bool,
	/// Sign-in instant; also becomes `updated_at`.
	pub last_login_at: OffsetDateTime,
}

/// One statement of the account deletion cascade.
///
/// Every statement binds the principal id as `?1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeletionStep {
	/// Table the statement removes rows from.
	pub table: &'static str,
	/// Parameterized `DELETE` statement.
	pub statement: &'static str,
}

/// Rows removed by a committed deletion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletionReport {
	/// Principal that was erased.
	pub subject: PrincipalId,
	/// Rows removed per cascade step, in execution order.
	pub removed: Vec<(&'static str, u64)>,
}
impl DeletionReport {
	/// Total number of rows removed across all steps.
	pub fn total(&self) -> u64 {
		self.removed.iter().map(|(_, rows)| rows).sum()
	}
}

/// Account operations exposed to the HTTP surface.
#[derive(Clone)]
pub struct AccountLifecycle {
	accounts: Arc<dyn AccountStore>,
}
impl AccountLifecycle {
	/// Wraps an account store.
	pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
		Self { accounts }
	}

	/// Erases `subject` and everything it owns.
	///
	/// A principal that no longer exists yields [`Error::Unauthenticated`]; any other failure
	/// yields [`Error::DeletionFailed`] after the transaction was rolled back.
	pub async fn delete_account(&self, subject: &PrincipalId) -> Result<DeletionReport> {
		const KIND: FlowKind = FlowKind::AccountDeletion;

		let span = FlowSpan::new(KIND, "delete_account");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.accounts.delete_account(subject)).await;

		match result {
			Ok(report) => {
				obs::debug_event(KIND, "delete_account", &format_args!("rows={}", report.total()));
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(report)
			},
			Err(AccountStoreError::NotFound) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				Err(Error::unauthenticated("principal no longer exists"))
			},
			Err(source) => {
				obs::error_event(KIND, "delete_account", &source);
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				Err(Error::DeletionFailed { source })
			},
		}
	}
}
impl Debug for AccountLifecycle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("AccountLifecycle(..)")
	}
}
