//! Registered principals and the closed enums describing them.

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, ProviderSubjectId},
};

/// Upstream identity providers supported for sign-in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
	/// Google OAuth 2.0 (provider A).
	Google,
	/// LINE Login v2.1 (provider B).
	Line,
}
impl Provider {
	/// Every supported provider, in a stable order.
	pub const ALL: [Provider; 2] = [Provider::Google, Provider::Line];

	/// Returns the stable label stored alongside principals.
	pub const fn as_str(self) -> &'static str {
		match self {
			Provider::Google => "google",
			Provider::Line => "line",
		}
	}
}
impl Display for Provider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Provider {
	type Err = UnknownLabel;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"google" => Ok(Provider::Google),
			"line" => Ok(Provider::Line),
			_ => Err(UnknownLabel { kind: "provider", value: s.to_owned() }),
		}
	}
}

/// Authorization role carried by principals and bearer credentials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// Regular member.
	#[default]
	User,
	/// Operator with access to administrative routes.
	Admin,
}
impl Role {
	/// Returns the stable label used in storage and tokens.
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::User => "user",
			Role::Admin => "admin",
		}
	}
}
impl FromStr for Role {
	type Err = UnknownLabel;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"user" => Ok(Role::User),
			"admin" => Ok(Role::Admin),
			_ => Err(UnknownLabel { kind: "role", value: s.to_owned() }),
		}
	}
}

/// Lifecycle status of a principal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
	/// Account may sign in and act.
	#[default]
	Active,
	/// Account is blocked from authenticated routes.
	Suspended,
	/// Account has been retired.
	Deleted,
}
impl AccountStatus {
	/// Returns the stable label used in storage.
	pub const fn as_str(self) -> &'static str {
		match self {
			AccountStatus::Active => "active",
			AccountStatus::Suspended => "suspended",
			AccountStatus::Deleted => "deleted",
		}
	}
}
impl FromStr for AccountStatus {
	type Err = UnknownLabel;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(AccountStatus::Active),
			"suspended" => Ok(AccountStatus::Suspended),
			"deleted" => Ok(AccountStatus::Deleted),
			_ => Err(UnknownLabel { kind: "status", value: s.to_owned() }),
		}
	}
}

/// Error returned when a stored label does not match any known variant.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown {kind} label `{value}`.")]
pub struct UnknownLabel {
	/// Which enum failed to parse.
	pub kind: &'static str,
	/// Offending label.
	pub value: String,
}

/// A registered end-user account.
///
/// `(provider, provider_subject_id)` is unique across all principals; a returning user is
/// always matched on that pair, never on email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	/// Internal identifier.
	pub id: PrincipalId,
	/// Email reported by the provider, or a synthesized placeholder.
	pub email: String,
	/// Whether the provider vouched for the email address.
	pub email_verified: bool,
	/// Display name.
	#[serde(rename = "name")]
	pub display_name: String,
	/// Avatar URL; empty when the provider has none.
	#[serde(rename = "avatar")]
	pub avatar_url: String,
	/// Provider that authenticated the principal.
	pub provider: Provider,
	/// Identifier the provider assigned to the user.
	#[serde(rename = "provider_id")]
	pub provider_subject_id: ProviderSubjectId,
	/// Authorization role.
	pub role: Role,
	/// Lifecycle status.
	pub status: AccountStatus,
	/// Most recent successful sign-in.
	#[serde(with = "time::serde::rfc3339::option")]
	pub last_login_at: Option<OffsetDateTime>,
	/// Registration instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Last modification instant.
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
impl Principal {
	/// Returns `true` when the principal may use authenticated routes.
	pub fn is_active(&self) -> bool {
		matches!(self.status, AccountStatus::Active)
	}

	/// Returns `true` when the principal holds the admin role.
	pub fn is_admin(&self) -> bool {
		matches!(self.role, Role::Admin)
	}
}
