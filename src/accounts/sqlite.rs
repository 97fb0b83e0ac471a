//! SQLite-backed [`AccountStore`] built on sqlx.

// crates.io
use sqlx::{
	FromRow, SqlitePool,
	sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
// self
use crate::{
	_prelude::*,
	accounts::{
		AccountFuture, AccountStore, AccountStoreError, DELETION_CASCADE, DeletionReport,
		LoginUpdate,
	},
	auth::{AccountStatus, Principal, PrincipalId, Provider, ProviderSubjectId, Role},
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const PRINCIPAL_COLUMNS: &str = "id, email, email_verified, display_name, avatar_url, provider, \
	provider_subject_id, role, status, last_login_at, created_at, updated_at";

/// Account store persisted in SQLite.
///
/// Foreign keys are enforced on every connection and the bundled migrations run on open.
#[derive(Clone, Debug)]
pub struct SqliteAccountStore {
	pool: SqlitePool,
}
impl SqliteAccountStore {
	/// Opens (creating if missing) the database at `url` and applies migrations.
	pub async fn open(url: &str) -> Result<Self, AccountStoreError> {
		let options = SqliteConnectOptions::from_str(url)
			.map_err(backend)?
			.create_if_missing(true)
			.foreign_keys(true);
		let pool = SqlitePoolOptions::new().connect_with(options).await.map_err(backend)?;

		Self::migrate(pool).await
	}

	/// Opens a private in-memory database; data lives as long as the store.
	pub async fn open_in_memory() -> Result<Self, AccountStoreError> {
		let options = SqliteConnectOptions::from_str("sqlite::memory:")
			.map_err(backend)?
			.foreign_keys(true);
		// A single pinned connection keeps the in-memory database alive.
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.min_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(options)
			.await
			.map_err(backend)?;

		Self::migrate(pool).await
	}

	async fn migrate(pool: SqlitePool) -> Result<Self, AccountStoreError> {
		MIGRATOR.run(&pool).await.map_err(|e| AccountStoreError::Backend { message: e.to_string() })?;

		Ok(Self { pool })
	}

	/// Underlying connection pool.
	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Counts, per cascade table, the rows that reference `id`.
	///
	/// Tables reached through owned chats are counted by chat ownership.
	pub async fn owned_row_counts(
		&self,
		id: &PrincipalId,
	) -> Result<BTreeMap<&'static str, i64>, AccountStoreError> {
		let mut counts = BTreeMap::new();

		for step in DELETION_CASCADE {
			let Some((_, predicate)) = step.statement.split_once(" WHERE ") else {
				continue;
			};
			let query = format!("SELECT COUNT(*) FROM {} WHERE {predicate}", step.table);
			let (rows,): (i64,) =
				sqlx::query_as(&query).bind(id.as_ref()).fetch_one(&self.pool).await.map_err(backend)?;

			*counts.entry(step.table).or_insert(0) += rows;
		}

		Ok(counts)
	}

	async fn fetch_principal(
		&self,
		query: &str,
		binds: &[&str],
	) -> Result<Option<Principal>, AccountStoreError> {
		let mut statement = sqlx::query_as::<_, PrincipalRow>(query);

		for value in binds {
			statement = statement.bind(*value);
		}

		statement.fetch_optional(&self.pool).await.map_err(backend)?.map(Principal::try_from).transpose()
	}

	async fn require_by_id(&self, id: &PrincipalId) -> Result<Principal, AccountStoreError> {
		self.fetch_principal(&select_where("id = ?1"), &[id.as_ref()])
			.await?
			.ok_or(AccountStoreError::NotFound)
	}
}
impl AccountStore for SqliteAccountStore {
	fn find_by_provider_subject<'a>(
		&'a self,
		provider: Provider,
		subject: &'a ProviderSubjectId,
	) -> AccountFuture<'a, Option<Principal>> {
		Box::pin(async move {
			self.fetch_principal(
				&select_where("provider = ?1 AND provider_subject_id = ?2"),
				&[provider.as_str(), subject.as_ref()],
			)
			.await
		})
	}

	fn find_by_id<'a>(&'a self, id: &'a PrincipalId) -> AccountFuture<'a, Option<Principal>> {
		Box::pin(async move { self.fetch_principal(&select_where("id = ?1"), &[id.as_ref()]).await })
	}

	fn insert_principal<'a>(&'a self, principal: &'a Principal) -> AccountFuture<'a, Principal> {
		Box::pin(async move {
			sqlx::query(
				"INSERT INTO principals (id, email, email_verified, display_name, avatar_url, \
				 provider, provider_subject_id, role, status, last_login_at, created_at, updated_at) \
				 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
			)
			.bind(principal.id.as_ref())
			.bind(&principal.email)
			.bind(principal.email_verified)
			.bind(&principal.display_name)
			.bind(&principal.avatar_url)
			.bind(principal.provider.as_str())
			.bind(principal.provider_subject_id.as_ref())
			.bind(principal.role.as_str())
			.bind(principal.status.as_str())
			.bind(principal.last_login_at.map(OffsetDateTime::unix_timestamp))
			.bind(principal.created_at.unix_timestamp())
			.bind(principal.updated_at.unix_timestamp())
			.execute(&self.pool)
			.await
			.map_err(classify)?;

			self.require_by_id(&principal.id).await
		})
	}

	fn update_login<'a>(
		&'a self,
		id: &'a PrincipalId,
		update: &'a LoginUpdate,
	) -> AccountFuture<'a, Principal> {
		Box::pin(async move {
			let instant = update.last_login_at.unix_timestamp();
			let result = sqlx::query(
				"UPDATE principals SET display_name = ?2, avatar_url = ?3, email_verified = ?4, \
				 last_login_at = ?5, updated_at = ?5 WHERE id = ?1",
			)
			.bind(id.as_ref())
			.bind(&update.display_name)
			.bind(&update.avatar_url)
			.bind(update.email_verified)
			.bind(instant)
			.execute(&self.pool)
			.await
			.map_err(backend)?;

			if result.rows_affected() == 0 {
				return Err(AccountStoreError::NotFound);
			}

			self.require_by_id(id).await
		})
	}

	fn delete_account<'a>(&'a self, id: &'a PrincipalId) -> AccountFuture<'a, DeletionReport> {
		Box::pin(async move {
			let mut tx = self.pool.begin().await.map_err(backend)?;
			let mut removed = Vec::with_capacity(DELETION_CASCADE.len());

			// Dropping `tx` on any early return rolls the transaction back.
			for step in DELETION_CASCADE {
				let result = sqlx::query(step.statement)
					.bind(id.as_ref())
					.execute(&mut *tx)
					.await
					.map_err(|e| AccountStoreError::Backend {
						message: format!("{} step failed: {e}", step.table),
					})?;

				removed.push((step.table, result.rows_affected()));
			}

			if removed.last().is_none_or(|(_, rows)| *rows == 0) {
				tx.rollback().await.map_err(backend)?;

				return Err(AccountStoreError::NotFound);
			}

			tx.commit().await.map_err(backend)?;

			Ok(DeletionReport { subject: id.clone(), removed })
		})
	}
}

#[derive(FromRow)]
struct PrincipalRow {
	id: String,
	email: String,
	email_verified: bool,
	display_name: String,
	avatar_url: String,
	provider: String,
	provider_subject_id: String,
	role: String,
	status: String,
	last_login_at: Option<i64>,
	created_at: i64,
	updated_at: i64,
}
impl TryFrom<PrincipalRow> for Principal {
	type Error = AccountStoreError;

	fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: PrincipalId::new(&row.id).map_err(corrupted)?,
			email: row.email,
			email_verified: row.email_verified,
			display_name: row.display_name,
			avatar_url: row.avatar_url,
			provider: row.provider.parse::<Provider>().map_err(corrupted)?,
			provider_subject_id: ProviderSubjectId::new(&row.provider_subject_id)
				.map_err(corrupted)?,
			role: row.role.parse::<Role>().map_err(corrupted)?,
			status: row.status.parse::<AccountStatus>().map_err(corrupted)?,
			last_login_at: row.last_login_at.map(timestamp).transpose()?,
			created_at: timestamp(row.created_at)?,
			updated_at: timestamp(row.updated_at)?,
		})
	}
}

fn select_where(predicate: &str) -> String {
	format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE {predicate}")
}

fn timestamp(seconds: i64) -> Result<OffsetDateTime, AccountStoreError> {
	OffsetDateTime::from_unix_timestamp(seconds).map_err(corrupted)
}

fn backend(e: sqlx::Error) -> AccountStoreError {
	AccountStoreError::Backend { message: e.to_string() }
}

fn classify(e: sqlx::Error) -> AccountStoreError {
	match &e {
		sqlx::Error::Database(db) if db.is_unique_violation() =>
			AccountStoreError::Conflict { message: db.message().to_owned() },
		_ => backend(e),
	}
}

fn corrupted(e: impl Display) -> AccountStoreError {
	AccountStoreError::Corrupted { message: e.to_string() }
}
