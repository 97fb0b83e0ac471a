//! Credential store contract for short-lived keys: OAuth state tokens, rate-limit counters,
//! and session blobs.
//!
//! Every key carries an optional time-to-live. Once the TTL elapses a key is indistinguishable
//! from one that never existed. All operations are independent and atomic per key; the store
//! never exposes partially applied writes.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")] pub use self::redis::RedisStore;

// self
use crate::_prelude::*;

/// Prefix for one-time OAuth state keys.
pub const STATE_KEY_PREFIX: &str = "oauth:state:";
/// Prefix for per-client rate-limit counters.
pub const RATE_LIMIT_KEY_PREFIX: &str = "rate_limit:";
/// Prefix for session blobs.
pub const SESSION_KEY_PREFIX: &str = "session:";
/// Sentinel value written for live state tokens.
pub const STATE_SENTINEL: &str = "valid";

/// Boxed future returned by every [`CredentialStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key-value store with per-key expiry.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Writes `value` under `key`, replacing any prior value, expiring after `ttl`.
	fn put<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;

	/// Returns whether `key` is live.
	fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

	/// Returns the live value stored under `key`.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Removes `key`, returning whether a live key was removed.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

	/// Atomically removes `key` and reports whether this caller removed it.
	///
	/// Among any number of concurrent callers for the same live key exactly one observes
	/// `true`.
	fn take<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

	/// Atomically increments the integer under `key`, creating it at `1` without a TTL.
	fn increment<'a>(&'a self, key: &'a str) -> StoreFuture<'a, i64>;

	/// Attaches `ttl` to `key` if it is live and has no expiry yet.
	fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, bool>;

	/// Atomically increments `key` and, when the result is `1`, starts its `window` TTL.
	///
	/// The increment and the expiry are applied as a single step so a counter can never be
	/// left without an expiry by a crash between the two.
	fn increment_window<'a>(&'a self, key: &'a str, window: Duration) -> StoreFuture<'a, i64>;
}

impl dyn CredentialStore {
	/// Stores an opaque session blob under `session:<id>`.
	pub async fn put_session(&self, id: &str, blob: &str, ttl: Duration) -> Result<(), StoreError> {
		self.put(&session_key(id), blob, ttl).await
	}

	/// Loads the session blob stored under `session:<id>`.
	pub async fn session(&self, id: &str) -> Result<Option<String>, StoreError> {
		self.get(&session_key(id)).await
	}

	/// Removes the session blob stored under `session:<id>`.
	pub async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
		self.delete(&session_key(id)).await
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend is unreachable or reported a failure.
	#[error("Backend failure: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// Operation exceeded the configured store timeout.
	#[error("Store operation `{operation}` timed out.")]
	Timeout {
		/// Operation label.
		operation: String,
	},
	/// Stored value cannot be interpreted for the requested operation.
	#[error("Value stored under `{key}` is not an integer.")]
	NotAnInteger {
		/// Offending key.
		key: String,
	},
}

/// Builds the store key for an OAuth state token.
pub fn state_key(token: &str) -> String {
	format!("{STATE_KEY_PREFIX}{token}")
}

/// Builds the store key for a client's rate-limit counter.
pub fn rate_limit_key(client: &str) -> String {
	format!("{RATE_LIMIT_KEY_PREFIX}{client}")
}

/// Builds the store key for a session blob.
pub fn session_key(id: &str) -> String {
	format!("{SESSION_KEY_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn keys_use_stable_prefixes() {
		assert_eq!(state_key("abc"), "oauth:state:abc");
		assert_eq!(rate_limit_key("203.0.113.9"), "rate_limit:203.0.113.9");
		assert_eq!(session_key("s-1"), "session:s-1");
	}

	#[tokio::test]
	async fn session_helpers_use_session_prefix() {
		let backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = backend.clone();

		store
			.put_session("s-1", "{\"user\":1}", Duration::hours(1))
			.await
			.expect("Session blob should be stored.");

		assert!(
			backend.exists("session:s-1").await.expect("Existence check should succeed."),
			"Session blob should live under the session prefix."
		);
		assert_eq!(
			store.session("s-1").await.expect("Session lookup should succeed.").as_deref(),
			Some("{\"user\":1}")
		);
		assert!(store.delete_session("s-1").await.expect("Session delete should succeed."));
		assert_eq!(store.session("s-1").await.expect("Session lookup should succeed."), None);
	}
}
