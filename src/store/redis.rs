//! Redis-backed [`CredentialStore`] shared by every service instance.

// crates.io
use ::redis::{Client, RedisError, RedisResult, Script, aio::ConnectionManager, cmd};
// self
use crate::{
	_prelude::*,
	store::{CredentialStore, StoreError, StoreFuture},
};

const PING_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
const INCREMENT_WINDOW_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
	redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
";
const EXPIRE_IF_UNSET_SCRIPT: &str = r"
if redis.call('PTTL', KEYS[1]) == -1 then
	return redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return 0
";

/// Store that talks to Redis over a multiplexed, auto-reconnecting connection.
///
/// Every operation is bounded by the configured timeout; a slow or unreachable server surfaces
/// as [`StoreError::Timeout`] or [`StoreError::Unavailable`] instead of stalling the request.
#[derive(Clone)]
pub struct RedisStore {
	connection: ConnectionManager,
	timeout: std::time::Duration,
	increment_window: Arc<Script>,
	expire_if_unset: Arc<Script>,
}
impl RedisStore {
	/// Opens a connection to `url` and verifies it with `PING`.
	pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
		let client = Client::open(url).map_err(unavailable)?;
		let connection = tokio::time::timeout(PING_TIMEOUT, ConnectionManager::new(client))
			.await
			.map_err(|_| StoreError::Timeout { operation: "connect".into() })?
			.map_err(unavailable)?;
		let store = Self {
			connection,
			timeout: timeout.unsigned_abs(),
			increment_window: Arc::new(Script::new(INCREMENT_WINDOW_SCRIPT)),
			expire_if_unset: Arc::new(Script::new(EXPIRE_IF_UNSET_SCRIPT)),
		};

		store.ping().await?;

		Ok(store)
	}

	/// Round-trips a `PING` to the server.
	pub async fn ping(&self) -> Result<(), StoreError> {
		let mut conn = self.connection.clone();
		let pending = async move {
			let reply: RedisResult<String> = cmd("PING").query_async(&mut conn).await;

			reply
		};

		match tokio::time::timeout(PING_TIMEOUT, pending).await {
			Ok(reply) => reply.map(|_| ()).map_err(unavailable),
			Err(_) => Err(StoreError::Timeout { operation: "ping".into() }),
		}
	}

	async fn bounded<T>(
		&self,
		operation: &'static str,
		pending: impl Future<Output = RedisResult<T>>,
	) -> Result<T, StoreError> {
		match tokio::time::timeout(self.timeout, pending).await {
			Ok(result) => result.map_err(unavailable),
			Err(_) => Err(StoreError::Timeout { operation: operation.into() }),
		}
	}
}
impl Debug for RedisStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisStore").field("timeout", &self.timeout).finish()
	}
}
impl CredentialStore for RedisStore {
	fn put<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut conn = self.connection.clone();
			let mut command = cmd("SET");

			command.arg(key).arg(value).arg("PX").arg(ttl_millis(ttl));

			self.bounded("put", async move {
				let reply: RedisResult<()> = command.query_async(&mut conn).await;

				reply
			})
			.await
		})
	}

	fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut conn = self.connection.clone();
			let mut command = cmd("EXISTS");

			command.arg(key);

			let count = self
				.bounded("exists", async move {
					let reply: RedisResult<i64> = command.query_async(&mut conn).await;

					reply
				})
				.await?;

			Ok(count > 0)
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			let mut conn = self.connection.clone();
			let mut command = cmd("GET");

			command.arg(key);

			self.bounded("get", async move {
				let reply: RedisResult<Option<String>> = command.query_async(&mut conn).await;

				reply
			})
			.await
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
		self.take(key)
	}

	fn take<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut conn = self.connection.clone();
			let mut command = cmd("DEL");

			command.arg(key);

			// `DEL` reports the number of keys it removed, so only one caller ever sees 1.
			let removed = self
				.bounded("take", async move {
					let reply: RedisResult<i64> = command.query_async(&mut conn).await;

					reply
				})
				.await?;

			Ok(removed == 1)
		})
	}

	fn increment<'a>(&'a self, key: &'a str) -> StoreFuture<'a, i64> {
		Box::pin(async move {
			let mut conn = self.connection.clone();
			let mut command = cmd("INCR");

			command.arg(key);

			self.bounded("increment", async move {
				let reply: RedisResult<i64> = command.query_async(&mut conn).await;

				reply
			})
			.await
		})
	}

	fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut conn = self.connection.clone();
			let mut invocation = self.expire_if_unset.prepare_invoke();

			invocation.key(key).arg(ttl_millis(ttl));

			let applied = self
				.bounded("expire", async move {
					let reply: RedisResult<i64> = invocation.invoke_async(&mut conn).await;

					reply
				})
				.await?;

			Ok(applied == 1)
		})
	}

	fn increment_window<'a>(&'a self, key: &'a str, window: Duration) -> StoreFuture<'a, i64> {
		Box::pin(async move {
			let mut conn = self.connection.clone();
			let mut invocation = self.increment_window.prepare_invoke();

			invocation.key(key).arg(ttl_millis(window));

			self.bounded("increment_window", async move {
				let reply: RedisResult<i64> = invocation.invoke_async(&mut conn).await;

				reply
			})
			.await
		})
	}
}

fn unavailable(err: RedisError) -> StoreError {
	StoreError::Unavailable { message: err.to_string() }
}

fn ttl_millis(ttl: Duration) -> i64 {
	i64::try_from(ttl.whole_milliseconds()).unwrap_or(i64::MAX).max(1)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn ttl_is_clamped_to_a_positive_millisecond_count() {
		assert_eq!(ttl_millis(Duration::minutes(10)), 600_000);
		assert_eq!(ttl_millis(Duration::ZERO), 1);
		assert_eq!(ttl_millis(Duration::seconds(-3)), 1);
	}

	#[tokio::test]
	async fn malformed_url_is_reported_as_unavailable() {
		let err = RedisStore::connect("not a redis url", Duration::seconds(1))
			.await
			.expect_err("Malformed URL should be rejected.");

		assert!(matches!(err, StoreError::Unavailable { .. }));
	}

	#[tokio::test]
	async fn unreachable_server_fails_closed() {
		let err = RedisStore::connect("redis://127.0.0.1:1/0", Duration::seconds(1))
			.await
			.expect_err("Connecting to a closed port should fail.");

		assert!(matches!(err, StoreError::Unavailable { .. } | StoreError::Timeout { .. }));
	}
}
