//! Thread-safe in-memory [`CredentialStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	store::{CredentialStore, StoreError, StoreFuture},
};

type EntryMap = Arc<RwLock<HashMap<String, Entry>>>;

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	expires_at: Option<OffsetDateTime>,
}
impl Entry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|deadline| now < deadline)
	}
}

/// Storage backend that keeps keys in-process.
///
/// Expiry is evaluated lazily against the injected [`Clock`], so advancing a
/// [`ManualClock`](crate::clock::ManualClock) past a TTL makes the key vanish without any
/// background sweeper.
#[derive(Clone)]
pub struct MemoryStore {
	entries: EntryMap,
	clock: Arc<dyn Clock>,
}
impl MemoryStore {
	/// Creates an empty store that reads time from `clock`.
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { entries: Default::default(), clock }
	}

	/// Number of live keys.
	pub fn len(&self) -> usize {
		let now = self.clock.now();

		self.entries.read().values().filter(|entry| entry.is_live(now)).count()
	}

	/// Returns `true` when no live key remains.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn live_entry<'m>(
		map: &'m mut HashMap<String, Entry>,
		key: &str,
		now: OffsetDateTime,
	) -> Option<&'m mut Entry> {
		if map.get(key).is_some_and(|entry| !entry.is_live(now)) {
			map.remove(key);
		}

		map.get_mut(key)
	}

	fn put_now(map: EntryMap, key: String, value: String, expires_at: OffsetDateTime) {
		map.write().insert(key, Entry { value, expires_at: Some(expires_at) });
	}

	fn get_now(map: EntryMap, key: &str, now: OffsetDateTime) -> Option<String> {
		map.read().get(key).filter(|entry| entry.is_live(now)).map(|entry| entry.value.clone())
	}

	fn take_now(map: EntryMap, key: &str, now: OffsetDateTime) -> bool {
		let mut guard = map.write();

		match guard.remove(key) {
			Some(entry) => entry.is_live(now),
			None => false,
		}
	}

	fn increment_now(
		map: EntryMap,
		key: &str,
		now: OffsetDateTime,
		window: Option<Duration>,
	) -> Result<i64, StoreError> {
		let mut guard = map.write();
		let count = match Self::live_entry(&mut guard, key, now) {
			Some(entry) => {
				let current = entry
					.value
					.parse::<i64>()
					.map_err(|_| StoreError::NotAnInteger { key: key.to_owned() })?;
				let next = current.saturating_add(1);

				entry.value = next.to_string();

				next
			},
			None => {
				guard.insert(key.to_owned(), Entry { value: "1".into(), expires_at: None });

				1
			},
		};

		if let (1, Some(window), Some(entry)) = (count, window, guard.get_mut(key)) {
			entry.expires_at = Some(now + window);
		}

		Ok(count)
	}

	fn expire_now(map: EntryMap, key: &str, now: OffsetDateTime, ttl: Duration) -> bool {
		let mut guard = map.write();

		match Self::live_entry(&mut guard, key, now) {
			Some(entry) if entry.expires_at.is_none() => {
				entry.expires_at = Some(now + ttl);

				true
			},
			_ => false,
		}
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}
}
impl Debug for MemoryStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryStore").field("keys", &self.entries.read().len()).finish()
	}
}
impl CredentialStore for MemoryStore {
	fn put<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
		let map = self.entries.clone();
		let expires_at = self.clock.now() + ttl;

		Box::pin(async move {
			Self::put_now(map, key.to_owned(), value.to_owned(), expires_at);

			Ok(())
		})
	}

	fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
		let map = self.entries.clone();
		let now = self.clock.now();

		Box::pin(async move { Ok(Self::get_now(map, key, now).is_some()) })
	}

	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.entries.clone();
		let now = self.clock.now();

		Box::pin(async move { Ok(Self::get_now(map, key, now)) })
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
		self.take(key)
	}

	fn take<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
		let map = self.entries.clone();
		let now = self.clock.now();

		Box::pin(async move { Ok(Self::take_now(map, key, now)) })
	}

	fn increment<'a>(&'a self, key: &'a str) -> StoreFuture<'a, i64> {
		let map = self.entries.clone();
		let now = self.clock.now();

		Box::pin(async move { Self::increment_now(map, key, now, None) })
	}

	fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, bool> {
		let map = self.entries.clone();
		let now = self.clock.now();

		Box::pin(async move { Ok(Self::expire_now(map, key, now, ttl)) })
	}

	fn increment_window<'a>(&'a self, key: &'a str, window: Duration) -> StoreFuture<'a, i64> {
		let map = self.entries.clone();
		let now = self.clock.now();

		Box::pin(async move { Self::increment_now(map, key, now, Some(window)) })
	}
}
