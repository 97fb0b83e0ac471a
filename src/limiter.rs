//! Fixed-window request gate evaluated before routing.
//!
//! Each client key owns one counter in the credential store. The first hit of a window
//! starts its TTL; later hits never extend it. Bursts straddling a window boundary can reach
//! roughly twice the ceiling.

// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome},
	store::{self, CredentialStore},
};

/// Ceiling and window applied to every client key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
	/// Requests allowed per window.
	pub ceiling: u64,
	/// Window length, started by the first request.
	pub window: Duration,
}
impl RateLimitPolicy {
	/// Creates a policy allowing `ceiling` requests per `window`.
	pub const fn new(ceiling: u64, window: Duration) -> Self {
		Self { ceiling, window }
	}
}

/// Admission returned for a request that passed the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
	/// Post-increment count for the current window.
	pub count: u64,
	/// Configured ceiling.
	pub limit: u64,
}
impl RateLimitDecision {
	/// Requests left in the current window.
	pub fn remaining(&self) -> u64 {
		self.limit.saturating_sub(self.count)
	}
}

/// Gate that counts requests per client key in the credential store.
#[derive(Clone)]
pub struct RateLimiter {
	store: Arc<dyn CredentialStore>,
	policy: RateLimitPolicy,
}
impl RateLimiter {
	/// Creates a gate over `store`.
	pub fn new(store: Arc<dyn CredentialStore>, policy: RateLimitPolicy) -> Self {
		Self { store, policy }
	}

	/// Active policy.
	pub fn policy(&self) -> RateLimitPolicy {
		self.policy
	}

	/// Counts one request for `client_key`.
	///
	/// Fails with [`Error::RateLimitExceeded`] once the count passes the ceiling, and with
	/// [`Error::StoreUnavailable`] when the store cannot be reached. The gate never admits a
	/// request it could not count.
	pub async fn check(&self, client_key: &str) -> Result<RateLimitDecision> {
		const KIND: FlowKind = FlowKind::RateLimit;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let key = store::rate_limit_key(client_key);
		let count = match self.store.increment_window(&key, self.policy.window).await {
			Ok(count) => count,
			Err(e) => {
				obs::error_event(KIND, "increment", &e);
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				return Err(e.into());
			},
		};
		let count = u64::try_from(count).unwrap_or_default();

		if count > self.policy.ceiling {
			obs::debug_event(KIND, "reject", &format_args!("client={client_key} count={count}"));
			obs::record_flow_outcome(KIND, FlowOutcome::Failure);

			return Err(Error::RateLimitExceeded { window: self.policy.window });
		}

		obs::record_flow_outcome(KIND, FlowOutcome::Success);

		Ok(RateLimitDecision { count, limit: self.policy.ceiling })
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter").field("policy", &self.policy).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		clock::ManualClock,
		store::{MemoryStore, StoreError, StoreFuture},
	};

	struct DownStore;
	impl CredentialStore for DownStore {
		fn put<'a>(&'a self, _: &'a str, _: &'a str, _: Duration) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Unavailable { message: "down".into() }) })
		}

		fn exists<'a>(&'a self, _: &'a str) -> StoreFuture<'a, bool> {
			Box::pin(async { Err(StoreError::Unavailable { message: "down".into() }) })
		}

		fn get<'a>(&'a self, _: &'a str) -> StoreFuture<'a, Option<String>> {
			Box::pin(async { Err(StoreError::Unavailable { message: "down".into() }) })
		}

		fn delete<'a>(&'a self, _: &'a str) -> StoreFuture<'a, bool> {
			Box::pin(async { Err(StoreError::Unavailable { message: "down".into() }) })
		}

		fn take<'a>(&'a self, _: &'a str) -> StoreFuture<'a, bool> {
			Box::pin(async { Err(StoreError::Unavailable { message: "down".into() }) })
		}

		fn increment<'a>(&'a self, _: &'a str) -> StoreFuture<'a, i64> {
			Box::pin(async { Err(StoreError::Unavailable { message: "down".into() }) })
		}

		fn expire<'a>(&'a self, _: &'a str, _: Duration) -> StoreFuture<'a, bool> {
			Box::pin(async { Err(StoreError::Unavailable { message: "down".into() }) })
		}

		fn increment_window<'a>(&'a self, _: &'a str, _: Duration) -> StoreFuture<'a, i64> {
			Box::pin(async { Err(StoreError::Timeout { operation: "increment_window".into() }) })
		}
	}

	#[tokio::test]
	async fn hundred_and_first_request_is_rejected() {
		let clock = ManualClock::new(macros::datetime!(2025-11-10 12:00 UTC));
		let limiter = RateLimiter::new(
			Arc::new(MemoryStore::with_clock(Arc::new(clock.clone()))),
			RateLimitPolicy::new(100, Duration::seconds(60)),
		);

		for n in 1..=100 {
			let decision = limiter.check("203.0.113.9").await.expect("Request should be admitted.");

			assert_eq!(decision.count, n);
			clock.advance(Duration::milliseconds(100));
		}

		let err = limiter.check("203.0.113.9").await.expect_err("101st request must be rejected.");

		assert_eq!(err.status(), 429);
		assert!(limiter.check("198.51.100.1").await.is_ok(), "Other clients keep their budget.");
	}

	#[tokio::test]
	async fn store_outage_fails_closed() {
		let limiter =
			RateLimiter::new(Arc::new(DownStore), RateLimitPolicy::new(5, Duration::MINUTE));
		let err = limiter.check("203.0.113.9").await.expect_err("Outage must reject the request.");

		assert!(matches!(err, Error::StoreUnavailable(StoreError::Timeout { .. })));
		assert_eq!(err.status(), 503);
	}

	#[cfg(feature = "metrics")]
	#[test]
	fn every_check_records_its_attempt_and_outcome() {
		// crates.io
		use metrics::{
			Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString,
			Unit,
		};

		#[derive(Default)]
		struct OutcomeRecorder(Arc<Mutex<Vec<String>>>);
		impl Recorder for OutcomeRecorder {
			fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

			fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

			fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

			fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
				let outcome = key
					.labels()
					.find(|label| label.key() == "outcome")
					.map(|label| label.value().to_owned())
					.unwrap_or_default();

				Counter::from_arc(Arc::new(OutcomeCounter { outcome, seen: self.0.clone() }))
			}

			fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
				Gauge::noop()
			}

			fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
				Histogram::noop()
			}
		}

		struct OutcomeCounter {
			outcome: String,
			seen: Arc<Mutex<Vec<String>>>,
		}
		impl CounterFn for OutcomeCounter {
			fn increment(&self, _: u64) {
				self.seen.lock().push(self.outcome.clone());
			}

			fn absolute(&self, _: u64) {}
		}

		let recorder = OutcomeRecorder::default();
		let policy = RateLimitPolicy::new(1, Duration::MINUTE);
		let limiter = RateLimiter::new(Arc::new(MemoryStore::default()), policy);
		let runtime = tokio::runtime::Builder::new_current_thread()
			.build()
			.expect("Test runtime should build.");

		metrics::with_local_recorder(&recorder, || {
			runtime.block_on(async {
				assert!(limiter.check("203.0.113.9").await.is_ok());
				assert!(limiter.check("203.0.113.9").await.is_err());
			})
		});

		assert_eq!(*recorder.0.lock(), ["attempt", "success", "attempt", "failure"]);
	}
}
