use std::sync::Arc;

use crate::{error::StoreError, repository::ratelimit_key, store::CacheStore};

/// Component C (spec §4.C): per-voter 1-second sliding admission gate, applied
/// uniformly to vote and chat paths. Backed by the atomic SET-IF-NOT-EXISTS
/// primitive, so a two-step has-key-then-set race is never possible here.
pub struct RateLimiter {
	store: Arc<dyn CacheStore>,
	window: std::time::Duration,
}

impl RateLimiter {
	pub fn new(store: Arc<dyn CacheStore>, window: std::time::Duration) -> Self {
		Self { store, window }
	}

	/// Returns `true` iff `voter_id` is admitted this window.
	pub async fn admit(&self, voter_id: &str) -> Result<bool, StoreError> {
		self.store.string_set_nx_ex(&ratelimit_key(voter_id), "1".to_string(), self.window).await.map_err(StoreError)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MockCacheStore;

	#[tokio::test]
	async fn admits_once_then_rejects() {
		let mut mock = MockCacheStore::new();
		mock.expect_string_set_nx_ex().times(1).returning(|_, _, _| Ok(true));
		let limiter = RateLimiter::new(Arc::new(mock), std::time::Duration::from_secs(1));
		assert!(limiter.admit("v1").await.unwrap());
	}

	#[tokio::test]
	async fn rejects_when_store_reports_present() {
		let mut mock = MockCacheStore::new();
		mock.expect_string_set_nx_ex().times(1).returning(|_, _, _| Ok(false));
		let limiter = RateLimiter::new(Arc::new(mock), std::time::Duration::from_secs(1));
		assert!(!limiter.admit("v1").await.unwrap());
	}
}
