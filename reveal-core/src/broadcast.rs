use std::sync::Arc;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::error;

use crate::{publisher::{publish_json, Publisher}, registry::ActiveSessionRegistry, repository::SessionRepository};

#[derive(Debug, Serialize)]
struct VoteCountPayload {
	boy: u64,
	girl: u64,
}

/// Component I (spec §4.I): periodic, dirty-flag-gated emission of aggregate
/// vote counts. The empty-registry short-circuit is what gives the system
/// its "zero commands when idle" property (spec §8 S5).
pub struct BroadcastScheduler {
	repository: Arc<SessionRepository>,
	registry: Arc<ActiveSessionRegistry>,
	publisher: Arc<dyn Publisher>,
}

impl BroadcastScheduler {
	pub fn new(repository: Arc<SessionRepository>, registry: Arc<ActiveSessionRegistry>, publisher: Arc<dyn Publisher>) -> Self {
		Self { repository, registry, publisher }
	}

	pub async fn run(self: Arc<Self>, interval: std::time::Duration) {
		let mut ticker = tokio::time::interval(interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
		loop {
			ticker.tick().await;
			self.tick().await;
		}
	}

	pub async fn tick(&self) {
		if self.registry.is_empty() {
			return;
		}
		for id in self.registry.snapshot() {
			if let Err(error) = self.tick_one(&id).await {
				error!(session_id = %id, %error, "broadcast tick failed for session");
			}
		}
	}

	async fn tick_one(&self, id: &str) -> anyhow::Result<()> {
		if !self.repository.test_and_clear_dirty(id).await? {
			return Ok(());
		}
		let counts = self.repository.get_votes(id).await?;
		publish_json(self.publisher.as_ref(), &format!("votes/{id}"), &VoteCountPayload { boy: counts.count_a, girl: counts.count_b }).await;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{publisher::MockPublisher, store::MockCacheStore};

	#[tokio::test]
	async fn empty_registry_performs_zero_cache_operations() {
		let cache = MockCacheStore::new(); // no expectations set; any call panics
		let repository = Arc::new(SessionRepository::new(Arc::new(cache), crate::config::RuntimeConfig::default()));
		let registry = Arc::new(ActiveSessionRegistry::new());
		let scheduler = BroadcastScheduler::new(repository, registry, Arc::new(MockPublisher::new()));
		scheduler.tick().await;
	}

	#[tokio::test]
	async fn clean_session_is_skipped_without_publishing() {
		let mut cache = MockCacheStore::new();
		cache.expect_string_get_del().times(1).returning(|_| Ok(None));
		let repository = Arc::new(SessionRepository::new(Arc::new(cache), crate::config::RuntimeConfig::default()));
		let registry = Arc::new(ActiveSessionRegistry::new());
		registry.register("s1");
		let scheduler = BroadcastScheduler::new(repository, registry, Arc::new(MockPublisher::new()));
		scheduler.tick().await;
	}

	#[tokio::test]
	async fn dirty_session_broadcasts_aggregate_counts() {
		let mut cache = MockCacheStore::new();
		cache.expect_string_get_del().times(1).returning(|_| Ok(Some("1".to_string())));
		cache.expect_hash_get_all().times(1).returning(|_| Ok([("boy".to_string(), "3".to_string()), ("girl".to_string(), "1".to_string())].into_iter().collect()));
		let repository = Arc::new(SessionRepository::new(Arc::new(cache), crate::config::RuntimeConfig::default()));
		let registry = Arc::new(ActiveSessionRegistry::new());
		registry.register("s1");

		let mut publisher = MockPublisher::new();
		publisher.expect_publish().withf(|topic, payload| topic == "votes/s1" && payload == "{\"boy\":3,\"girl\":1}").times(1).returning(|_, _| ());

		let scheduler = BroadcastScheduler::new(repository, registry, Arc::new(publisher));
		scheduler.tick().await;
	}
}
