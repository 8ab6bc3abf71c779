use std::collections::HashSet;

use parking_lot::RwLock;
use tracing::warn;

use crate::{error::StoreError, repository::SessionRepository};

/// Component E (spec §4.E): a process-local mirror of the cache store's
/// ActiveSessionSet. The Broadcast Scheduler and Lifecycle Controller consult
/// this instead of the cache directly, so an empty registry costs zero
/// cache round-trips per tick.
pub struct ActiveSessionRegistry {
	sessions: RwLock<HashSet<String>>,
}

impl Default for ActiveSessionRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl ActiveSessionRegistry {
	pub fn new() -> Self {
		Self { sessions: RwLock::new(HashSet::new()) }
	}

	/// Called by the session creation path.
	pub fn register(&self, id: impl Into<String>) {
		self.sessions.write().insert(id.into());
	}

	/// Called when a session transitions to ENDED.
	pub fn unregister(&self, id: &str) {
		self.sessions.write().remove(id);
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.read().is_empty()
	}

	/// Defensive copy; safe to iterate while concurrent unregister calls land.
	pub fn snapshot(&self) -> Vec<String> {
		self.sessions.read().iter().cloned().collect()
	}

	/// Every 60s (spec §4.E): verify each id in the cache's ActiveSessionSet
	/// still has a live Session key, evict phantoms from both the cache set
	/// and the in-process mirror, then adopt the verified set as truth.
	pub async fn reconcile(&self, repository: &SessionRepository) -> Result<(), StoreError> {
		let candidates = repository.active_sessions().await?;
		let mut verified = HashSet::with_capacity(candidates.len());
		for id in candidates {
			if repository.session_exists(&id).await? {
				verified.insert(id);
			} else {
				warn!(session_id = %id, "evicting phantom active-session id");
				repository.remove_active(&id).await?;
			}
		}
		*self.sessions.write() = verified;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn register_unregister_and_snapshot() {
		let registry = ActiveSessionRegistry::new();
		assert!(registry.is_empty());
		registry.register("s1");
		registry.register("s2");
		assert!(!registry.is_empty());
		let mut snapshot = registry.snapshot();
		snapshot.sort();
		assert_eq!(snapshot, vec!["s1".to_string(), "s2".to_string()]);
		registry.unregister("s1");
		assert_eq!(registry.snapshot(), vec!["s2".to_string()]);
	}
}
