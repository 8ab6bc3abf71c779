use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
	config::RuntimeConfig,
	error::StoreError,
	model::{ChatMessage, Choice, Outcome, Session, Status, VoteCount, VoteRecord},
	store::CacheStore,
};

const ACTIVE_SESSIONS_KEY: &str = "active_sessions";

fn session_key(id: &str) -> String {
	format!("session:{id}")
}
fn votes_key(id: &str) -> String {
	format!("votes:{id}")
}
fn voters_key(id: &str) -> String {
	format!("voters:{id}")
}
fn voterecords_key(id: &str) -> String {
	format!("voterecords:{id}")
}
fn chat_key(id: &str) -> String {
	format!("chat:{id}")
}
fn dirty_key(id: &str) -> String {
	format!("dirty:{id}")
}
pub(crate) fn ratelimit_key(voter_id: &str) -> String {
	format!("ratelimit:{voter_id}")
}

/// Component D (spec §4.D): the concrete encoding of session, vote, chat,
/// dirty-flag, voter-set, and active-session records over a `CacheStore`.
/// Every write refreshes the session TTL.
pub struct SessionRepository {
	store: Arc<dyn CacheStore>,
	config: RuntimeConfig,
}

impl SessionRepository {
	pub fn new(store: Arc<dyn CacheStore>, config: RuntimeConfig) -> Self {
		Self { store, config }
	}

	pub async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
		let key = session_key(&session.session_id);
		let fields = vec![
			("session_id".to_string(), session.session_id.clone()),
			("owner_id".to_string(), session.owner_id.clone()),
			("outcome".to_string(), session.outcome.as_str().to_string()),
			("status".to_string(), status_str(session.status).to_string()),
			("reveal_time".to_string(), session.reveal_time.to_rfc3339()),
			("created_at".to_string(), session.created_at.to_rfc3339()),
		];
		self.store.hash_set_all(&key, fields).await.map_err(StoreError)?;
		self.store.key_expire(&key, self.config.session_ttl()).await.map_err(StoreError)?;
		self.store.set_add(ACTIVE_SESSIONS_KEY, &session.session_id).await.map_err(StoreError)?;
		Ok(())
	}

	pub async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
		let map = self.store.hash_get_all(&session_key(id)).await.map_err(StoreError)?;
		if map.is_empty() {
			return Ok(None);
		}
		Ok(decode_session(&map))
	}

	/// No-ops on a backward or no-op transition (spec §3 invariant: monotone
	/// WAITING -> LIVE -> ENDED, no backward transitions).
	pub async fn set_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
		if let Some(session) = self.get_session(id).await? {
			if session.status != status && !session.status.can_advance_to(status) {
				warn!(session_id = %id, from = ?session.status, to = ?status, "rejected illegal status transition");
				return Ok(());
			}
		}
		let key = session_key(id);
		self.store.hash_set_field(&key, "status", status_str(status).to_string()).await.map_err(StoreError)?;
		self.store.key_expire(&key, self.config.session_ttl()).await.map_err(StoreError)?;
		Ok(())
	}

	pub async fn session_exists(&self, id: &str) -> Result<bool, StoreError> {
		self.store.key_exists(&session_key(id)).await.map_err(StoreError)
	}

	pub async fn init_votes(&self, id: &str) -> Result<(), StoreError> {
		let key = votes_key(id);
		self.store
			.hash_set_all(&key, vec![("boy".to_string(), "0".to_string()), ("girl".to_string(), "0".to_string())])
			.await
			.map_err(StoreError)?;
		self.store.key_expire(&key, self.config.session_ttl()).await.map_err(StoreError)?;
		Ok(())
	}

	/// The set-add boolean is the dedup primitive; no separate check-then-act
	/// is used (spec §4.D). Returns `true` iff this was the voter's first
	/// successful vote in this session.
	pub async fn record_vote(&self, id: &str, voter_id: &str, choice: Choice, name: &str) -> Result<bool, StoreError> {
		let is_new = self.store.set_add(&voters_key(id), voter_id).await.map_err(StoreError)?;
		if !is_new {
			return Ok(false);
		}

		let field = match choice {
			Choice::A => "boy",
			Choice::B => "girl",
		};
		self.store.hash_increment_field(&votes_key(id), field, 1).await.map_err(StoreError)?;
		self.mark_dirty(id).await?;

		let record = VoteRecord { voter_id: voter_id.to_string(), name: name.to_string(), choice, timestamp: Utc::now() };
		let encoded = serde_json::to_string(&record).map_err(|e| StoreError(e.into()))?;
		self.store.list_push_left(&voterecords_key(id), encoded).await.map_err(StoreError)?;
		let retention = self.config.vote_record_retention.max(1) as isize;
		self.store.list_trim(&voterecords_key(id), 0, retention - 1).await.map_err(StoreError)?;

		self.refresh_session_ttls(id).await?;
		Ok(true)
	}

	pub async fn has_voted(&self, id: &str, voter_id: &str) -> Result<bool, StoreError> {
		self.store.set_contains(&voters_key(id), voter_id).await.map_err(StoreError)
	}

	pub async fn get_votes(&self, id: &str) -> Result<VoteCount, StoreError> {
		let map = self.store.hash_get_all(&votes_key(id)).await.map_err(StoreError)?;
		Ok(VoteCount {
			count_a: map.get("boy").and_then(|v| v.parse().ok()).unwrap_or(0),
			count_b: map.get("girl").and_then(|v| v.parse().ok()).unwrap_or(0),
		})
	}

	pub async fn append_chat(&self, id: &str, message: ChatMessage) -> Result<(), StoreError> {
		let encoded = serde_json::to_string(&message).map_err(|e| StoreError(e.into()))?;
		self.store.list_push_left(&chat_key(id), encoded).await.map_err(StoreError)?;
		let retention = self.config.chat_max_messages.max(1) as isize;
		self.store.list_trim(&chat_key(id), 0, retention - 1).await.map_err(StoreError)?;
		self.store.key_expire(&chat_key(id), self.config.session_ttl()).await.map_err(StoreError)?;
		Ok(())
	}

	/// Oldest-first, per spec §4.D. List storage is left-push + trim, so the
	/// most recent entries are at the head; callers get back the reverse.
	pub async fn get_recent_chat(&self, id: &str, n: usize) -> Result<Vec<ChatMessage>, StoreError> {
		let raw = self.store.list_range(&chat_key(id), 0, n.max(1) as isize - 1).await.map_err(StoreError)?;
		Ok(decode_oldest_first(raw))
	}

	pub async fn get_recent_votes(&self, id: &str, n: usize) -> Result<Vec<VoteRecord>, StoreError> {
		let raw = self.store.list_range(&voterecords_key(id), 0, n.max(1) as isize - 1).await.map_err(StoreError)?;
		Ok(decode_oldest_first(raw))
	}

	/// Atomic get-and-delete of the DirtyFlag (spec §4.D).
	pub async fn test_and_clear_dirty(&self, id: &str) -> Result<bool, StoreError> {
		let value = self.store.string_get_del(&dirty_key(id)).await.map_err(StoreError)?;
		Ok(value.is_some())
	}

	pub async fn mark_dirty(&self, id: &str) -> Result<(), StoreError> {
		self.store.string_set_ex(&dirty_key(id), "1".to_string(), self.config.session_ttl()).await.map_err(StoreError)
	}

	pub async fn active_sessions(&self) -> Result<Vec<String>, StoreError> {
		self.store.set_members(ACTIVE_SESSIONS_KEY).await.map_err(StoreError)
	}

	pub async fn remove_active(&self, id: &str) -> Result<(), StoreError> {
		self.store.set_remove(ACTIVE_SESSIONS_KEY, id).await.map_err(StoreError)
	}

	pub async fn apply_post_reveal_ttl(&self, id: &str) -> Result<(), StoreError> {
		let ttl = self.config.post_reveal_ttl();
		for key in [session_key(id), votes_key(id), voters_key(id), voterecords_key(id), chat_key(id)] {
			self.store.key_expire(&key, ttl).await.map_err(StoreError)?;
		}
		Ok(())
	}

	async fn refresh_session_ttls(&self, id: &str) -> Result<(), StoreError> {
		let ttl = self.config.session_ttl();
		for key in [session_key(id), votes_key(id), voters_key(id), voterecords_key(id)] {
			self.store.key_expire(&key, ttl).await.map_err(StoreError)?;
		}
		Ok(())
	}
}

fn status_str(status: Status) -> &'static str {
	match status {
		Status::Waiting => "waiting",
		Status::Live => "live",
		Status::Ended => "ended",
	}
}

fn parse_status(s: &str) -> Option<Status> {
	match s {
		"waiting" => Some(Status::Waiting),
		"live" => Some(Status::Live),
		"ended" => Some(Status::Ended),
		_ => None,
	}
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn decode_session(map: &HashMap<String, String>) -> Option<Session> {
	Some(Session {
		session_id: map.get("session_id")?.clone(),
		owner_id: map.get("owner_id")?.clone(),
		outcome: Outcome::parse(map.get("outcome")?)?,
		status: parse_status(map.get("status")?)?,
		reveal_time: parse_timestamp(map.get("reveal_time")?)?,
		created_at: parse_timestamp(map.get("created_at")?)?,
	})
}

/// List storage is most-recent-at-head; callers want oldest-first. Records
/// that fail to decode are skipped and logged rather than aborting the read
/// (spec §7 SerializationError policy).
fn decode_oldest_first<T: for<'de> serde::Deserialize<'de>>(mut raw: Vec<String>) -> Vec<T> {
	raw.reverse();
	raw.into_iter()
		.filter_map(|entry| match serde_json::from_str(&entry) {
			Ok(value) => Some(value),
			Err(error) => {
				warn!(%error, "skipping undecodable cache record");
				None
			},
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::CacheStore;
	use async_trait::async_trait;
	use parking_lot::Mutex;
	use std::collections::{HashMap as StdMap, HashSet};

	#[derive(Default)]
	struct MemoryStore {
		hashes: Mutex<StdMap<String, StdMap<String, String>>>,
		sets: Mutex<StdMap<String, HashSet<String>>>,
		lists: Mutex<StdMap<String, Vec<String>>>,
		strings: Mutex<StdMap<String, String>>,
	}

	#[async_trait]
	impl CacheStore for MemoryStore {
		async fn hash_set_all(&self, key: &str, fields: Vec<(String, String)>) -> anyhow::Result<()> {
			let mut hashes = self.hashes.lock();
			let entry = hashes.entry(key.to_string()).or_default();
			for (field, value) in fields {
				entry.insert(field, value);
			}
			Ok(())
		}

		async fn hash_get_all(&self, key: &str) -> anyhow::Result<HashMap<String, String>> {
			Ok(self.hashes.lock().get(key).cloned().unwrap_or_default().into_iter().collect())
		}

		async fn hash_set_field(&self, key: &str, field: &str, value: String) -> anyhow::Result<()> {
			self.hashes.lock().entry(key.to_string()).or_default().insert(field.to_string(), value);
			Ok(())
		}

		async fn hash_increment_field(&self, key: &str, field: &str, delta: i64) -> anyhow::Result<i64> {
			let mut hashes = self.hashes.lock();
			let entry = hashes.entry(key.to_string()).or_default();
			let current: i64 = entry.get(field).and_then(|v| v.parse().ok()).unwrap_or(0);
			let updated = current + delta;
			entry.insert(field.to_string(), updated.to_string());
			Ok(updated)
		}

		async fn set_add(&self, key: &str, member: &str) -> anyhow::Result<bool> {
			Ok(self.sets.lock().entry(key.to_string()).or_default().insert(member.to_string()))
		}

		async fn set_remove(&self, key: &str, member: &str) -> anyhow::Result<()> {
			if let Some(set) = self.sets.lock().get_mut(key) {
				set.remove(member);
			}
			Ok(())
		}

		async fn set_members(&self, key: &str) -> anyhow::Result<Vec<String>> {
			Ok(self.sets.lock().get(key).cloned().unwrap_or_default().into_iter().collect())
		}

		async fn set_contains(&self, key: &str, member: &str) -> anyhow::Result<bool> {
			Ok(self.sets.lock().get(key).map(|s| s.contains(member)).unwrap_or(false))
		}

		async fn list_push_left(&self, key: &str, value: String) -> anyhow::Result<()> {
			self.lists.lock().entry(key.to_string()).or_default().insert(0, value);
			Ok(())
		}

		async fn list_trim(&self, key: &str, _start: isize, stop: isize) -> anyhow::Result<()> {
			if let Some(list) = self.lists.lock().get_mut(key) {
				list.truncate((stop + 1).max(0) as usize);
			}
			Ok(())
		}

		async fn list_range(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<Vec<String>> {
			let list = self.lists.lock().get(key).cloned().unwrap_or_default();
			let start = start.max(0) as usize;
			let stop = ((stop + 1).max(0) as usize).min(list.len());
			Ok(if start >= stop { vec![] } else { list[start..stop].to_vec() })
		}

		async fn string_set_ex(&self, key: &str, value: String, _ttl: Duration) -> anyhow::Result<()> {
			self.strings.lock().insert(key.to_string(), value);
			Ok(())
		}

		async fn string_set_nx_ex(&self, key: &str, value: String, _ttl: Duration) -> anyhow::Result<bool> {
			let mut strings = self.strings.lock();
			if strings.contains_key(key) {
				Ok(false)
			} else {
				strings.insert(key.to_string(), value);
				Ok(true)
			}
		}

		async fn string_get_del(&self, key: &str) -> anyhow::Result<Option<String>> {
			Ok(self.strings.lock().remove(key))
		}

		async fn key_exists(&self, key: &str) -> anyhow::Result<bool> {
			Ok(self.hashes.lock().contains_key(key) || self.strings.lock().contains_key(key))
		}

		async fn key_expire(&self, _key: &str, _ttl: Duration) -> anyhow::Result<()> {
			Ok(())
		}
	}

	fn repo() -> SessionRepository {
		SessionRepository::new(Arc::new(MemoryStore::default()), RuntimeConfig::default())
	}

	#[tokio::test]
	async fn record_vote_is_idempotent_under_retry() {
		let repo = repo();
		repo.init_votes("s1").await.unwrap();
		assert!(repo.record_vote("s1", "v1", Choice::A, "Alice").await.unwrap());
		assert!(!repo.record_vote("s1", "v1", Choice::B, "Alice").await.unwrap());
		let counts = repo.get_votes("s1").await.unwrap();
		assert_eq!(counts, VoteCount { count_a: 1, count_b: 0 });
	}

	#[tokio::test]
	async fn vote_count_equals_voter_set_size() {
		let repo = repo();
		repo.init_votes("s1").await.unwrap();
		repo.record_vote("s1", "v1", Choice::A, "Alice").await.unwrap();
		repo.record_vote("s1", "v2", Choice::B, "Bob").await.unwrap();
		repo.record_vote("s1", "v3", Choice::A, "Eve").await.unwrap();
		let counts = repo.get_votes("s1").await.unwrap();
		assert_eq!(counts.total(), 3);
	}

	#[tokio::test]
	async fn dirty_flag_test_and_clear_is_one_shot() {
		let repo = repo();
		repo.mark_dirty("s1").await.unwrap();
		assert!(repo.test_and_clear_dirty("s1").await.unwrap());
		assert!(!repo.test_and_clear_dirty("s1").await.unwrap());
	}

	#[tokio::test]
	async fn chat_and_votes_are_returned_oldest_first() {
		let repo = repo();
		for voter in ["v1", "v2", "v3"] {
			repo.record_vote("s1", voter, Choice::A, voter).await.unwrap();
		}
		let records = repo.get_recent_votes("s1", 10).await.unwrap();
		let ids: Vec<_> = records.iter().map(|r| r.voter_id.as_str()).collect();
		assert_eq!(ids, vec!["v1", "v2", "v3"]);
	}

	proptest::proptest! {
		/// spec §8: "for all sessions s, countA(s) + countB(s) = |VoterSet(s)|
		/// at every observable state" — holds even when the same voter id
		/// votes repeatedly (only the first call per id should count).
		#[test]
		fn vote_total_always_equals_distinct_voter_count(
			casts in proptest::collection::vec((0usize..6, proptest::bool::ANY), 0..40)
		) {
			let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
			runtime.block_on(async {
				let repo = repo();
				repo.init_votes("s1").await.unwrap();
				let mut distinct = std::collections::HashSet::new();
				for (voter_index, pick_a) in casts {
					let voter_id = format!("v{voter_index}");
					let choice = if pick_a { Choice::A } else { Choice::B };
					repo.record_vote("s1", &voter_id, choice, &voter_id).await.unwrap();
					distinct.insert(voter_id);
				}
				let counts = repo.get_votes("s1").await.unwrap();
				assert_eq!(counts.total() as usize, distinct.len());
			});
		}
	}
}
