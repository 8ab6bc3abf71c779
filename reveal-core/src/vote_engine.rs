use std::sync::Arc;

use serde::Serialize;

use crate::{
	error::StoreError,
	model::{Choice, Status, VoteRecord},
	publisher::{publish_json, Publisher},
	rate_limiter::RateLimiter,
	repository::SessionRepository,
	sanitize,
};

/// `castVote`'s semantic outcome (spec §4.F). `BadChoice` is raised as a
/// validation error at the transport boundary rather than threaded through
/// here — this enum covers only outcomes the core itself decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
	Ok,
	RateLimited,
	NotFound,
	Ended,
	AlreadyVoted,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoteEventPayload {
	voter_id: String,
	name: String,
	choice: Choice,
	timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&VoteRecord> for VoteEventPayload {
	fn from(record: &VoteRecord) -> Self {
		Self { voter_id: record.voter_id.clone(), name: record.name.clone(), choice: record.choice, timestamp: record.timestamp }
	}
}

/// Component F (spec §4.F): atomic vote admission.
pub struct VoteEngine {
	repository: Arc<SessionRepository>,
	rate_limiter: Arc<RateLimiter>,
	publisher: Arc<dyn Publisher>,
	name_max_length: usize,
}

impl VoteEngine {
	pub fn new(repository: Arc<SessionRepository>, rate_limiter: Arc<RateLimiter>, publisher: Arc<dyn Publisher>, name_max_length: usize) -> Self {
		Self { repository, rate_limiter, publisher, name_max_length }
	}

	pub async fn cast_vote(&self, session_id: &str, choice: Choice, voter_id: &str, name: &str) -> Result<VoteOutcome, StoreError> {
		if !self.rate_limiter.admit(voter_id).await? {
			return Ok(VoteOutcome::RateLimited);
		}

		let session = match self.repository.get_session(session_id).await? {
			Some(session) => session,
			None => return Ok(VoteOutcome::NotFound),
		};

		if session.status == Status::Ended {
			return Ok(VoteOutcome::Ended);
		}

		let clean_name = sanitize::clean_voter_name(name, self.name_max_length);
		let recorded = self.repository.record_vote(session_id, voter_id, choice, &clean_name).await?;
		if !recorded {
			return Ok(VoteOutcome::AlreadyVoted);
		}

		// Individual vote events are published synchronously; the aggregate
		// count is deferred to the Broadcast Scheduler (spec §4.F step 6).
		let record = VoteRecord { voter_id: voter_id.to_string(), name: clean_name, choice, timestamp: chrono::Utc::now() };
		publish_json(self.publisher.as_ref(), &format!("vote-events/{session_id}"), &VoteEventPayload::from(&record)).await;

		Ok(VoteOutcome::Ok)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		model::{Outcome, Session},
		publisher::MockPublisher,
		store::MockCacheStore,
	};

	fn waiting_session() -> Session {
		Session::new("s1".into(), "owner".into(), Outcome::A, chrono::Utc::now(), chrono::Utc::now())
	}

	fn session_fields(session: &Session) -> std::collections::HashMap<String, String> {
		[
			("session_id".to_string(), session.session_id.clone()),
			("owner_id".to_string(), session.owner_id.clone()),
			("outcome".to_string(), session.outcome.as_str().to_string()),
			("status".to_string(), "waiting".to_string()),
			("reveal_time".to_string(), session.reveal_time.to_rfc3339()),
			("created_at".to_string(), session.created_at.to_rfc3339()),
		]
		.into_iter()
		.collect()
	}

	#[tokio::test]
	async fn rate_limited_short_circuits_before_any_session_lookup() {
		let mut store = MockCacheStore::new();
		store.expect_string_set_nx_ex().times(1).returning(|_, _, _| Ok(false));
		let repository = Arc::new(SessionRepository::new(Arc::new(store), crate::config::RuntimeConfig::default()));
		let rate_limiter = Arc::new(RateLimiter::new(
			{
				let mut s = MockCacheStore::new();
				s.expect_string_set_nx_ex().times(1).returning(|_, _, _| Ok(false));
				Arc::new(s)
			},
			std::time::Duration::from_secs(1),
		));
		let engine = VoteEngine::new(repository, rate_limiter, Arc::new(MockPublisher::new()), 50);
		let outcome = engine.cast_vote("s1", Choice::A, "v1", "Alice").await.unwrap();
		assert_eq!(outcome, VoteOutcome::RateLimited);
	}

	#[tokio::test]
	async fn not_found_session_is_reported() {
		let mut cache = MockCacheStore::new();
		cache.expect_hash_get_all().times(1).returning(|_| Ok(Default::default()));
		let repository = Arc::new(SessionRepository::new(Arc::new(cache), crate::config::RuntimeConfig::default()));

		let mut limiter_store = MockCacheStore::new();
		limiter_store.expect_string_set_nx_ex().times(1).returning(|_, _, _| Ok(true));
		let rate_limiter = Arc::new(RateLimiter::new(Arc::new(limiter_store), std::time::Duration::from_secs(1)));

		let engine = VoteEngine::new(repository, rate_limiter, Arc::new(MockPublisher::new()), 50);
		let outcome = engine.cast_vote("missing", Choice::A, "v1", "Alice").await.unwrap();
		assert_eq!(outcome, VoteOutcome::NotFound);
	}

	#[tokio::test]
	async fn successful_vote_publishes_individual_event() {
		let session = waiting_session();
		let fields = session_fields(&session);

		let mut cache = MockCacheStore::new();
		cache.expect_hash_get_all().times(1).returning(move |_| Ok(fields.clone()));
		cache.expect_set_add().times(1).returning(|_, _| Ok(true));
		cache.expect_hash_increment_field().times(1).returning(|_, _, _| Ok(1));
		cache.expect_string_set_ex().times(1).returning(|_, _, _| Ok(()));
		cache.expect_list_push_left().times(1).returning(|_, _| Ok(()));
		cache.expect_list_trim().times(1).returning(|_, _, _| Ok(()));
		cache.expect_key_expire().times(4).returning(|_, _| Ok(()));
		let repository = Arc::new(SessionRepository::new(Arc::new(cache), crate::config::RuntimeConfig::default()));

		let mut limiter_store = MockCacheStore::new();
		limiter_store.expect_string_set_nx_ex().times(1).returning(|_, _, _| Ok(true));
		let rate_limiter = Arc::new(RateLimiter::new(Arc::new(limiter_store), std::time::Duration::from_secs(1)));

		let mut publisher = MockPublisher::new();
		publisher.expect_publish().withf(|topic, _| topic == "vote-events/s1").times(1).returning(|_, _| ());

		let engine = VoteEngine::new(repository, rate_limiter, Arc::new(publisher), 50);
		let outcome = engine.cast_vote("s1", Choice::A, "v1", "Alice").await.unwrap();
		assert_eq!(outcome, VoteOutcome::Ok);
	}
}
