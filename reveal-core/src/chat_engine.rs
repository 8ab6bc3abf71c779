use std::sync::Arc;

use serde::Serialize;

use crate::{
	error::StoreError,
	model::{ChatMessage, Status},
	publisher::{publish_json, Publisher},
	rate_limiter::RateLimiter,
	repository::SessionRepository,
	sanitize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
	Ok,
	RateLimited,
	Rejected,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatEventPayload<'a> {
	name: &'a str,
	body: &'a str,
	voter_id: &'a str,
	timestamp: chrono::DateTime<chrono::Utc>,
}

/// Component G (spec §4.G): rate-limited, length-bounded, sanitized chat
/// append and immediate fan-out.
pub struct ChatEngine {
	repository: Arc<SessionRepository>,
	rate_limiter: Arc<RateLimiter>,
	publisher: Arc<dyn Publisher>,
	name_max_length: usize,
	body_max_length: usize,
}

impl ChatEngine {
	pub fn new(
		repository: Arc<SessionRepository>,
		rate_limiter: Arc<RateLimiter>,
		publisher: Arc<dyn Publisher>,
		name_max_length: usize,
		body_max_length: usize,
	) -> Self {
		Self { repository, rate_limiter, publisher, name_max_length, body_max_length }
	}

	pub async fn send_message(&self, session_id: &str, name: &str, body: &str, voter_id: &str) -> Result<ChatOutcome, StoreError> {
		if !self.rate_limiter.admit(voter_id).await? {
			return Ok(ChatOutcome::RateLimited);
		}

		let session = match self.repository.get_session(session_id).await? {
			Some(session) => session,
			None => return Ok(ChatOutcome::Rejected),
		};
		if session.status == Status::Ended {
			return Ok(ChatOutcome::Rejected);
		}

		let clean_body = sanitize::clean(body, self.body_max_length);
		if clean_body.is_empty() {
			return Ok(ChatOutcome::Rejected);
		}
		let clean_name = sanitize::clean(name, self.name_max_length);

		let message = ChatMessage { name: clean_name, body: clean_body, voter_id: voter_id.to_string(), timestamp: chrono::Utc::now() };
		self.repository.append_chat(session_id, message.clone()).await?;

		let payload = ChatEventPayload { name: &message.name, body: &message.body, voter_id: &message.voter_id, timestamp: message.timestamp };
		publish_json(self.publisher.as_ref(), &format!("chat/{session_id}"), &payload).await;

		Ok(ChatOutcome::Ok)
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

	fn session_fields(status: &str) -> std::collections::HashMap<String, String> {
		let session = Session::new("s1".into(), "owner".into(), Outcome::A, chrono::Utc::now(), chrono::Utc::now());
		[
			("session_id".to_string(), session.session_id.clone()),
			("owner_id".to_string(), session.owner_id.clone()),
			("outcome".to_string(), session.outcome.as_str().to_string()),
			("status".to_string(), status.to_string()),
			("reveal_time".to_string(), session.reveal_time.to_rfc3339()),
			("created_at".to_string(), session.created_at.to_rfc3339()),
		]
		.into_iter()
		.collect()
	}

	fn limiter_admitting(admit: bool) -> Arc<RateLimiter> {
		let mut store = MockCacheStore::new();
		store.expect_string_set_nx_ex().times(1).returning(move |_, _, _| Ok(admit));
		Arc::new(RateLimiter::new(Arc::new(store), std::time::Duration::from_secs(1)))
	}

	#[tokio::test]
	async fn empty_body_after_trim_is_rejected() {
		let fields = session_fields("live");
		let mut cache = MockCacheStore::new();
		cache.expect_hash_get_all().times(1).returning(move |_| Ok(fields.clone()));
		let repository = Arc::new(SessionRepository::new(Arc::new(cache), crate::config::RuntimeConfig::default()));

		let engine = ChatEngine::new(repository, limiter_admitting(true), Arc::new(MockPublisher::new()), 50, 280);
		let outcome = engine.send_message("s1", "Alice", "   ", "v1").await.unwrap();
		assert_eq!(outcome, ChatOutcome::Rejected);
	}

	#[tokio::test]
	async fn ended_session_rejects_chat() {
		let fields = session_fields("ended");
		let mut cache = MockCacheStore::new();
		cache.expect_hash_get_all().times(1).returning(move |_| Ok(fields.clone()));
		let repository = Arc::new(SessionRepository::new(Arc::new(cache), crate::config::RuntimeConfig::default()));

		let engine = ChatEngine::new(repository, limiter_admitting(true), Arc::new(MockPublisher::new()), 50, 280);
		let outcome = engine.send_message("s1", "Alice", "hello", "v1").await.unwrap();
		assert_eq!(outcome, ChatOutcome::Rejected);
	}

	#[tokio::test]
	async fn valid_message_is_appended_and_published() {
		let fields = session_fields("live");
		let mut cache = MockCacheStore::new();
		cache.expect_hash_get_all().times(1).returning(move |_| Ok(fields.clone()));
		cache.expect_list_push_left().times(1).returning(|_, _| Ok(()));
		cache.expect_list_trim().times(1).returning(|_, _, _| Ok(()));
		cache.expect_key_expire().times(1).returning(|_, _| Ok(()));
		let repository = Arc::new(SessionRepository::new(Arc::new(cache), crate::config::RuntimeConfig::default()));

		let mut publisher = MockPublisher::new();
		publisher.expect_publish().withf(|topic, _| topic == "chat/s1").times(1).returning(|_, _| ());

		let engine = ChatEngine::new(repository, limiter_admitting(true), Arc::new(publisher), 50, 280);
		let outcome = engine.send_message("s1", "Alice", "  <b>hi</b>  ", "v1").await.unwrap();
		assert_eq!(outcome, ChatOutcome::Ok);
	}
}
