use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::{
	archive::{ArchiveSink, SessionArchive},
	model::Status,
	publisher::{publish_json, Publisher},
	registry::ActiveSessionRegistry,
	repository::SessionRepository,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RevealPayload {
	#[serde(rename = "type")]
	kind: &'static str,
	gender: crate::model::Outcome,
	final_votes: crate::model::VoteCount,
}

/// Component H (spec §4.H): the WAITING→LIVE→ENDED clock. Ticks every 1s
/// over the Active Session Registry's snapshot, never the cache set directly.
pub struct LifecycleController {
	repository: Arc<SessionRepository>,
	registry: Arc<ActiveSessionRegistry>,
	publisher: Arc<dyn Publisher>,
	archive: Arc<dyn ArchiveSink>,
	activation_lead: std::time::Duration,
	chat_max_messages: usize,
	on_finalized: Arc<dyn Fn() + Send + Sync>,
}

impl LifecycleController {
	pub fn new(
		repository: Arc<SessionRepository>,
		registry: Arc<ActiveSessionRegistry>,
		publisher: Arc<dyn Publisher>,
		archive: Arc<dyn ArchiveSink>,
		activation_lead: std::time::Duration,
		chat_max_messages: usize,
		on_finalized: Arc<dyn Fn() + Send + Sync>,
	) -> Self {
		Self { repository, registry, publisher, archive, activation_lead, chat_max_messages, on_finalized }
	}

	pub async fn run(self: Arc<Self>, tick_interval: std::time::Duration) {
		let mut ticker = tokio::time::interval(tick_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
		loop {
			ticker.tick().await;
			self.tick().await;
		}
	}

	/// One pass over the registry snapshot: activate due sessions, then
	/// finalize ended ones. A snapshot copy means in-loop unregister calls
	/// never invalidate traversal (spec §4.H "Iteration safety").
	pub async fn tick(&self) {
		let now = Utc::now();
		for id in self.registry.snapshot() {
			if let Err(error) = self.tick_one(&id, now).await {
				error!(session_id = %id, %error, "lifecycle tick failed for session");
			}
		}
	}

	async fn tick_one(&self, id: &str, now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
		let Some(session) = self.repository.get_session(id).await? else {
			// Phantom entry; the next reconcile() will evict it from the registry.
			return Ok(());
		};

		if session.status == Status::Waiting {
			let activation_threshold = session.reveal_time - ChronoDuration::from_std(self.activation_lead)?;
			if now >= activation_threshold {
				self.repository.set_status(id, Status::Live).await?;
			}
		}

		let still_not_ended = session.status != Status::Ended;
		if still_not_ended && now >= session.reveal_time {
			self.finalize(id).await?;
		}
		Ok(())
	}

	/// Idempotent against concurrent ticks: the first successful
	/// `setStatus(ENDED)` removes the id from both the ActiveSessionSet and
	/// the Registry, so a second tick observing the same snapshot entry
	/// finds the session already gone from the cache's live check.
	async fn finalize(&self, id: &str) -> anyhow::Result<()> {
		let Some(session) = self.repository.get_session(id).await? else { return Ok(()) };
		if session.status == Status::Ended {
			return Ok(());
		}

		let final_votes = self.repository.get_votes(id).await?;
		// The list is already trimmed to this bound on every append, so this
		// retrieves the session's complete retained chat history.
		let chat_history = self.repository.get_recent_chat(id, self.chat_max_messages).await?;
		let ended_at = Utc::now();

		let archive = SessionArchive {
			session_id: id.to_string(),
			owner_id: session.owner_id.clone(),
			outcome: session.outcome,
			final_votes,
			chat_history,
			created_at: session.created_at,
			reveal_time: session.reveal_time,
			ended_at,
		};
		if let Err(error) = self.archive.write(&archive).await {
			// Best-effort; cache data survives the post-reveal TTL for recovery.
			warn!(session_id = %id, %error, "archive write failed at finalization");
		}

		publish_json(
			self.publisher.as_ref(),
			&format!("votes/{id}"),
			&RevealPayload { kind: "reveal", gender: session.outcome, final_votes },
		)
		.await;

		self.repository.set_status(id, Status::Ended).await?;
		self.repository.remove_active(id).await?;
		self.repository.apply_post_reveal_ttl(id).await?;
		self.registry.unregister(id);
		(self.on_finalized)();
		info!(session_id = %id, "session finalized");
		Ok(())
	}
}
