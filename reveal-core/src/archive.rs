use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::{
	error::ArchiveError,
	model::{ChatMessage, Outcome, VoteCount},
};

/// The final session document written once per session lifetime, at
/// finalization (spec §4.H step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionArchive {
	pub session_id: String,
	pub owner_id: String,
	pub outcome: Outcome,
	pub final_votes: VoteCount,
	pub chat_history: Vec<ChatMessage>,
	pub created_at: DateTime<Utc>,
	pub reveal_time: DateTime<Utc>,
	pub ended_at: DateTime<Utc>,
}

/// Component B (spec §4.B): one-shot write of the final session document,
/// plus the read path `GET /api/reveals/{sessionId}` falls back to once a
/// session has aged out of the cache's post-reveal TTL (spec §6). Writes are
/// best-effort — callers log and move on rather than retry inline (§9 open
/// question).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArchiveSink: Send + Sync {
	async fn write(&self, archive: &SessionArchive) -> Result<(), ArchiveError>;

	async fn read(&self, session_id: &str) -> Result<Option<SessionArchive>, ArchiveError>;
}

/// Append-only JSON-lines file sink. Durable storage is outside this
/// session engine's scope, so this is deliberately the simplest thing that
/// satisfies the one-shot-write contract; a deployment wanting S3/Postgres
/// archival swaps in another `ArchiveSink` impl without touching the
/// Lifecycle Controller.
pub struct FileArchiveSink {
	path: std::path::PathBuf,
}

impl FileArchiveSink {
	pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

#[async_trait]
impl ArchiveSink for FileArchiveSink {
	async fn write(&self, archive: &SessionArchive) -> Result<(), ArchiveError> {
		let mut line = serde_json::to_string(archive).map_err(|e| ArchiveError(e.into()))?;
		line.push('\n');
		let mut file = tokio::fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(&self.path)
			.await
			.map_err(|e| ArchiveError(e.into()))?;
		file.write_all(line.as_bytes()).await.map_err(|e| ArchiveError(e.into()))?;
		Ok(())
	}

	async fn read(&self, session_id: &str) -> Result<Option<SessionArchive>, ArchiveError> {
		let contents = match tokio::fs::read_to_string(&self.path).await {
			Ok(contents) => contents,
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(error) => return Err(ArchiveError(error.into())),
		};
		// Scanned newest-first: a session can only be archived once, but this
		// keeps the lookup cheap to reason about if that ever changes.
		for line in contents.lines().rev() {
			if line.is_empty() {
				continue;
			}
			match serde_json::from_str::<SessionArchive>(line) {
				Ok(archive) if archive.session_id == session_id => return Ok(Some(archive)),
				Ok(_) => continue,
				Err(error) => warn!(%error, "skipping undecodable archive line"),
			}
		}
		Ok(None)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample(session_id: &str) -> SessionArchive {
		SessionArchive {
			session_id: session_id.to_string(),
			owner_id: "owner".into(),
			outcome: Outcome::A,
			final_votes: VoteCount { count_a: 2, count_b: 1 },
			chat_history: vec![],
			created_at: Utc::now(),
			reveal_time: Utc::now(),
			ended_at: Utc::now(),
		}
	}

	#[tokio::test]
	async fn writes_one_json_line_per_call() {
		let dir = std::env::temp_dir().join(format!("reveal-archive-test-{}", std::process::id()));
		let sink = FileArchiveSink::new(&dir);
		let archive = sample("s1");
		sink.write(&archive).await.unwrap();
		sink.write(&archive).await.unwrap();
		let contents = tokio::fs::read_to_string(&dir).await.unwrap();
		assert_eq!(contents.lines().count(), 2);
		tokio::fs::remove_file(&dir).await.unwrap();
	}

	#[tokio::test]
	async fn read_finds_matching_session_and_ignores_others() {
		let dir = std::env::temp_dir().join(format!("reveal-archive-test-read-{}", std::process::id()));
		let sink = FileArchiveSink::new(&dir);
		sink.write(&sample("s1")).await.unwrap();
		sink.write(&sample("s2")).await.unwrap();

		let found = sink.read("s2").await.unwrap();
		assert_eq!(found.unwrap().session_id, "s2");
		assert!(sink.read("missing").await.unwrap().is_none());
		tokio::fs::remove_file(&dir).await.unwrap();
	}

	#[tokio::test]
	async fn read_missing_file_returns_none() {
		let dir = std::env::temp_dir().join(format!("reveal-archive-test-missing-{}", std::process::id()));
		let sink = FileArchiveSink::new(&dir);
		assert!(sink.read("s1").await.unwrap().is_none());
	}
}
