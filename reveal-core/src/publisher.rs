use async_trait::async_trait;
use serde::Serialize;

/// Component J (spec §4.J): abstract sink accepting (topic, payload).
/// Best-effort, non-blocking from the caller's perspective; the core does not
/// maintain subscriber lists — that is the transport's responsibility.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
	async fn publish(&self, topic: &str, payload: String);
}

/// Serializes `payload` to JSON and forwards it; swallows serialization
/// failures with a log line rather than panicking a hot admission path.
pub async fn publish_json(publisher: &dyn Publisher, topic: &str, payload: &impl Serialize) {
	match serde_json::to_string(payload) {
		Ok(encoded) => publisher.publish(topic, encoded).await,
		Err(error) => tracing::error!(%error, %topic, "failed to encode publish payload"),
	}
}
