use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sanitized chat message. `name` and `body` are already HTML-escaped and
/// length-bounded by the time this is constructed (spec §4.G step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
	pub name: String,
	pub body: String,
	pub voter_id: String,
	pub timestamp: DateTime<Utc>,
}
