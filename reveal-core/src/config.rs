use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime configuration for the session engine (spec §6 "Configuration").
/// Deserializable so `reveal-server` can load it via the `config` crate and
/// hand it straight to `reveal_core`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
	pub broadcast_interval_ms: u64,
	pub chat_max_messages: usize,
	pub chat_max_length: usize,
	pub name_max_length: usize,
	pub ttl_session_hours: i64,
	pub ttl_post_reveal_hours: i64,
	pub vote_record_retention: usize,
	pub lifecycle_tick_interval_ms: u64,
	pub registry_reconcile_interval_secs: u64,
	pub rate_limit_window_secs: u64,
	pub activation_lead: Duration,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			broadcast_interval_ms: 500,
			chat_max_messages: 500,
			chat_max_length: 280,
			name_max_length: 50,
			ttl_session_hours: 24,
			ttl_post_reveal_hours: 1,
			vote_record_retention: 100,
			lifecycle_tick_interval_ms: 1_000,
			registry_reconcile_interval_secs: 60,
			rate_limit_window_secs: 1,
			activation_lead: Duration::from_secs(5 * 60),
		}
	}
}

impl RuntimeConfig {
	pub fn broadcast_interval(&self) -> Duration {
		Duration::from_millis(self.broadcast_interval_ms)
	}

	pub fn lifecycle_tick_interval(&self) -> Duration {
		Duration::from_millis(self.lifecycle_tick_interval_ms)
	}

	pub fn registry_reconcile_interval(&self) -> Duration {
		Duration::from_secs(self.registry_reconcile_interval_secs)
	}

	pub fn session_ttl(&self) -> Duration {
		Duration::from_secs((self.ttl_session_hours.max(0) as u64) * 3600)
	}

	pub fn post_reveal_ttl(&self) -> Duration {
		Duration::from_secs((self.ttl_post_reveal_hours.max(0) as u64) * 3600)
	}

	pub fn rate_limit_window(&self) -> Duration {
		Duration::from_secs(self.rate_limit_window_secs)
	}
}
