mod redis_store;

pub use redis_store::RedisCacheStore;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;

/// Component A (spec §4.A): a thin typed facade over a remote key/value
/// service. All calls may fail with a transient error; callers decide
/// whether that is fatal (admission paths) or ignorable (broadcast/lifecycle
/// paths). No operation here is cross-key transactional.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
	async fn hash_set_all(&self, key: &str, fields: Vec<(String, String)>) -> anyhow::Result<()>;
	async fn hash_get_all(&self, key: &str) -> anyhow::Result<HashMap<String, String>>;
	async fn hash_set_field(&self, key: &str, field: &str, value: String) -> anyhow::Result<()>;
	async fn hash_increment_field(&self, key: &str, field: &str, delta: i64) -> anyhow::Result<i64>;

	/// Returns `true` iff `member` was newly added — the dedup primitive
	/// `recordVote` relies on (spec §4.D).
	async fn set_add(&self, key: &str, member: &str) -> anyhow::Result<bool>;
	async fn set_remove(&self, key: &str, member: &str) -> anyhow::Result<()>;
	async fn set_members(&self, key: &str) -> anyhow::Result<Vec<String>>;
	async fn set_contains(&self, key: &str, member: &str) -> anyhow::Result<bool>;

	async fn list_push_left(&self, key: &str, value: String) -> anyhow::Result<()>;
	async fn list_trim(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<()>;
	async fn list_range(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<Vec<String>>;

	async fn string_set_ex(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()>;
	/// Atomic SET-IF-NOT-EXISTS with TTL. Returns `true` if the value was
	/// set (i.e. the caller is admitted) — the Rate Limiter's primitive
	/// (spec §4.C).
	async fn string_set_nx_ex(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<bool>;
	/// Atomic get-and-delete, used for the DirtyFlag's test-and-clear
	/// semantics (spec §4.D `testAndClearDirty`).
	async fn string_get_del(&self, key: &str) -> anyhow::Result<Option<String>>;
	async fn key_exists(&self, key: &str) -> anyhow::Result<bool>;
	async fn key_expire(&self, key: &str, ttl: Duration) -> anyhow::Result<()>;
}
