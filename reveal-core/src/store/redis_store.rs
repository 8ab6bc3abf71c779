use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};

use super::CacheStore;

/// Redis-backed `CacheStore`. No single call here is cross-key
/// transactional; callers compose the calls that need cross-key
/// consistency themselves.
#[derive(Clone)]
pub struct RedisCacheStore {
	con: MultiplexedConnection,
}

impl RedisCacheStore {
	pub fn new(con: MultiplexedConnection) -> Self {
		Self { con }
	}

	pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
		let client = redis::Client::open(redis_url)?;
		let con = client.get_multiplexed_tokio_connection().await?;
		Ok(Self::new(con))
	}
}

#[async_trait]
impl CacheStore for RedisCacheStore {
	async fn hash_set_all(&self, key: &str, fields: Vec<(String, String)>) -> anyhow::Result<()> {
		let mut con = self.con.clone();
		con.hset_multiple::<&str, String, String, ()>(key, &fields).await?;
		Ok(())
	}

	async fn hash_get_all(&self, key: &str) -> anyhow::Result<HashMap<String, String>> {
		let mut con = self.con.clone();
		let map: HashMap<String, String> = con.hgetall(key).await?;
		Ok(map)
	}

	async fn hash_set_field(&self, key: &str, field: &str, value: String) -> anyhow::Result<()> {
		let mut con = self.con.clone();
		con.hset::<&str, &str, String, ()>(key, field, value).await?;
		Ok(())
	}

	async fn hash_increment_field(&self, key: &str, field: &str, delta: i64) -> anyhow::Result<i64> {
		let mut con = self.con.clone();
		let value: i64 = con.hincr(key, field, delta).await?;
		Ok(value)
	}

	async fn set_add(&self, key: &str, member: &str) -> anyhow::Result<bool> {
		let mut con = self.con.clone();
		let added: i64 = con.sadd(key, member).await?;
		Ok(added > 0)
	}

	async fn set_remove(&self, key: &str, member: &str) -> anyhow::Result<()> {
		let mut con = self.con.clone();
		con.srem::<&str, &str, ()>(key, member).await?;
		Ok(())
	}

	async fn set_members(&self, key: &str) -> anyhow::Result<Vec<String>> {
		let mut con = self.con.clone();
		let members: Vec<String> = con.smembers(key).await?;
		Ok(members)
	}

	async fn set_contains(&self, key: &str, member: &str) -> anyhow::Result<bool> {
		let mut con = self.con.clone();
		let present: bool = con.sismember(key, member).await?;
		Ok(present)
	}

	async fn list_push_left(&self, key: &str, value: String) -> anyhow::Result<()> {
		let mut con = self.con.clone();
		con.lpush::<&str, String, ()>(key, value).await?;
		Ok(())
	}

	async fn list_trim(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<()> {
		let mut con = self.con.clone();
		con.ltrim::<&str, ()>(key, start, stop).await?;
		Ok(())
	}

	async fn list_range(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<Vec<String>> {
		let mut con = self.con.clone();
		let values: Vec<String> = con.lrange(key, start, stop).await?;
		Ok(values)
	}

	async fn string_set_ex(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()> {
		let mut con = self.con.clone();
		con.set_ex::<&str, String, ()>(key, value, ttl.as_secs().max(1)).await?;
		Ok(())
	}

	async fn string_set_nx_ex(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<bool> {
		let mut con = self.con.clone();
		let reply: Option<String> = redis::cmd("SET")
			.arg(key)
			.arg(value)
			.arg("NX")
			.arg("EX")
			.arg(ttl.as_secs().max(1))
			.query_async(&mut con)
			.await?;
		Ok(reply.is_some())
	}

	async fn string_get_del(&self, key: &str) -> anyhow::Result<Option<String>> {
		let mut con = self.con.clone();
		let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut con).await?;
		Ok(value)
	}

	async fn key_exists(&self, key: &str) -> anyhow::Result<bool> {
		let mut con = self.con.clone();
		let exists: bool = con.exists(key).await?;
		Ok(exists)
	}

	async fn key_expire(&self, key: &str, ttl: Duration) -> anyhow::Result<()> {
		let mut con = self.con.clone();
		con.expire::<&str, ()>(key, ttl.as_secs().max(1) as i64).await?;
		Ok(())
	}
}
