use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

use super::CacheStore;
use crate::error::Result;

/// Redis-backed store. Multi-step units run as MULTI/EXEC pipelines.
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        info!("Connected to Redis");
        Ok(Self { manager })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn list_push_capped(&self, key: &str, value: &str, cap: usize) -> Result<()> {
        let mut conn = self.manager.clone();
        if cap == 0 {
            // LTRIM with a 0..-1 range keeps everything; an empty cap means
            // the key should hold nothing at all.
            let _: () = conn.del(key).await?;
            return Ok(());
        }
        redis::pipe()
            .atomic()
            .lpush(key, value)
            .ignore()
            .ltrim(key, 0, cap as isize - 1)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let items: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(items)
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.lrem(key, 1, value).await?;
        Ok(())
    }

    async fn string_get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn string_set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn list_push_capped_with_string(
        &self,
        list_key: &str,
        value: &str,
        cap: usize,
        string_key: &str,
        string_value: &str,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.manager.clone();
        if cap == 0 {
            let _: () = conn.del(list_key).await?;
            let _: () = conn.set_ex(string_key, string_value, ttl.as_secs()).await?;
            return Ok(());
        }
        redis::pipe()
            .atomic()
            .lpush(list_key, value)
            .ignore()
            .ltrim(list_key, 0, cap as isize - 1)
            .ignore()
            .set_ex(string_key, string_value, ttl.as_secs())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.hdel(key, field).await?;
        Ok(())
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zset_range_by_score(&self, key: &str, max: f64) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let members: Vec<String> = conn.zrangebyscore(key, "-inf", max).await?;
        Ok(members)
    }

    async fn zset_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.zrem(key, member).await?;
        Ok(())
    }

    async fn zset_remove_with_hash_delete(
        &self,
        zset_key: &str,
        member: &str,
        hash_key: &str,
        field: &str,
    ) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::pipe()
            .atomic()
            .zrem(zset_key, member)
            .ignore()
            .hdel(hash_key, field)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
