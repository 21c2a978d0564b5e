//! Shared key-value store behind the signal logs, profile cache, keyword
//! embeddings and active-conversation tracking.
//!
//! The trait models exactly the primitives the service needs: bounded list
//! push, hash and sorted-set access, TTL'd string values, and two composite
//! units that must commit atomically so concurrent readers never observe a
//! half-applied mutation.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

mod memory;
mod redis;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Push `value` to the front of the list at `key` and trim the list back
    /// to `cap`, as one atomic unit.
    async fn list_push_capped(&self, key: &str, value: &str, cap: usize) -> Result<()>;

    /// Full contents of the list at `key`, most recent first.
    async fn list_range(&self, key: &str) -> Result<Vec<String>>;

    /// Remove the first occurrence of `value` from the list at `key`.
    async fn list_remove(&self, key: &str, value: &str) -> Result<()>;

    async fn string_get(&self, key: &str) -> Result<Option<String>>;

    async fn string_set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Atomic unit: capped list push plus a TTL'd string write.
    async fn list_push_capped_with_string(
        &self,
        list_key: &str,
        value: &str,
        cap: usize,
        string_key: &str,
        string_value: &str,
        ttl: Duration,
    ) -> Result<()>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    async fn hash_delete(&self, key: &str, field: &str) -> Result<()>;

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Members with score <= `max`, ordered by ascending score.
    async fn zset_range_by_score(&self, key: &str, max: f64) -> Result<Vec<String>>;

    async fn zset_remove(&self, key: &str, member: &str) -> Result<()>;

    /// Atomic unit: remove a sorted-set member and delete a hash field,
    /// both-or-neither.
    async fn zset_remove_with_hash_delete(
        &self,
        zset_key: &str,
        member: &str,
        hash_key: &str,
        field: &str,
    ) -> Result<()>;
}
