//! In-memory store used by tests. Every operation takes the single
//! inner lock, so the composite units are atomic by construction.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::CacheStore;
use crate::error::Result;

#[derive(Default)]
struct Inner {
    lists: HashMap<String, Vec<String>>,
    strings: HashMap<String, (String, Option<Instant>)>,
    hashes: HashMap<String, HashMap<String, String>>,
    zsets: HashMap<String, HashMap<String, f64>>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn push_capped(list: &mut Vec<String>, value: &str, cap: usize) {
    list.insert(0, value.to_string());
    list.truncate(cap);
}

fn live_string(entry: &(String, Option<Instant>)) -> Option<String> {
    match entry.1 {
        Some(deadline) if Instant::now() >= deadline => None,
        _ => Some(entry.0.clone()),
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn list_push_capped(&self, key: &str, value: &str, cap: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let list = inner.lists.entry(key.to_string()).or_default();
        push_capped(list, value, cap);
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.lists.get(key).cloned().unwrap_or_default())
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(list) = inner.lists.get_mut(key) {
            if let Some(pos) = list.iter().position(|item| item == value) {
                list.remove(pos);
            }
        }
        Ok(())
    }

    async fn string_get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        let value = match inner.strings.get(key) {
            Some(entry) => live_string(entry),
            None => None,
        };
        if value.is_none() {
            inner.strings.remove(key);
        }
        Ok(value)
    }

    async fn string_set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .strings
            .insert(key.to_string(), (value.to_string(), Some(Instant::now() + ttl)));
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
        let mut inner = self.inner.lock().await;
        let list = inner.lists.entry(list_key.to_string()).or_default();
        push_capped(list, value, cap);
        inner.strings.insert(
            string_key.to_string(),
            (string_value.to_string(), Some(Instant::now() + ttl)),
        );
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .hashes
            .get(key)
            .and_then(|fields| fields.get(field).cloned()))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(fields) = inner.hashes.get_mut(key) {
            fields.remove(field);
        }
        Ok(())
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zset_range_by_score(&self, key: &str, max: f64) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        let mut matching: Vec<(String, f64)> = inner
            .zsets
            .get(key)
            .map(|members| {
                members
                    .iter()
                    .filter(|(_, score)| **score <= max)
                    .map(|(member, score)| (member.clone(), *score))
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(matching.into_iter().map(|(member, _)| member).collect())
    }

    async fn zset_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(members) = inner.zsets.get_mut(key) {
            members.remove(member);
        }
        Ok(())
    }

    async fn zset_remove_with_hash_delete(
        &self,
        zset_key: &str,
        member: &str,
        hash_key: &str,
        field: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(members) = inner.zsets.get_mut(zset_key) {
            members.remove(member);
        }
        if let Some(fields) = inner.hashes.get_mut(hash_key) {
            fields.remove(field);
        }
        Ok(())
    }
}
