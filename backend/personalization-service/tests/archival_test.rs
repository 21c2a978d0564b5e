//! Conversation archival lifecycle: deadline-driven sweeps, both-or-neither
//! cleanup, and fused retrieval over the archived memories.

use async_trait::async_trait;
use chrono::Utc;
use personalization_service::config::MemoryConfig;
use personalization_service::embedding::StubEmbedder;
use personalization_service::error::{AppError, Result};
use personalization_service::index::{MemoryDocument, SearchIndex, StubSearchIndex};
use personalization_service::services::ChatMemoryService;
use personalization_service::store::{CacheStore, InMemoryStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct TestRig {
    store: Arc<InMemoryStore>,
    index: Arc<StubSearchIndex>,
    embedder: Arc<StubEmbedder>,
    memory: ChatMemoryService,
}

fn rig(config: MemoryConfig) -> TestRig {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let index = Arc::new(StubSearchIndex::new());
    let embedder = Arc::new(StubEmbedder::new(2));
    let memory = ChatMemoryService::new(store.clone(), index.clone(), embedder.clone(), config);
    TestRig {
        store,
        index,
        embedder,
        memory,
    }
}

fn immediate_archive() -> MemoryConfig {
    MemoryConfig {
        archive_after_secs: 0,
        ..MemoryConfig::default()
    }
}

/// A scan "now" safely past any deadline written moments ago.
fn well_past_now() -> chrono::DateTime<Utc> {
    Utc::now() + chrono::Duration::seconds(5)
}

#[tokio::test]
async fn conversation_before_deadline_is_untouched() {
    let rig = rig(MemoryConfig {
        archive_after_secs: 1000,
        ..MemoryConfig::default()
    });
    let user = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    rig.memory
        .record_exchange(user, conversation, "still talking", "yes")
        .await
        .unwrap();

    let stats = rig.memory.run_archive_scan(Utc::now()).await.unwrap();
    assert_eq!(stats.due, 0);
    assert!(rig
        .memory
        .live_payload(user, conversation)
        .await
        .unwrap()
        .is_some());
    assert_eq!(rig.memory.active_conversations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn due_conversation_is_archived_and_both_entries_cleared() {
    let rig = rig(immediate_archive());
    let user = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    rig.memory
        .record_exchange(user, conversation, "what is rank fusion", "merging ranked lists")
        .await
        .unwrap();

    let stats = rig.memory.run_archive_scan(well_past_now()).await.unwrap();
    assert_eq!(stats.due, 1);
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.failed, 0);

    // Let the spawned archival task finish.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let docs = rig.index.indexed_memories().await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].user_id, user);
    assert_eq!(docs[0].conversation_id, conversation);
    assert_eq!(docs[0].question, "what is rank fusion");
    assert_eq!(docs[0].answer, "merging ranked lists");
    assert_eq!(docs[0].embedding.len(), 2);

    assert!(rig.memory.active_conversations().await.unwrap().is_empty());
    assert!(rig
        .memory
        .live_payload(user, conversation)
        .await
        .unwrap()
        .is_none());

    let stats = rig.memory.run_archive_scan(well_past_now()).await.unwrap();
    assert_eq!(stats.due, 0);
}

#[tokio::test]
async fn due_entry_without_payload_is_skipped() {
    let rig = rig(MemoryConfig::default());
    let user = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    rig.store
        .zset_add(
            "conversations:active",
            &format!("{}_{}", user, conversation),
            1.0,
        )
        .await
        .unwrap();

    let stats = rig.memory.run_archive_scan(Utc::now()).await.unwrap();
    assert_eq!(stats.due, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.dispatched, 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rig.index.indexed_memories().await.is_empty());
}

#[tokio::test]
async fn malformed_tracking_entry_is_dropped() {
    let rig = rig(MemoryConfig::default());

    rig.store
        .zset_add("conversations:active", "not-a-member", 1.0)
        .await
        .unwrap();

    let stats = rig.memory.run_archive_scan(Utc::now()).await.unwrap();
    assert_eq!(stats.due, 1);
    assert_eq!(stats.failed, 1);
    assert!(rig.memory.active_conversations().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_cleanup_leaves_both_entries_in_place() {
    let store = Arc::new(FailingStore::new());
    let index = Arc::new(StubSearchIndex::new());
    let embedder = Arc::new(StubEmbedder::new(2));
    let memory = ChatMemoryService::new(
        store.clone(),
        index.clone(),
        embedder,
        immediate_archive(),
    );
    let user = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    memory
        .record_exchange(user, conversation, "q", "a")
        .await
        .unwrap();

    let stats = memory.run_archive_scan(well_past_now()).await.unwrap();
    assert_eq!(stats.due, 1);
    assert_eq!(stats.dispatched, 0);
    assert_eq!(stats.failed, 1);

    // Neither side of the tracking state may disappear on its own.
    assert_eq!(memory.active_conversations().await.unwrap().len(), 1);
    assert!(memory
        .live_payload(user, conversation)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn archived_conversation_is_retrievable_by_keyword() {
    let rig = rig(immediate_archive());
    let user = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    rig.memory
        .record_exchange(
            user,
            conversation,
            "how do I prune tomato plants",
            "pinch off the suckers",
        )
        .await
        .unwrap();
    rig.memory.run_archive_scan(well_past_now()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let records = rig
        .memory
        .retrieve_memory(user, "vegetable gardening advice", "tomato")
        .await
        .unwrap();
    assert!(!records.is_empty());
    assert_eq!(records[0].question, "how do I prune tomato plants");
    assert_eq!(records[0].answer, "pinch off the suckers");
}

#[tokio::test]
async fn retrieval_fuses_dense_and_lexical_sources() {
    let rig = rig(MemoryConfig::default());
    let user = Uuid::new_v4();

    let doc = |id: &str, question: &str, answer: &str, embedding: Vec<f32>| MemoryDocument {
        id: id.to_string(),
        user_id: user,
        conversation_id: Uuid::new_v4(),
        question: question.to_string(),
        answer: answer.to_string(),
        embedding,
        created_at: Utc::now(),
    };
    rig.index
        .index_memory(&doc(
            "m1",
            "how to care for a cactus",
            "water rarely",
            vec![1.0, 0.0],
        ))
        .await
        .unwrap();
    rig.index
        .index_memory(&doc(
            "m2",
            "best soil for succulents",
            "a sandy mix",
            vec![0.9, 0.1],
        ))
        .await
        .unwrap();
    rig.index
        .index_memory(&doc(
            "m3",
            "train schedule to boston",
            "every hour",
            vec![0.0, 1.0],
        ))
        .await
        .unwrap();
    rig.embedder.insert("plant care", vec![1.0, 0.0]).await;

    let records = rig
        .memory
        .retrieve_memory(user, "plant care", "cactus")
        .await
        .unwrap();

    // m1 hits both sources, m2 only the dense one, m3 neither (similarity
    // floor plus no keyword match).
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].question, "how to care for a cactus");
    assert_eq!(records[1].question, "best soil for succulents");
}

/// In-memory store whose combined removal always fails, standing in for a
/// transaction that dies mid-flight.
struct FailingStore {
    inner: InMemoryStore,
}

impl FailingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
        }
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn list_push_capped(&self, key: &str, value: &str, cap: usize) -> Result<()> {
        self.inner.list_push_capped(key, value, cap).await
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        self.inner.list_range(key).await
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<()> {
        self.inner.list_remove(key, value).await
    }

    async fn string_get(&self, key: &str) -> Result<Option<String>> {
        self.inner.string_get(key).await
    }

    async fn string_set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.inner.string_set_ex(key, value, ttl).await
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
        self.inner
            .list_push_capped_with_string(list_key, value, cap, string_key, string_value, ttl)
            .await
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.inner.hash_get(key, field).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.inner.hash_set(key, field, value).await
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<()> {
        self.inner.hash_delete(key, field).await
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.inner.zset_add(key, member, score).await
    }

    async fn zset_range_by_score(&self, key: &str, max: f64) -> Result<Vec<String>> {
        self.inner.zset_range_by_score(key, max).await
    }

    async fn zset_remove(&self, key: &str, member: &str) -> Result<()> {
        self.inner.zset_remove(key, member).await
    }

    async fn zset_remove_with_hash_delete(
        &self,
        _zset_key: &str,
        _member: &str,
        _hash_key: &str,
        _field: &str,
    ) -> Result<()> {
        Err(AppError::Storage("injected cleanup failure".to_string()))
    }
}
