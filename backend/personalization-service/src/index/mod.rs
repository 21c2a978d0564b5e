// ============================================================================
// Search Index - content vector lookups, KNN retrieval, memory documents
// ============================================================================

mod elasticsearch;

pub use self::elasticsearch::ElasticsearchClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{is_zero_vector, Modality};

/// One retrieved conversation memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHit {
    pub id: String,
    pub question: String,
    pub answer: String,
}

/// Archived conversation exchange as stored in the memory index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub id: String,
    pub user_id: Uuid,
    pub conversation_id: Uuid,
    pub question: String,
    pub answer: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Fetch stored embeddings for the given content ids. Ids with no
    /// document or no embedding field are dropped from the result.
    async fn content_vectors(&self, modality: Modality, ids: &[String]) -> Result<Vec<Vec<f32>>>;

    /// KNN over the content index for `modality`, best `count` ids,
    /// excluding `exclude_ids`.
    async fn knn_content(
        &self,
        modality: Modality,
        query: &[f32],
        count: usize,
        exclude_ids: &[String],
    ) -> Result<Vec<String>>;

    /// KNN over one user's archived memories, optionally floored at a
    /// minimum cosine similarity.
    async fn knn_memories(
        &self,
        user_id: Uuid,
        query: &[f32],
        size: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<MemoryHit>>;

    /// Full-text match over one user's archived memories.
    async fn search_memories(&self, user_id: Uuid, keyword: &str, size: usize)
        -> Result<Vec<MemoryHit>>;

    async fn index_memory(&self, document: &MemoryDocument) -> Result<()>;
}

/// In-memory index for tests. Ranks by exact cosine similarity and
/// matches keywords by lowercase substring.
#[derive(Default)]
pub struct StubSearchIndex {
    content: Mutex<HashMap<(Modality, String), Vec<f32>>>,
    memories: Mutex<Vec<MemoryDocument>>,
    vector_fetches: AtomicUsize,
    knn_queries: AtomicUsize,
}

impl StubSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_content(&self, modality: Modality, id: &str, vector: Vec<f32>) {
        self.content
            .lock()
            .await
            .insert((modality, id.to_string()), vector);
    }

    pub async fn indexed_memories(&self) -> Vec<MemoryDocument> {
        self.memories.lock().await.clone()
    }

    pub fn vector_fetches(&self) -> usize {
        self.vector_fetches.load(Ordering::SeqCst)
    }

    pub fn knn_queries(&self) -> usize {
        self.knn_queries.load(Ordering::SeqCst)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl SearchIndex for StubSearchIndex {
    async fn content_vectors(&self, modality: Modality, ids: &[String]) -> Result<Vec<Vec<f32>>> {
        self.vector_fetches.fetch_add(1, Ordering::SeqCst);
        let content = self.content.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| content.get(&(modality, id.clone())).cloned())
            .collect())
    }

    async fn knn_content(
        &self,
        modality: Modality,
        query: &[f32],
        count: usize,
        exclude_ids: &[String],
    ) -> Result<Vec<String>> {
        self.knn_queries.fetch_add(1, Ordering::SeqCst);
        if is_zero_vector(query) {
            return Err(AppError::InvalidData(
                "knn query vector is all zeros".to_string(),
            ));
        }
        let content = self.content.lock().await;
        let mut ranked: Vec<(String, f32)> = content
            .iter()
            .filter(|((m, id), _)| *m == modality && !exclude_ids.contains(id))
            .map(|((_, id), vector)| (id.clone(), cosine(query, vector)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(count);
        Ok(ranked.into_iter().map(|(id, _)| id).collect())
    }

    async fn knn_memories(
        &self,
        user_id: Uuid,
        query: &[f32],
        size: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<MemoryHit>> {
        if is_zero_vector(query) {
            return Err(AppError::InvalidData(
                "knn query vector is all zeros".to_string(),
            ));
        }
        let memories = self.memories.lock().await;
        let mut ranked: Vec<(MemoryHit, f32)> = memories
            .iter()
            .filter(|doc| doc.user_id == user_id)
            .map(|doc| {
                let hit = MemoryHit {
                    id: doc.id.clone(),
                    question: doc.question.clone(),
                    answer: doc.answer.clone(),
                };
                let score = cosine(query, &doc.embedding);
                (hit, score)
            })
            .filter(|(_, score)| min_similarity.map_or(true, |floor| *score >= floor))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        ranked.truncate(size);
        Ok(ranked.into_iter().map(|(hit, _)| hit).collect())
    }

    async fn search_memories(
        &self,
        user_id: Uuid,
        keyword: &str,
        size: usize,
    ) -> Result<Vec<MemoryHit>> {
        let needle = keyword.to_lowercase();
        let memories = self.memories.lock().await;
        Ok(memories
            .iter()
            .filter(|doc| doc.user_id == user_id)
            .filter(|doc| {
                doc.question.to_lowercase().contains(&needle)
                    || doc.answer.to_lowercase().contains(&needle)
            })
            .take(size)
            .map(|doc| MemoryHit {
                id: doc.id.clone(),
                question: doc.question.clone(),
                answer: doc.answer.clone(),
            })
            .collect())
    }

    async fn index_memory(&self, document: &MemoryDocument) -> Result<()> {
        self.memories.lock().await.push(document.clone());
        Ok(())
    }
}
