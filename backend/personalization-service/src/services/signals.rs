// ============================================================================
// Behavioral Signal Store - recent actions, keywords, and viewed windows
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SignalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::{ActionKind, Modality};
use crate::store::CacheStore;

/// Rolling logs of what a user recently did, newest first. Each log is
/// capped, so old entries fall off as new ones arrive.
pub struct SignalStore {
    store: Arc<dyn CacheStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: SignalConfig,
}

impl SignalStore {
    pub fn new(
        store: Arc<dyn CacheStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: SignalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    fn action_key(user_id: Uuid, modality: Modality, kind: ActionKind) -> String {
        format!("signals:{}:{}:{}", user_id, modality.as_str(), kind.as_str())
    }

    fn keyword_log_key(user_id: Uuid) -> String {
        format!("signals:{}:keywords", user_id)
    }

    fn keyword_embedding_key(keyword: &str) -> String {
        format!("embeddings:keyword:{}", keyword)
    }

    fn viewed_key(user_id: Uuid, modality: Modality) -> String {
        format!("viewed:{}:{}", user_id, modality.as_str())
    }

    /// Append a content action to its per-modality, per-kind log.
    pub async fn record(
        &self,
        user_id: Uuid,
        modality: Modality,
        kind: ActionKind,
        content_id: &str,
    ) -> Result<()> {
        self.store
            .list_push_capped(
                &Self::action_key(user_id, modality, kind),
                content_id,
                self.config.action_log_cap,
            )
            .await
    }

    /// Remove one occurrence of a content action, e.g. after an unlike.
    pub async fn delete(
        &self,
        user_id: Uuid,
        modality: Modality,
        kind: ActionKind,
        content_id: &str,
    ) -> Result<()> {
        self.store
            .list_remove(&Self::action_key(user_id, modality, kind), content_id)
            .await
    }

    /// Append a search keyword and make sure its embedding is cached.
    /// A cached embedding is reused; otherwise the keyword is embedded
    /// and the log push and the cache write land together.
    pub async fn record_keyword(&self, user_id: Uuid, keyword: &str) -> Result<()> {
        let log_key = Self::keyword_log_key(user_id);
        let embedding_key = Self::keyword_embedding_key(keyword);

        if self.store.string_get(&embedding_key).await?.is_some() {
            return self
                .store
                .list_push_capped(&log_key, keyword, self.config.keyword_log_cap)
                .await;
        }

        debug!(user_id = %user_id, keyword = %keyword, "Embedding new keyword");
        let vector = self.embedder.embed(keyword).await?;
        let encoded = serde_json::to_string(&vector)?;
        self.store
            .list_push_capped_with_string(
                &log_key,
                keyword,
                self.config.keyword_log_cap,
                &embedding_key,
                &encoded,
                Duration::from_secs(self.config.keyword_embedding_ttl_secs),
            )
            .await
    }

    /// Append a content id to the user's viewed window for `modality`.
    pub async fn mark_viewed(
        &self,
        user_id: Uuid,
        modality: Modality,
        content_id: &str,
    ) -> Result<()> {
        self.store
            .list_push_capped(
                &Self::viewed_key(user_id, modality),
                content_id,
                self.config.viewed_window_cap,
            )
            .await
    }

    pub async fn action_ids(
        &self,
        user_id: Uuid,
        modality: Modality,
        kind: ActionKind,
    ) -> Result<Vec<String>> {
        self.store
            .list_range(&Self::action_key(user_id, modality, kind))
            .await
    }

    pub async fn keywords(&self, user_id: Uuid) -> Result<Vec<String>> {
        self.store.list_range(&Self::keyword_log_key(user_id)).await
    }

    /// Cached embeddings for the user's logged keywords. Keywords whose
    /// cache entry expired or fails to parse are skipped.
    pub async fn keyword_embeddings(&self, user_id: Uuid) -> Result<Vec<Vec<f32>>> {
        let keywords = self.keywords(user_id).await?;
        let mut vectors = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let encoded = match self
                .store
                .string_get(&Self::keyword_embedding_key(&keyword))
                .await?
            {
                Some(encoded) => encoded,
                None => {
                    debug!(keyword = %keyword, "Keyword embedding expired, skipping");
                    continue;
                }
            };
            match serde_json::from_str::<Vec<f32>>(&encoded) {
                Ok(vector) => vectors.push(vector),
                Err(err) => {
                    warn!(keyword = %keyword, error = %err, "Dropping unparseable keyword embedding");
                }
            }
        }
        Ok(vectors)
    }

    pub async fn viewed(&self, user_id: Uuid, modality: Modality) -> Result<Vec<String>> {
        self.store
            .list_range(&Self::viewed_key(user_id, modality))
            .await
    }
}
