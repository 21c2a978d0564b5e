// ============================================================================
// Recommendation Pipelines - profile-driven and item-to-item retrieval
// ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::index::SearchIndex;
use crate::models::{is_zero_vector, Modality};
use crate::services::profile::ProfileService;
use crate::services::signals::SignalStore;

pub struct RecommendService {
    profiles: Arc<ProfileService>,
    signals: Arc<SignalStore>,
    index: Arc<dyn SearchIndex>,
}

impl RecommendService {
    pub fn new(
        profiles: Arc<ProfileService>,
        signals: Arc<SignalStore>,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            profiles,
            signals,
            index,
        }
    }

    /// Personalized content ids for one modality, best match first.
    /// Users without a usable profile get an empty list and no KNN
    /// query is issued for them. Recently viewed content is excluded.
    pub async fn recommend(
        &self,
        user_id: Uuid,
        modality: Modality,
        count: usize,
    ) -> Result<Vec<String>> {
        let blended = self.profiles.get_or_build_blended(user_id, modality).await?;
        if is_zero_vector(&blended) {
            debug!(user_id = %user_id, modality = ?modality, "No usable profile, returning empty recommendations");
            return Ok(vec![]);
        }

        let viewed = self.signals.viewed(user_id, modality).await?;
        let ids = self
            .index
            .knn_content(modality, &blended, count, &viewed)
            .await?;

        info!(
            user_id = %user_id,
            modality = ?modality,
            excluded = viewed.len(),
            returned = ids.len(),
            "Served recommendations"
        );
        Ok(ids)
    }

    /// Content ids most similar to one item, excluding the item itself.
    /// Unknown ids yield an empty list rather than an error.
    pub async fn similar_to(
        &self,
        modality: Modality,
        content_id: &str,
        count: usize,
    ) -> Result<Vec<String>> {
        let ids = vec![content_id.to_string()];
        let vectors = self.index.content_vectors(modality, &ids).await?;
        let vector = match vectors.into_iter().next() {
            Some(vector) => vector,
            None => {
                debug!(content_id = %content_id, modality = ?modality, "Content has no stored vector");
                return Ok(vec![]);
            }
        };
        if is_zero_vector(&vector) {
            warn!(content_id = %content_id, modality = ?modality, "Content vector is all zeros, returning empty similar list");
            return Ok(vec![]);
        }

        self.index.knn_content(modality, &vector, count, &ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalConfig;
    use crate::embedding::StubEmbedder;
    use crate::index::StubSearchIndex;
    use crate::models::ActionKind;
    use crate::store::InMemoryStore;
    use std::time::Duration;

    struct Fixture {
        signals: Arc<SignalStore>,
        index: Arc<StubSearchIndex>,
        recommend: RecommendService,
    }

    fn fixture() -> Fixture {
        let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
        let index = Arc::new(StubSearchIndex::new());
        let embedder = Arc::new(StubEmbedder::new(2));
        let signals = Arc::new(SignalStore::new(
            store.clone(),
            embedder,
            SignalConfig::default(),
        ));
        let profiles = Arc::new(ProfileService::new(
            signals.clone(),
            index.clone(),
            store,
            2,
            Duration::from_secs(60),
        ));
        let recommend = RecommendService::new(profiles, signals.clone(), index.clone());
        Fixture {
            signals,
            index,
            recommend,
        }
    }

    #[tokio::test]
    async fn user_without_signals_gets_empty_list_and_no_knn_query() {
        let fx = fixture();
        let ids = fx
            .recommend
            .recommend(Uuid::new_v4(), Modality::Post, 10)
            .await
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(fx.index.knn_queries(), 0);
    }

    #[tokio::test]
    async fn recommendations_exclude_recently_viewed_content() {
        let fx = fixture();
        let user = Uuid::new_v4();

        fx.index.add_content(Modality::Post, "liked", vec![1.0, 0.0]).await;
        fx.index.add_content(Modality::Post, "seen", vec![0.9, 0.1]).await;
        fx.index.add_content(Modality::Post, "fresh", vec![0.8, 0.2]).await;
        fx.signals
            .record(user, Modality::Post, ActionKind::Like, "liked")
            .await
            .unwrap();
        fx.signals
            .mark_viewed(user, Modality::Post, "seen")
            .await
            .unwrap();

        let ids = fx.recommend.recommend(user, Modality::Post, 10).await.unwrap();
        assert!(ids.contains(&"fresh".to_string()));
        assert!(!ids.contains(&"seen".to_string()));
    }

    #[tokio::test]
    async fn similar_returns_empty_for_unknown_content() {
        let fx = fixture();
        let ids = fx
            .recommend
            .similar_to(Modality::Video, "ghost", 10)
            .await
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(fx.index.knn_queries(), 0);
    }

    #[tokio::test]
    async fn similar_excludes_the_item_itself() {
        let fx = fixture();
        fx.index.add_content(Modality::Post, "anchor", vec![1.0, 0.0]).await;
        fx.index.add_content(Modality::Post, "close", vec![0.9, 0.1]).await;
        fx.index.add_content(Modality::Post, "far", vec![0.0, 1.0]).await;

        let ids = fx
            .recommend
            .similar_to(Modality::Post, "anchor", 10)
            .await
            .unwrap();
        assert_eq!(ids, vec!["close", "far"]);
    }
}
