// ============================================================================
// Interest Profiles - weighted signal aggregation and blended cache
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::index::SearchIndex;
use crate::models::{is_zero_vector, ActionKind, Modality, KEYWORD_WEIGHT};
use crate::services::signals::SignalStore;
use crate::store::CacheStore;

pub struct ProfileService {
    signals: Arc<SignalStore>,
    index: Arc<dyn SearchIndex>,
    store: Arc<dyn CacheStore>,
    dimension: usize,
    cache_ttl: Duration,
}

fn accumulate(sum: &mut [f32], vector: &[f32], weight: f32) {
    for (slot, component) in sum.iter_mut().zip(vector.iter()) {
        *slot += weight * component;
    }
}

impl ProfileService {
    pub fn new(
        signals: Arc<SignalStore>,
        index: Arc<dyn SearchIndex>,
        store: Arc<dyn CacheStore>,
        dimension: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            signals,
            index,
            store,
            dimension,
            cache_ttl,
        }
    }

    fn profile_key(user_id: Uuid, target: Modality) -> String {
        format!("profiles:{}:{}", user_id, target.as_str())
    }

    /// Build one modality's interest profile as the weighted average of
    /// the vectors behind the user's recent actions and keywords. Ids
    /// missing from the index contribute neither vector nor weight. With
    /// no contributions at all the result is the all-zero vector.
    pub async fn build_profile(&self, user_id: Uuid, modality: Modality) -> Result<Vec<f32>> {
        let mut sum = vec![0.0_f32; self.dimension];
        let mut total_weight = 0.0_f32;

        for kind in ActionKind::ALL {
            let ids = self.signals.action_ids(user_id, modality, kind).await?;
            if ids.is_empty() {
                continue;
            }
            let vectors = self.index.content_vectors(modality, &ids).await?;
            total_weight += kind.weight() * vectors.len() as f32;
            for vector in &vectors {
                accumulate(&mut sum, vector, kind.weight());
            }
        }

        let keyword_vectors = self.signals.keyword_embeddings(user_id).await?;
        total_weight += KEYWORD_WEIGHT * keyword_vectors.len() as f32;
        for vector in &keyword_vectors {
            accumulate(&mut sum, vector, KEYWORD_WEIGHT);
        }

        if total_weight == 0.0 {
            return Ok(sum);
        }
        for component in &mut sum {
            *component /= total_weight;
        }

        debug!(
            user_id = %user_id,
            modality = ?modality,
            total_weight,
            "Built interest profile"
        );
        Ok(sum)
    }

    /// Cached blend of both modality profiles, weighted toward `target`.
    /// An all-zero blend is returned as-is and never cached, so the next
    /// call retries once the user has signals.
    pub async fn get_or_build_blended(&self, user_id: Uuid, target: Modality) -> Result<Vec<f32>> {
        let cache_key = Self::profile_key(user_id, target);
        if let Some(cached) = self.store.string_get(&cache_key).await? {
            match serde_json::from_str::<Vec<f32>>(&cached) {
                Ok(vector) => return Ok(vector),
                Err(err) => {
                    warn!(user_id = %user_id, error = %err, "Dropping unparseable cached profile");
                }
            }
        }

        let post = self.build_profile(user_id, Modality::Post).await?;
        let video = self.build_profile(user_id, Modality::Video).await?;
        let weights = target.blend_weights();
        let blended: Vec<f32> = post
            .iter()
            .zip(video.iter())
            .map(|(p, v)| weights.post * p + weights.video * v)
            .collect();

        if is_zero_vector(&blended) {
            debug!(user_id = %user_id, modality = ?target, "Blended profile is all zeros, skipping cache");
            return Ok(blended);
        }

        let encoded = serde_json::to_string(&blended)?;
        self.store
            .string_set_ex(&cache_key, &encoded, self.cache_ttl)
            .await?;
        Ok(blended)
    }
}
