use async_trait::async_trait;
use elasticsearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    Elasticsearch, IndexParts, MgetParts, SearchParts,
};
use serde::Deserialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use super::{MemoryDocument, MemoryHit, SearchIndex};
use crate::config::ElasticsearchConfig;
use crate::error::{AppError, Result};
use crate::models::{is_zero_vector, Modality};

const EMBEDDING_FIELD: &str = "embedding";

#[derive(Clone)]
pub struct ElasticsearchClient {
    client: Elasticsearch,
    post_index: String,
    video_index: String,
    memory_index: String,
    knn_num_candidates: usize,
}

impl ElasticsearchClient {
    pub async fn new(config: &ElasticsearchConfig, embedding_dimension: usize) -> Result<Self> {
        let parsed = Url::parse(&config.url)?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let transport = TransportBuilder::new(pool).build()?;
        let client = Elasticsearch::new(transport);

        let instance = Self {
            client,
            post_index: config.post_index.clone(),
            video_index: config.video_index.clone(),
            memory_index: config.memory_index.clone(),
            knn_num_candidates: config.knn_num_candidates,
        };

        instance.ensure_memory_index(embedding_dimension).await?;

        Ok(instance)
    }

    fn content_index(&self, modality: Modality) -> &str {
        match modality {
            Modality::Post => &self.post_index,
            Modality::Video => &self.video_index,
        }
    }

    async fn ensure_memory_index(&self, embedding_dimension: usize) -> Result<()> {
        let exists_response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.memory_index.as_str()]))
            .send()
            .await?;

        if exists_response.status_code().is_success() {
            return Ok(());
        }

        let body = json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "user_id": { "type": "keyword" },
                    "conversation_id": { "type": "keyword" },
                    "question": {
                        "type": "text",
                        "analyzer": "english"
                    },
                    "answer": {
                        "type": "text",
                        "analyzer": "english"
                    },
                    "embedding": {
                        "type": "dense_vector",
                        "dims": embedding_dimension,
                        "index": true,
                        "similarity": "cosine"
                    },
                    "created_at": { "type": "date" }
                }
            }
        });

        self.client
            .indices()
            .create(IndicesCreateParts::Index(&self.memory_index))
            .body(body)
            .send()
            .await?;

        Ok(())
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchClient {
    async fn content_vectors(&self, modality: Modality, ids: &[String]) -> Result<Vec<Vec<f32>>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let docs: Vec<_> = ids
            .iter()
            .map(|id| json!({ "_id": id, "_source": [EMBEDDING_FIELD] }))
            .collect();

        let response = self
            .client
            .mget(MgetParts::Index(self.content_index(modality)))
            .body(json!({ "docs": docs }))
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(AppError::SearchIndex(format!(
                "mget on {} failed with status {}",
                self.content_index(modality),
                status
            )));
        }

        let mget_response: MgetResponse = response.json().await?;
        let vectors = mget_response
            .docs
            .into_iter()
            .filter(|doc| doc.found)
            .filter_map(|doc| doc.source.and_then(|source| source.embedding))
            .collect();
        Ok(vectors)
    }

    async fn knn_content(
        &self,
        modality: Modality,
        query: &[f32],
        count: usize,
        exclude_ids: &[String],
    ) -> Result<Vec<String>> {
        if is_zero_vector(query) {
            return Err(AppError::InvalidData(
                "knn query vector is all zeros".to_string(),
            ));
        }

        let num_candidates = self.knn_num_candidates.max(count);
        let knn = if exclude_ids.is_empty() {
            json!({
                "field": EMBEDDING_FIELD,
                "query_vector": query,
                "k": count,
                "num_candidates": num_candidates
            })
        } else {
            json!({
                "field": EMBEDDING_FIELD,
                "query_vector": query,
                "k": count,
                "num_candidates": num_candidates,
                "filter": {
                    "bool": {
                        "must_not": [
                            { "ids": { "values": exclude_ids } }
                        ]
                    }
                }
            })
        };

        let body = json!({
            "knn": knn,
            "size": count,
            "_source": false
        });

        let response = self
            .client
            .search(SearchParts::Index(&[self.content_index(modality)]))
            .body(body)
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(AppError::SearchIndex(format!(
                "knn search on {} failed with status {}",
                self.content_index(modality),
                status
            )));
        }

        let search_response: IdSearchResponse = response.json().await?;
        Ok(search_response
            .hits
            .hits
            .into_iter()
            .map(|hit| hit.id)
            .collect())
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

        let num_candidates = self.knn_num_candidates.max(size);
        let mut knn = json!({
            "field": EMBEDDING_FIELD,
            "query_vector": query,
            "k": size,
            "num_candidates": num_candidates,
            "filter": {
                "term": { "user_id": user_id.to_string() }
            }
        });
        if let Some(floor) = min_similarity {
            knn["similarity"] = json!(floor);
        }

        let body = json!({
            "knn": knn,
            "size": size,
            "_source": ["question", "answer"]
        });

        let response = self
            .client
            .search(SearchParts::Index(&[self.memory_index.as_str()]))
            .body(body)
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(AppError::SearchIndex(format!(
                "knn search on {} failed with status {}",
                self.memory_index, status
            )));
        }

        let search_response: MemorySearchResponse = response.json().await?;
        Ok(collect_memory_hits(search_response))
    }

    async fn search_memories(
        &self,
        user_id: Uuid,
        keyword: &str,
        size: usize,
    ) -> Result<Vec<MemoryHit>> {
        let body = json!({
            "size": size,
            "_source": ["question", "answer"],
            "query": {
                "bool": {
                    "must": [
                        {
                            "multi_match": {
                                "query": keyword,
                                "fields": ["question", "answer"],
                                "type": "best_fields"
                            }
                        }
                    ],
                    "filter": [
                        { "term": { "user_id": user_id.to_string() } }
                    ]
                }
            }
        });

        let response = self
            .client
            .search(SearchParts::Index(&[self.memory_index.as_str()]))
            .body(body)
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(AppError::SearchIndex(format!(
                "text search on {} failed with status {}",
                self.memory_index, status
            )));
        }

        let search_response: MemorySearchResponse = response.json().await?;
        Ok(collect_memory_hits(search_response))
    }

    async fn index_memory(&self, document: &MemoryDocument) -> Result<()> {
        let response = self
            .client
            .index(IndexParts::IndexId(&self.memory_index, &document.id))
            .body(document)
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(AppError::SearchIndex(format!(
                "indexing into {} failed with status {}",
                self.memory_index, status
            )));
        }
        Ok(())
    }
}

fn collect_memory_hits(response: MemorySearchResponse) -> Vec<MemoryHit> {
    response
        .hits
        .hits
        .into_iter()
        .filter_map(|hit| {
            hit.source.map(|source| MemoryHit {
                id: hit.id,
                question: source.question,
                answer: source.answer,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct MgetResponse {
    docs: Vec<MgetDoc>,
}

#[derive(Debug, Deserialize)]
struct MgetDoc {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<EmbeddingSource>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingSource {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct IdSearchResponse {
    hits: IdInnerHits,
}

#[derive(Debug, Deserialize)]
struct IdInnerHits {
    hits: Vec<IdHit>,
}

#[derive(Debug, Deserialize)]
struct IdHit {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct MemorySearchResponse {
    hits: MemoryInnerHits,
}

#[derive(Debug, Deserialize)]
struct MemoryInnerHits {
    hits: Vec<MemoryHitEnvelope>,
}

#[derive(Debug, Deserialize)]
struct MemoryHitEnvelope {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: Option<MemorySource>,
}

#[derive(Debug, Deserialize)]
struct MemorySource {
    question: String,
    answer: String,
}
