//! Personalization Worker
//!
//! Long-running process that hosts the conversation archiver: it sweeps the
//! active-conversation index on a fixed cadence and archives idle
//! conversations into the chat-memory index. Signal ingestion, profile
//! building, and retrieval are library surfaces consumed in-process by the
//! API layer.
//!
//! Environment variables:
//! - REDIS_URL: Redis connection string (default: "redis://127.0.0.1:6379")
//! - ELASTICSEARCH_URL: Elasticsearch endpoint (default: "http://localhost:9200")
//! - POST_INDEX / VIDEO_INDEX / MEMORY_INDEX: index names
//! - EMBEDDING_API_BASE / EMBEDDING_API_KEY / EMBEDDING_MODEL: embedding endpoint
//! - EMBEDDING_DIMENSION: profile and memory vector width (default: 1024)
//! - ARCHIVE_AFTER_SECS: idle window before archival (default: 3600)
//! - ARCHIVE_SCAN_INTERVAL_SECS: sweep cadence (default: 60)

use anyhow::Context;
use personalization_service::config::Config;
use personalization_service::embedding::{EmbeddingProvider, OpenAiEmbeddingProvider};
use personalization_service::index::{ElasticsearchClient, SearchIndex};
use personalization_service::jobs::start_conversation_archiver;
use personalization_service::services::ChatMemoryService;
use personalization_service::store::{CacheStore, RedisStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,personalization_service=info".into()),
        )
        .init();

    let config = Config::from_env();
    info!(
        service = %config.service.name,
        env = %config.service.env,
        "Configuration loaded"
    );

    let store = RedisStore::connect(&config.redis.url)
        .await
        .context("failed to connect to Redis")?;
    store.ping().await.context("Redis ping failed")?;
    let store: Arc<dyn CacheStore> = Arc::new(store);

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
        OpenAiEmbeddingProvider::new(&config.embedding)
            .context("failed to build embedding client")?,
    );

    let index: Arc<dyn SearchIndex> = Arc::new(
        ElasticsearchClient::new(&config.elasticsearch, config.embedding.dimension)
            .await
            .context("failed to initialize Elasticsearch client")?,
    );
    info!(url = %config.elasticsearch.url, "Elasticsearch client ready");

    let memory = Arc::new(ChatMemoryService::new(
        store,
        index,
        embedder,
        config.memory.clone(),
    ));

    let scan_interval = Duration::from_secs(config.memory.scan_interval_secs);
    tokio::spawn(start_conversation_archiver(memory, scan_interval));

    info!("Personalization worker running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping");

    Ok(())
}
