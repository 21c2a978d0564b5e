use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub embedding: EmbeddingConfig,
    pub signals: SignalConfig,
    pub profile: ProfileConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub env: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "personalization-service".to_string(),
            env: "development".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub post_index: String,
    pub video_index: String,
    pub memory_index: String,
    /// Candidate pool size for KNN queries; always at least the requested k.
    pub knn_num_candidates: usize,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            post_index: "post_embeddings".to_string(),
            video_index: "video_embeddings".to_string(),
            memory_index: "chat_memory".to_string(),
            knn_num_candidates: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "text-embedding-3-large".to_string(),
            dimension: 1024,
            timeout_secs: 30,
        }
    }
}

/// Caps and TTLs for the per-user behavioral signal logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub action_log_cap: usize,
    pub keyword_log_cap: usize,
    pub viewed_window_cap: usize,
    pub keyword_embedding_ttl_secs: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            action_log_cap: 15,
            keyword_log_cap: 5,
            viewed_window_cap: 150,
            keyword_embedding_ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub cache_ttl_secs: u64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self { cache_ttl_secs: 60 }
    }
}

/// Conversation memory: archival cadence and fused-retrieval tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Idle window after the last exchange before a conversation is archived.
    pub archive_after_secs: u64,
    pub scan_interval_secs: u64,
    /// How many candidates each retrieval source fetches before fusion.
    pub fetch_size: usize,
    /// How many fused records a retrieval call returns.
    pub result_size: usize,
    pub text_weight: f64,
    pub knn_weight: f64,
    /// Similarity floor applied to the dense memory query.
    pub min_similarity: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            archive_after_secs: 3_600,
            scan_interval_secs: 60,
            fetch_size: 20,
            result_size: 5,
            text_weight: 0.4,
            knn_weight: 0.6,
            min_similarity: 0.5,
        }
    }
}

impl Config {
    /// Assemble configuration from the environment. Every field has a
    /// default; malformed numeric values fall back to the default instead of
    /// aborting startup.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            service: ServiceConfig {
                name: env_or("SERVICE_NAME", &defaults.service.name),
                env: env_or("APP_ENV", &defaults.service.env),
            },
            redis: RedisConfig {
                url: env_or("REDIS_URL", &defaults.redis.url),
            },
            elasticsearch: ElasticsearchConfig {
                url: env_or("ELASTICSEARCH_URL", &defaults.elasticsearch.url),
                post_index: env_or("POST_INDEX", &defaults.elasticsearch.post_index),
                video_index: env_or("VIDEO_INDEX", &defaults.elasticsearch.video_index),
                memory_index: env_or("MEMORY_INDEX", &defaults.elasticsearch.memory_index),
                knn_num_candidates: env_parsed(
                    "KNN_NUM_CANDIDATES",
                    defaults.elasticsearch.knn_num_candidates,
                ),
            },
            embedding: EmbeddingConfig {
                api_base: env_or("EMBEDDING_API_BASE", &defaults.embedding.api_base),
                api_key: env_or("EMBEDDING_API_KEY", &defaults.embedding.api_key),
                model: env_or("EMBEDDING_MODEL", &defaults.embedding.model),
                dimension: env_parsed("EMBEDDING_DIMENSION", defaults.embedding.dimension),
                timeout_secs: env_parsed("EMBEDDING_TIMEOUT_SECS", defaults.embedding.timeout_secs),
            },
            signals: SignalConfig {
                action_log_cap: env_parsed("ACTION_LOG_CAP", defaults.signals.action_log_cap),
                keyword_log_cap: env_parsed("KEYWORD_LOG_CAP", defaults.signals.keyword_log_cap),
                viewed_window_cap: env_parsed(
                    "VIEWED_WINDOW_CAP",
                    defaults.signals.viewed_window_cap,
                ),
                keyword_embedding_ttl_secs: env_parsed(
                    "KEYWORD_EMBEDDING_TTL_SECS",
                    defaults.signals.keyword_embedding_ttl_secs,
                ),
            },
            profile: ProfileConfig {
                cache_ttl_secs: env_parsed("PROFILE_CACHE_TTL_SECS", defaults.profile.cache_ttl_secs),
            },
            memory: MemoryConfig {
                archive_after_secs: env_parsed(
                    "ARCHIVE_AFTER_SECS",
                    defaults.memory.archive_after_secs,
                ),
                scan_interval_secs: env_parsed(
                    "ARCHIVE_SCAN_INTERVAL_SECS",
                    defaults.memory.scan_interval_secs,
                ),
                fetch_size: env_parsed("MEMORY_FETCH_SIZE", defaults.memory.fetch_size),
                result_size: env_parsed("MEMORY_RESULT_SIZE", defaults.memory.result_size),
                text_weight: env_parsed("MEMORY_TEXT_WEIGHT", defaults.memory.text_weight),
                knn_weight: env_parsed("MEMORY_KNN_WEIGHT", defaults.memory.knn_weight),
                min_similarity: env_parsed("MEMORY_MIN_SIMILARITY", defaults.memory.min_similarity),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let config = Config::default();
        assert_eq!(config.signals.action_log_cap, 15);
        assert_eq!(config.signals.keyword_log_cap, 5);
        assert_eq!(config.signals.viewed_window_cap, 150);
        assert_eq!(config.signals.keyword_embedding_ttl_secs, 86_400);
        assert_eq!(config.profile.cache_ttl_secs, 60);
        assert_eq!(config.memory.scan_interval_secs, 60);
        assert_eq!(config.embedding.dimension, 1024);
    }

    #[test]
    fn test_env_parsed_falls_back_on_garbage() {
        std::env::set_var("TEST_ENV_PARSED_GARBAGE", "not-a-number");
        let parsed: usize = env_parsed("TEST_ENV_PARSED_GARBAGE", 42);
        assert_eq!(parsed, 42);
        std::env::remove_var("TEST_ENV_PARSED_GARBAGE");
    }
}
