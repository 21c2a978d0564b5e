// ============================================================================
// Chat Memory - live conversation tracking, archival, fused retrieval
// ============================================================================
//
// A conversation is live while the user keeps talking: its payload sits in a
// per-user hash and its archival deadline in a shared sorted set, refreshed
// on every exchange. Once the deadline passes, a scan digests the transcript
// into the memory index and clears both entries together.

use chrono::{DateTime, Utc};
use futures::future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::MemoryConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::{MemoryDocument, MemoryHit, SearchIndex};
use crate::models::{ChatExchange, ConversationPayload, MemoryRecord};
use crate::services::fusion::{fuse_ranked, FusionWeights};
use crate::store::CacheStore;

const ACTIVE_CONVERSATIONS_KEY: &str = "conversations:active";

/// Transcript bytes fed to the embedder per archived conversation.
const DIGEST_MAX_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveScanStats {
    pub due: usize,
    pub dispatched: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ChatMemoryService {
    store: Arc<dyn CacheStore>,
    index: Arc<dyn SearchIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: MemoryConfig,
}

impl ChatMemoryService {
    pub fn new(
        store: Arc<dyn CacheStore>,
        index: Arc<dyn SearchIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            config,
        }
    }

    fn conversations_key(user_id: Uuid) -> String {
        format!("conversations:{}", user_id)
    }

    fn active_member(user_id: Uuid, conversation_id: Uuid) -> String {
        format!("{}_{}", user_id, conversation_id)
    }

    /// Append one question/answer pair to a live conversation and push
    /// its archival deadline out by the configured idle window.
    ///
    /// The payload update is a plain read-modify-write; a conversation is
    /// assumed to have a single writer (its owning chat session), so two
    /// interleaved appends to the same conversation are not defended against.
    pub async fn record_exchange(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        question: &str,
        answer: &str,
    ) -> Result<()> {
        let hash_key = Self::conversations_key(user_id);
        let field = conversation_id.to_string();

        let mut payload = match self.store.hash_get(&hash_key, &field).await? {
            Some(encoded) => match serde_json::from_str::<ConversationPayload>(&encoded) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(
                        user_id = %user_id,
                        conversation_id = %conversation_id,
                        error = %err,
                        "Resetting unparseable conversation payload"
                    );
                    ConversationPayload::default()
                }
            },
            None => ConversationPayload::default(),
        };
        payload.exchanges.push(ChatExchange {
            question: question.to_string(),
            answer: answer.to_string(),
            at: Utc::now(),
        });

        let encoded = serde_json::to_string(&payload)?;
        self.store.hash_set(&hash_key, &field, &encoded).await?;

        let deadline =
            Utc::now() + chrono::Duration::seconds(self.config.archive_after_secs as i64);
        self.store
            .zset_add(
                ACTIVE_CONVERSATIONS_KEY,
                &Self::active_member(user_id, conversation_id),
                deadline.timestamp() as f64,
            )
            .await
    }

    /// Fused chat-history retrieval: a dense query over the refined text
    /// and a lexical query over the keyword run concurrently against the
    /// user's archived memories, then merge by reciprocal rank.
    pub async fn retrieve_memory(
        &self,
        user_id: Uuid,
        refined_query: &str,
        keyword: &str,
    ) -> Result<Vec<MemoryRecord>> {
        let query_vector = self.embedder.embed(refined_query).await?;
        let (dense_hits, text_hits) = future::try_join(
            self.index.knn_memories(
                user_id,
                &query_vector,
                self.config.fetch_size,
                Some(self.config.min_similarity),
            ),
            self.index
                .search_memories(user_id, keyword, self.config.fetch_size),
        )
        .await?;

        let lexical: Vec<(String, MemoryRecord)> =
            text_hits.into_iter().map(to_record_entry).collect();
        let dense: Vec<(String, MemoryRecord)> =
            dense_hits.into_iter().map(to_record_entry).collect();

        let weights = FusionWeights {
            text: self.config.text_weight,
            knn: self.config.knn_weight,
        };
        let fused = fuse_ranked(&lexical, &dense, weights, self.config.result_size);

        debug!(
            user_id = %user_id,
            lexical = lexical.len(),
            dense = dense.len(),
            returned = fused.len(),
            "Retrieved chat memory"
        );
        Ok(fused.into_iter().map(|hit| hit.payload).collect())
    }

    /// One archival sweep over every conversation whose deadline is at or
    /// before `now`. Each due entry gets an async digest-and-index task,
    /// and its tracking entries are cleared together right after dispatch,
    /// not after the task confirms. A task that fails afterwards therefore
    /// loses that transcript; the failure is logged by the task itself.
    /// Entry failures are isolated, so one bad entry never stops the sweep.
    pub async fn run_archive_scan(&self, now: DateTime<Utc>) -> Result<ArchiveScanStats> {
        let due_members = self
            .store
            .zset_range_by_score(ACTIVE_CONVERSATIONS_KEY, now.timestamp() as f64)
            .await?;

        let mut stats = ArchiveScanStats {
            due: due_members.len(),
            ..ArchiveScanStats::default()
        };

        for member in due_members {
            let (user_id, conversation_id) = match parse_active_member(&member) {
                Some(parsed) => parsed,
                None => {
                    warn!(member = %member, "Removing unparseable active-conversation entry");
                    if let Err(err) = self
                        .store
                        .zset_remove(ACTIVE_CONVERSATIONS_KEY, &member)
                        .await
                    {
                        warn!(member = %member, error = %err, "Failed to remove unparseable entry");
                    }
                    stats.failed += 1;
                    continue;
                }
            };

            let hash_key = Self::conversations_key(user_id);
            let field = conversation_id.to_string();

            let encoded = match self.store.hash_get(&hash_key, &field).await {
                Ok(encoded) => encoded,
                Err(err) => {
                    warn!(
                        conversation = %member,
                        error = %err,
                        "Failed to load conversation payload, will retry next scan"
                    );
                    stats.failed += 1;
                    continue;
                }
            };
            let encoded = match encoded {
                Some(encoded) => encoded,
                None => {
                    debug!(conversation = %member, "Due conversation has no payload, skipping");
                    stats.skipped += 1;
                    continue;
                }
            };
            let payload = match serde_json::from_str::<ConversationPayload>(&encoded) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(
                        conversation = %member,
                        error = %err,
                        "Conversation payload is unparseable, leaving entry in place"
                    );
                    stats.failed += 1;
                    continue;
                }
            };

            self.dispatch_archive_task(user_id, conversation_id, payload);

            match self
                .store
                .zset_remove_with_hash_delete(ACTIVE_CONVERSATIONS_KEY, &member, &hash_key, &field)
                .await
            {
                Ok(()) => stats.dispatched += 1,
                Err(err) => {
                    warn!(
                        conversation = %member,
                        error = %err,
                        "Failed to clear archived conversation, will retry next scan"
                    );
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    fn dispatch_archive_task(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        payload: ConversationPayload,
    ) {
        let index = self.index.clone();
        let embedder = self.embedder.clone();
        tokio::spawn(async move {
            if let Err(err) =
                archive_conversation(index, embedder, user_id, conversation_id, payload).await
            {
                error!(
                    user_id = %user_id,
                    conversation_id = %conversation_id,
                    error = %err,
                    "Conversation archival failed after tracking was cleared, transcript lost"
                );
            }
        });
    }

    /// Every tracked conversation, due or not. Mainly for introspection.
    pub async fn active_conversations(&self) -> Result<Vec<String>> {
        self.store
            .zset_range_by_score(ACTIVE_CONVERSATIONS_KEY, f64::INFINITY)
            .await
    }

    pub async fn live_payload(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Option<ConversationPayload>> {
        let encoded = self
            .store
            .hash_get(
                &Self::conversations_key(user_id),
                &conversation_id.to_string(),
            )
            .await?;
        match encoded {
            Some(encoded) => Ok(Some(serde_json::from_str(&encoded)?)),
            None => Ok(None),
        }
    }
}

fn to_record_entry(hit: MemoryHit) -> (String, MemoryRecord) {
    (
        hit.id,
        MemoryRecord {
            question: hit.question,
            answer: hit.answer,
        },
    )
}

fn parse_active_member(member: &str) -> Option<(Uuid, Uuid)> {
    let (user, conversation) = member.split_once('_')?;
    let user_id = Uuid::parse_str(user).ok()?;
    let conversation_id = Uuid::parse_str(conversation).ok()?;
    Some((user_id, conversation_id))
}

async fn archive_conversation(
    index: Arc<dyn SearchIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    user_id: Uuid,
    conversation_id: Uuid,
    payload: ConversationPayload,
) -> Result<()> {
    if payload.exchanges.is_empty() {
        return Ok(());
    }

    let exchange_count = payload.exchanges.len();
    let digest = ConversationDigest::from_payload(&payload);
    let embedding = embedder.embed(&digest.transcript).await?;
    let document = MemoryDocument {
        id: format!("{}_{}", user_id, conversation_id),
        user_id,
        conversation_id,
        question: digest.questions,
        answer: digest.answers,
        embedding,
        created_at: Utc::now(),
    };
    index.index_memory(&document).await?;

    info!(
        user_id = %user_id,
        conversation_id = %conversation_id,
        exchanges = exchange_count,
        "Archived conversation to memory index"
    );
    Ok(())
}

/// Retrieval-optimized reduction of a conversation: the question and
/// answer sides joined for lexical search, and a bounded transcript for
/// the embedding.
struct ConversationDigest {
    questions: String,
    answers: String,
    transcript: String,
}

impl ConversationDigest {
    fn from_payload(payload: &ConversationPayload) -> Self {
        let questions = payload
            .exchanges
            .iter()
            .map(|exchange| exchange.question.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let answers = payload
            .exchanges
            .iter()
            .map(|exchange| exchange.answer.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut transcript = String::new();
        if let Some(summary) = &payload.summary {
            transcript.push_str(summary);
            transcript.push('\n');
        }
        for exchange in &payload.exchanges {
            if transcript.len() >= DIGEST_MAX_LEN {
                break;
            }
            transcript.push_str("Q: ");
            transcript.push_str(&exchange.question);
            transcript.push_str("\nA: ");
            transcript.push_str(&exchange.answer);
            transcript.push('\n');
        }
        truncate_on_boundary(&mut transcript, DIGEST_MAX_LEN);

        Self {
            questions,
            answers,
            transcript,
        }
    }
}

fn truncate_on_boundary(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut cut = limit;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
