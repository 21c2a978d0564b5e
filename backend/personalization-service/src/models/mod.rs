use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content modality covered by personalization.
///
/// Everything modality-specific hangs off this enum: the key segment used in
/// storage keys and the cross-modal weight pair applied when blending the
/// two per-modality profiles for this recommendation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Post,
    Video,
}

/// Cross-modal blend weights applied to the per-modality profiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub post: f32,
    pub video: f32,
}

impl Modality {
    pub const ALL: [Modality; 2] = [Modality::Post, Modality::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Post => "post",
            Modality::Video => "video",
        }
    }

    /// Weight pair used when recommending this modality: the target modality
    /// dominates, the other contributes a smaller cross-modal share.
    pub fn blend_weights(&self) -> BlendWeights {
        match self {
            Modality::Post => BlendWeights {
                post: 0.7,
                video: 0.3,
            },
            Modality::Video => BlendWeights {
                post: 0.3,
                video: 0.7,
            },
        }
    }
}

/// Engagement action kinds tracked per user and modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Like,
    Comment,
    Click,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Like, ActionKind::Comment, ActionKind::Click];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Like => "like",
            ActionKind::Comment => "comment",
            ActionKind::Click => "click",
        }
    }

    /// Contribution weight of one logged action in the interest profile.
    pub fn weight(&self) -> f32 {
        match self {
            ActionKind::Like => 5.0,
            ActionKind::Comment => 3.0,
            ActionKind::Click => 1.0,
        }
    }
}

/// Contribution weight of one cached search-keyword embedding.
pub const KEYWORD_WEIGHT: f32 = 7.0;

/// True when every component of the vector is exactly zero. A zero profile
/// means "no personalization signal yet" and must never reach a KNN query.
pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|component| *component == 0.0)
}

/// One question/answer exchange inside a live conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatExchange {
    pub question: String,
    pub answer: String,
    pub at: DateTime<Utc>,
}

/// Live conversation payload held in the store until archival.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationPayload {
    pub exchanges: Vec<ChatExchange>,
    /// Running-summary slot for future incremental summarization; carried
    /// into the archival digest when present.
    #[serde(default)]
    pub summary: Option<String>,
}

/// Archived conversation entry returned by fused memory retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub question: String,
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_weights_favor_target_modality() {
        let post = Modality::Post.blend_weights();
        assert_eq!(post.post, 0.7);
        assert_eq!(post.video, 0.3);

        let video = Modality::Video.blend_weights();
        assert_eq!(video.post, 0.3);
        assert_eq!(video.video, 0.7);
    }

    #[test]
    fn test_action_weights() {
        assert_eq!(ActionKind::Like.weight(), 5.0);
        assert_eq!(ActionKind::Comment.weight(), 3.0);
        assert_eq!(ActionKind::Click.weight(), 1.0);
        assert_eq!(KEYWORD_WEIGHT, 7.0);
    }

    #[test]
    fn test_zero_vector_checks_every_component() {
        assert!(is_zero_vector(&[0.0, 0.0, 0.0]));
        assert!(is_zero_vector(&[]));
        assert!(!is_zero_vector(&[0.0, 0.0, 0.001]));
        assert!(!is_zero_vector(&[1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_key_segments() {
        assert_eq!(Modality::Post.as_str(), "post");
        assert_eq!(Modality::Video.as_str(), "video");
        assert_eq!(ActionKind::Like.as_str(), "like");
        assert_eq!(ActionKind::Comment.as_str(), "comment");
        assert_eq!(ActionKind::Click.as_str(), "click");
    }
}
