use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored anonymous message. Older records carried the body under
/// different field names (`text`, `message`, `content`), so all three are
/// kept and the first non-empty one wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    pub fn new(content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            text: None,
            message: None,
            content: Some(content.to_string()),
        }
    }

    /// First non-empty body field, trimmed. `None` means there is nothing
    /// to classify for this message.
    pub fn classifiable_text(&self) -> Option<&str> {
        [
            self.text.as_deref(),
            self.message.as_deref(),
            self.content.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
    }
}

/// Classification outcome for one text, as returned by the sentiment
/// worker. `tag` is nominally POSITIVE / NEGATIVE / UNCERTAIN but is kept
/// as an open string; anything unrecognized buckets as neutral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    pub tag: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub positive_score: f64,
    #[serde(default)]
    pub negative_score: f64,
}

/// A message with its (possibly absent) classification attached. The
/// original message fields serialize unchanged next to `sentiment`.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedMessage {
    #[serde(flatten)]
    pub message: Message,
    pub sentiment: Option<SentimentResult>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Buckets {
    pub positive: Vec<EnrichedMessage>,
    pub negative: Vec<EnrichedMessage>,
    pub neutral: Vec<EnrichedMessage>,
}

impl Buckets {
    pub fn counts(&self) -> Counts {
        Counts {
            positive: self.positive.len(),
            negative: self.negative.len(),
            neutral: self.neutral.len(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

/// Response body for the bucketed retrieval endpoint. `messages` is the
/// flattened positive + negative + neutral order, not chronological.
#[derive(Debug, Serialize)]
pub struct RetrievalResponse {
    pub success: bool,
    pub message: String,
    pub counts: Counts,
    pub buckets: Buckets,
    pub messages: Vec<EnrichedMessage>,
}

impl RetrievalResponse {
    pub fn empty(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            counts: Counts::default(),
            buckets: Buckets::default(),
            messages: Vec::new(),
        }
    }

    pub fn bucketed(buckets: Buckets, counts: Counts) -> Self {
        let messages = buckets
            .positive
            .iter()
            .chain(&buckets.negative)
            .chain(&buckets.neutral)
            .cloned()
            .collect();

        Self {
            success: true,
            message: "User messages fetched successfully".to_string(),
            counts,
            buckets,
            messages,
        }
    }
}

/// The generic `{ success, message }` envelope the API uses for anything
/// that is not a data response.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}
