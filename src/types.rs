//! Core types for Recall

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a memory
pub type MemoryId = i64;

/// Unique identifier for a conversation
pub type ConversationId = i64;

/// A memory record owned by exactly one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier
    pub id: MemoryId,
    /// Owner of the memory
    pub user_id: String,
    /// Memory type (short_term, long_term, episodic, semantic)
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Short label for the memory
    pub title: String,
    /// Memory content
    pub content: String,
    /// Additional context data (conversation id, source, category, ...)
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    /// Importance score (0.0 - 1.0)
    #[serde(default)]
    pub importance_score: f32,
    /// Number of times the memory was accessed
    #[serde(default)]
    pub access_count: i32,
    /// When the memory was last accessed
    pub last_accessed: DateTime<Utc>,
    /// When the memory was created (immutable)
    pub created_at: DateTime<Utc>,
    /// When the memory expires (never set for long_term/semantic)
    pub expires_at: Option<DateTime<Utc>>,
}

/// Memory type classification
///
/// Expiry invariants, enforced at write-time:
/// - `ShortTerm` always gets `expires_at = created_at + expiry_hours`
/// - `LongTerm` and `Semantic` never carry an expiry
/// - `Episodic` may carry an expiry set by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Recent conversation context, aged out after 24h by default
    #[default]
    ShortTerm,
    /// Important information, retained until explicitly deleted
    LongTerm,
    /// Specific events and experiences
    Episodic,
    /// Facts and general knowledge about the user
    Semantic,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::ShortTerm => "short_term",
            MemoryType::LongTerm => "long_term",
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
        }
    }

    /// Returns true if this type may carry an expiry timestamp
    pub fn expirable(&self) -> bool {
        matches!(self, MemoryType::ShortTerm | MemoryType::Episodic)
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short_term" => Ok(MemoryType::ShortTerm),
            "long_term" => Ok(MemoryType::LongTerm),
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            _ => Err(format!("Unknown memory type: {}", s)),
        }
    }
}

/// Per-user communication style and preferences, at most one per user
///
/// Created lazily on first access with defaults; never deleted independent
/// of the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityProfile {
    /// Owner of the profile
    pub user_id: String,
    /// Free-form style label (formal, casual, friendly, professional)
    pub communication_style: String,
    /// Ordered list of user interests
    #[serde(default)]
    pub interests: Vec<String>,
    /// User preferences and settings
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,
    /// Learned conversation patterns
    #[serde(default)]
    pub conversation_patterns: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonalityProfile {
    /// Default profile for a user that has none yet
    pub fn defaults(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            communication_style: "casual".to_string(),
            interests: Vec::new(),
            preferences: HashMap::new(),
            conversation_patterns: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a personality profile
///
/// Only the known fields are settable; anything else is unrepresentable,
/// which replaces the original set-any-attribute-by-name pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalityUpdate {
    pub communication_style: Option<String>,
    pub interests: Option<Vec<String>>,
    pub preferences: Option<HashMap<String, serde_json::Value>>,
    pub conversation_patterns: Option<HashMap<String, serde_json::Value>>,
}

impl PersonalityUpdate {
    pub fn is_empty(&self) -> bool {
        self.communication_style.is_none()
            && self.interests.is_none()
            && self.preferences.is_none()
            && self.conversation_patterns.is_none()
    }
}

/// A chat conversation owned by one user
///
/// The summary fields are write targets of asynchronous analysis
/// (see `extraction`), read by the memory engine when ranking relevant
/// memories against `key_topics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub favourite: bool,
    #[serde(default)]
    pub archived: bool,
    /// AI-generated summary of the conversation
    #[serde(default)]
    pub conversation_summary: String,
    /// Important topics discussed
    #[serde(default)]
    pub key_topics: Vec<String>,
    /// Overall sentiment of the conversation
    #[serde(default)]
    pub sentiment_analysis: HashMap<String, serde_json::Value>,
}

/// A message within a conversation
///
/// Immutable once the importance annotation is attached; that field is
/// mutated exactly once, asynchronously, after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub content: String,
    pub is_from_user: bool,
    pub created_at: DateTime<Utc>,
    /// Message importance for memory retention
    #[serde(default)]
    pub importance_score: f32,
    /// Detected emotions in the message
    #[serde(default)]
    pub emotions: HashMap<String, serde_json::Value>,
    /// Named entities extracted from the message
    #[serde(default)]
    pub entities: Vec<serde_json::Value>,
    /// Detected user intent
    #[serde(default)]
    pub intent: String,
}

/// Mutable per-conversation context, exactly one per conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub current_topic: String,
    #[serde(default)]
    pub user_mood: String,
    /// Ordered flow of conversation topics
    #[serde(default)]
    pub conversation_flow: Vec<String>,
    /// Memory ids currently in play
    #[serde(default)]
    pub active_memories: Vec<MemoryId>,
    /// Dynamic context variables (scratchpad, e.g. has_personal_info)
    #[serde(default)]
    pub context_variables: HashMap<String, serde_json::Value>,
}

impl ConversationContext {
    /// Default context for a conversation that has none yet
    pub fn defaults(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            current_topic: String::new(),
            user_mood: "neutral".to_string(),
            conversation_flow: Vec::new(),
            active_memories: Vec::new(),
            context_variables: HashMap::new(),
        }
    }
}

/// Partial update for a conversation context (typed allow-list)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextUpdate {
    pub current_topic: Option<String>,
    pub user_mood: Option<String>,
    pub conversation_flow: Option<Vec<String>>,
    pub active_memories: Option<Vec<MemoryId>>,
    pub context_variables: Option<HashMap<String, serde_json::Value>>,
}

impl ContextUpdate {
    pub fn is_empty(&self) -> bool {
        self.current_topic.is_none()
            && self.user_mood.is_none()
            && self.conversation_flow.is_none()
            && self.active_memories.is_none()
            && self.context_variables.is_none()
    }
}

/// Role of a chat message sent to the completion provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single message in a completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A document returned by the knowledge-base similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagDocument {
    /// Text blob of the document
    pub text: String,
    /// Opaque provider metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A personal memory reshaped for RAG context merging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagMemory {
    pub content: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    pub importance: f32,
    /// Always "personal_memory", distinguishes from knowledge-base documents
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&Memory> for RagMemory {
    fn from(memory: &Memory) -> Self {
        Self {
            content: memory.content.clone(),
            context: memory.context.clone(),
            importance: memory.importance_score,
            kind: "personal_memory".to_string(),
        }
    }
}

/// A recent message as delivered inside a conversation context snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentMessage {
    pub content: String,
    pub is_from_user: bool,
    pub created_at: DateTime<Utc>,
    pub importance_score: f32,
}

/// Snapshot of a conversation's context for AI-call assembly
///
/// `recent_messages` are delivered oldest-first so the transcript reads
/// top-down. Empty (`conversation_id = None`) when the conversation does
/// not exist or is not owned by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub current_topic: String,
    #[serde(default)]
    pub user_mood: String,
    #[serde(default)]
    pub conversation_flow: Vec<String>,
    #[serde(default)]
    pub recent_messages: Vec<RecentMessage>,
    #[serde(default)]
    pub relevant_memories: Vec<Memory>,
    #[serde(default)]
    pub context_variables: HashMap<String, serde_json::Value>,
}

impl ContextSnapshot {
    pub fn is_empty(&self) -> bool {
        self.conversation_id.is_none()
    }
}

/// Aggregate counters from one maintenance run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub users_processed: i64,
    pub memories_promoted: i64,
    pub memories_cleaned: i64,
    pub contexts_refreshed: i64,
}

/// Counts removed by one cleanup pass
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupStats {
    /// Short-term memories removed by the expiry sweep
    pub expired: i64,
    /// Short-term memories removed by excess-count eviction
    pub evicted: i64,
}

impl CleanupStats {
    pub fn total(&self) -> i64 {
        self.expired + self.evicted
    }
}
