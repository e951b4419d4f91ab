//! Engine configuration
//!
//! All tunables live in an explicit [`MemoryConfig`] handed to the managers
//! at construction, never in ambient global state, so tests can override
//! limits without process-wide mutation.

use serde::{Deserialize, Serialize};

/// Default keyword set driving importance scoring
///
/// One hit per keyword, +0.1 each, case-insensitive substring match.
pub const DEFAULT_IMPORTANCE_KEYWORDS: &[&str] = &[
    "remember",
    "important",
    "never forget",
    "always",
    "prefer",
    "like",
    "dislike",
    "love",
    "hate",
    "birthday",
    "anniversary",
    "work",
    "job",
    "family",
    "hobby",
    "goal",
    "dream",
];

/// Configuration for the memory engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of short-term memories per user
    pub short_term_memory_limit: i64,
    /// Hours before short-term memories expire
    pub short_term_memory_expiry_hours: i64,
    /// Minimum importance score for promotion to long-term
    pub long_term_importance_threshold: f32,
    /// Number of relevant memories to include in AI context
    pub relevant_memories_limit: i64,
    /// Number of recent messages to keep in conversation context
    pub conversation_context_limit: i64,
    /// Keywords that raise a message's importance score
    pub importance_keywords: Vec<String>,
    /// Minimum age in hours before maintenance promotes a short-term memory
    pub promotion_min_age_hours: i64,
    /// Conversations updated within this window get their context refreshed
    pub active_conversation_window_days: i64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_memory_limit: 20,
            short_term_memory_expiry_hours: 24,
            long_term_importance_threshold: 0.7,
            relevant_memories_limit: 5,
            conversation_context_limit: 10,
            importance_keywords: DEFAULT_IMPORTANCE_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            promotion_min_age_hours: 12,
            active_conversation_window_days: 7,
        }
    }
}
