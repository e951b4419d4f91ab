//! Memory manager
//!
//! Per-user facade over the memory store: storage, promotion, retrieval
//! ranking, cleanup, personality access, and RAG-memory merging. Holds no
//! long-lived state of its own - everything lives in the durable store, so
//! the same API serves both the request path and background tasks.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::prompt;
use crate::scoring::{self, MessageAnalysis};
use crate::storage::{queries, Storage};
use crate::types::*;

/// Manages short-term and long-term memory for one user
pub struct MemoryManager<'a> {
    storage: &'a Storage,
    config: MemoryConfig,
    user_id: String,
}

impl<'a> MemoryManager<'a> {
    pub fn new(storage: &'a Storage, config: MemoryConfig, user_id: impl Into<String>) -> Self {
        Self {
            storage,
            config,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Retrieve short-term memory items, most recently accessed first
    pub fn get_short_term_memory(&self, limit: Option<i64>) -> Result<Vec<Memory>> {
        let limit = limit.unwrap_or(self.config.short_term_memory_limit);
        self.storage
            .with_connection(|conn| queries::list_short_term(conn, &self.user_id, limit))
    }

    /// Retrieve long-term memory items, optionally filtered by query
    ///
    /// Every returned memory is counted as accessed.
    pub fn get_long_term_memory(&self, query: Option<&str>, limit: i64) -> Result<Vec<Memory>> {
        self.storage.with_connection(|conn| {
            queries::list_long_term(conn, &self.user_id, query, limit, Utc::now())
        })
    }

    /// Store a short-term memory item
    ///
    /// Sets the configured expiry and runs the cleanup passes as a side
    /// effect, so the store never exceeds the short-term cap for long.
    pub fn store_short_term_memory(
        &self,
        title: &str,
        content: &str,
        context: Option<HashMap<String, serde_json::Value>>,
        importance: f32,
    ) -> Result<Memory> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.short_term_memory_expiry_hours);

        let memory = self.storage.with_transaction(|conn| {
            queries::create_memory(
                conn,
                &self.user_id,
                MemoryType::ShortTerm,
                title,
                content,
                &context.unwrap_or_default(),
                importance,
                Some(expires_at),
                now,
            )
        })?;

        self.cleanup_short_term_memory(now)?;

        Ok(memory)
    }

    /// Store a long-term memory item (no expiry)
    pub fn store_long_term_memory(
        &self,
        title: &str,
        content: &str,
        context: Option<HashMap<String, serde_json::Value>>,
        importance: f32,
    ) -> Result<Memory> {
        self.storage.with_transaction(|conn| {
            queries::create_memory(
                conn,
                &self.user_id,
                MemoryType::LongTerm,
                title,
                content,
                &context.unwrap_or_default(),
                importance,
                None,
                Utc::now(),
            )
        })
    }

    /// Promote a short-term memory to long-term storage
    ///
    /// Succeeds only when the memory belongs to this user, is still
    /// short-term, and clears the importance threshold; otherwise returns
    /// false (warning when the memory is missing entirely). Never raises to
    /// the caller, and a second call on an already-promoted memory is a
    /// no-op failure.
    pub fn promote_to_long_term(&self, memory_id: MemoryId) -> Result<bool> {
        let promoted = self.storage.with_connection(|conn| {
            queries::promote_memory(
                conn,
                &self.user_id,
                memory_id,
                self.config.long_term_importance_threshold,
            )
        })?;

        if promoted {
            info!(memory_id, "Promoted memory to long-term storage");
        } else if self
            .storage
            .with_connection(|conn| queries::get_memory(conn, &self.user_id, memory_id))?
            .is_none()
        {
            warn!(memory_id, "Short-term memory not found");
        } else {
            debug!(memory_id, "Short-term memory not eligible for promotion");
        }
        Ok(promoted)
    }

    /// Run the expiry sweep and excess-count eviction for this user
    pub fn cleanup_short_term_memory(&self, now: DateTime<Utc>) -> Result<CleanupStats> {
        let stats = self.storage.with_connection(|conn| {
            queries::cleanup_short_term(conn, &self.user_id, self.config.short_term_memory_limit, now)
        })?;

        if stats.expired > 0 {
            info!(count = stats.expired, "Cleaned up expired short-term memories");
        }
        if stats.evicted > 0 {
            info!(count = stats.evicted, "Cleaned up excess short-term memories");
        }
        Ok(stats)
    }

    /// Get conversation context including recent messages and active memories
    ///
    /// Fails soft: returns an empty snapshot when the conversation does not
    /// exist or is not owned by this user. Recent messages are delivered
    /// oldest-first.
    pub fn get_conversation_context(
        &self,
        conversation_id: ConversationId,
    ) -> Result<ContextSnapshot> {
        self.storage.with_connection(|conn| {
            let conversation = match queries::get_conversation(conn, &self.user_id, conversation_id)? {
                Some(conversation) => conversation,
                None => return Ok(ContextSnapshot::default()),
            };

            let context = queries::get_or_create_context(conn, conversation_id)?;

            let mut recent = queries::recent_messages(
                conn,
                conversation_id,
                self.config.conversation_context_limit,
            )?;
            recent.reverse();

            let relevant_memories = self.relevant_memories_for(conn, &conversation)?;

            Ok(ContextSnapshot {
                conversation_id: Some(conversation_id),
                current_topic: context.current_topic,
                user_mood: context.user_mood,
                conversation_flow: context.conversation_flow,
                recent_messages: recent
                    .into_iter()
                    .map(|msg| RecentMessage {
                        content: msg.content,
                        is_from_user: msg.is_from_user,
                        created_at: msg.created_at,
                        importance_score: msg.importance_score,
                    })
                    .collect(),
                relevant_memories,
                context_variables: context.context_variables,
            })
        })
    }

    /// Update conversation context with new information
    ///
    /// Logs a warning and does nothing when the conversation is missing or
    /// foreign-owned.
    pub fn update_conversation_context(
        &self,
        conversation_id: ConversationId,
        update: &ContextUpdate,
    ) -> Result<()> {
        self.storage.with_connection(|conn| {
            if queries::get_conversation(conn, &self.user_id, conversation_id)?.is_none() {
                warn!(conversation_id, "Conversation not found");
                return Ok(());
            }
            queries::update_context(conn, conversation_id, update)?;
            Ok(())
        })
    }

    /// Extract important information from a message for memory storage
    pub fn extract_important_information(
        &self,
        message: &str,
        is_from_user: bool,
    ) -> MessageAnalysis {
        scoring::analyze_message(message, is_from_user, &self.config.importance_keywords)
    }

    /// Get the user's personality profile, creating defaults on first access
    pub fn get_user_personality(&self) -> Result<PersonalityProfile> {
        self.storage
            .with_connection(|conn| queries::get_or_create_personality(conn, &self.user_id, Utc::now()))
    }

    /// Apply a partial update to the user's personality profile
    pub fn update_user_personality(&self, update: &PersonalityUpdate) -> Result<PersonalityProfile> {
        self.storage
            .with_connection(|conn| queries::update_personality(conn, &self.user_id, update, Utc::now()))
    }

    /// Memories most relevant to the current query, shaped for RAG merging
    ///
    /// Combines long-term matches with query-filtered short-term items,
    /// half the limit each, personal long-term context first. Must never
    /// block a response: any internal failure is logged and swallowed,
    /// yielding an empty list.
    pub fn get_rag_enhanced_memories(&self, query: &str, limit: i64) -> Vec<RagMemory> {
        match self.rag_enhanced_memories_inner(query, limit) {
            Ok(memories) => memories,
            Err(e) => {
                warn!(error = %e, "Error getting RAG enhanced memories");
                Vec::new()
            }
        }
    }

    fn rag_enhanced_memories_inner(&self, query: &str, limit: i64) -> Result<Vec<RagMemory>> {
        let half = limit / 2;

        let long_term = self.get_long_term_memory(Some(query), half)?;

        let mut short_term = self.get_short_term_memory(Some(half))?;
        if !query.is_empty() {
            let query_lower = query.to_lowercase();
            short_term.retain(|memory| {
                memory.title.to_lowercase().contains(&query_lower)
                    || memory.content.to_lowercase().contains(&query_lower)
            });
            short_term.truncate(half as usize);
        }

        debug!(
            long_term = long_term.len(),
            short_term = short_term.len(),
            "Collected RAG enhanced memories"
        );

        Ok(long_term
            .iter()
            .chain(short_term.iter())
            .map(RagMemory::from)
            .collect())
    }

    /// Merge RAG document results with user memories into one context block
    ///
    /// Personal memories come first - they take priority over generic
    /// knowledge-base context.
    pub fn merge_rag_and_memory_context(
        &self,
        rag_docs: &[RagDocument],
        memories: &[RagMemory],
    ) -> String {
        prompt::merge_rag_and_memory_context(rag_docs, memories)
    }

    /// Memories relevant to the conversation's key topics
    ///
    /// Up to 3 substring matches per topic, combined list capped at 10.
    fn relevant_memories_for(
        &self,
        conn: &rusqlite::Connection,
        conversation: &Conversation,
    ) -> Result<Vec<Memory>> {
        let mut relevant = Vec::new();
        for topic in &conversation.key_topics {
            let matches = queries::search_memories_by_topic(conn, &self.user_id, topic, 3)?;
            relevant.extend(matches);
        }
        relevant.truncate(10);
        Ok(relevant)
    }
}
