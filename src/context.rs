//! Context manager
//!
//! Builds the full AI-call context for a conversation turn and processes
//! completed turns back into memory updates. This is the single aggregation
//! point consumed by the chat pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::memory::MemoryManager;
use crate::prompt::truncate_chars;
use crate::scoring::MessageAnalysis;
use crate::storage::Storage;
use crate::types::*;

/// Importance at or above which a user message is captured as short-term
/// memory. One keyword plus the user bonus lands exactly here, and such
/// messages ("I love X") must be captured, so the comparison is inclusive.
const CAPTURE_THRESHOLD: f32 = 0.3;

/// Everything the completion orchestrator needs for one AI call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiCallContext {
    pub conversation_context: ContextSnapshot,
    pub user_personality: PersonalityProfile,
    /// Long-term memories ranked against the current message (capped)
    pub relevant_memories: Vec<Memory>,
    pub current_message_info: MessageAnalysis,
    /// Recent short-term memories (capped at 10)
    pub short_term_memory: Vec<Memory>,
}

/// Manages conversation context and flow for one conversation
pub struct ContextManager<'a> {
    conversation_id: ConversationId,
    memory_manager: MemoryManager<'a>,
}

impl<'a> ContextManager<'a> {
    pub fn new(
        storage: &'a Storage,
        config: MemoryConfig,
        conversation_id: ConversationId,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            memory_manager: MemoryManager::new(storage, config, user_id),
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn memory_manager(&self) -> &MemoryManager<'a> {
        &self.memory_manager
    }

    /// Build comprehensive context for AI response generation
    pub fn build_context_for_ai(&self, current_message: &str) -> Result<AiCallContext> {
        let conversation_context = self
            .memory_manager
            .get_conversation_context(self.conversation_id)?;

        let user_personality = self.memory_manager.get_user_personality()?;

        let relevant_memories = self.memory_manager.get_long_term_memory(
            Some(current_message),
            self.memory_manager.config().relevant_memories_limit,
        )?;

        let current_message_info = self
            .memory_manager
            .extract_important_information(current_message, true);

        let short_term_memory = self.memory_manager.get_short_term_memory(Some(10))?;

        debug!(
            conversation_id = self.conversation_id,
            relevant = relevant_memories.len(),
            short_term = short_term_memory.len(),
            "Built AI call context"
        );

        Ok(AiCallContext {
            conversation_context,
            user_personality,
            relevant_memories,
            current_message_info,
            short_term_memory,
        })
    }

    /// Process a completed AI turn and update memories/context
    ///
    /// This is the sole mutation path from a finished turn back into memory
    /// state; callers must invoke it exactly once per turn. The user
    /// message is captured as short-term memory when its importance reaches
    /// the capture threshold, and personal information flags the
    /// conversation's context variables. Depends only on the user's input,
    /// so it runs even when the AI response was a degraded fallback.
    pub fn process_ai_response(&self, ai_response: &str, user_message: &str) -> Result<()> {
        let user_info = self
            .memory_manager
            .extract_important_information(user_message, true);
        let ai_info = self
            .memory_manager
            .extract_important_information(ai_response, false);

        debug!(
            user_importance = user_info.importance_score,
            ai_importance = ai_info.importance_score,
            "Scored completed turn"
        );

        if user_info.importance_score >= CAPTURE_THRESHOLD {
            let title = format!("User message: {}...", truncate_chars(user_message, 50));
            let mut context = HashMap::new();
            context.insert(
                "conversation_id".to_string(),
                serde_json::json!(self.conversation_id),
            );
            self.memory_manager.store_short_term_memory(
                &title,
                user_message,
                Some(context),
                user_info.importance_score,
            )?;
        }

        if user_info.contains_personal_info {
            let mut variables = HashMap::new();
            variables.insert("has_personal_info".to_string(), serde_json::json!(true));
            variables.insert(
                "last_personal_info".to_string(),
                serde_json::json!(user_message),
            );
            self.memory_manager.update_conversation_context(
                self.conversation_id,
                &ContextUpdate {
                    context_variables: Some(variables),
                    ..Default::default()
                },
            )?;
        }

        Ok(())
    }
}
