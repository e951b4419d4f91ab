//! Chat-turn pipeline
//!
//! Orchestrates one conversation turn: knowledge-base retrieval, personal
//! memory enhancement, prompt assembly, the completion call, and the
//! write-back of the finished turn into memory state.
//!
//! Provider degradation is absorbed at the capability wrappers, so a failed
//! similarity search shrinks the context and a failed completion yields the
//! apology string - neither aborts the memory bookkeeping that depends only
//! on the user's input.

use tracing::{debug, info};

use crate::config::MemoryConfig;
use crate::context::ContextManager;
use crate::error::Result;
use crate::memory::MemoryManager;
use crate::prompt;
use crate::providers::{
    complete_or_apology, search_or_empty, CompletionOptions, CompletionService, SimilaritySearch,
};
use crate::storage::Storage;
use crate::types::{ChatMessage, ChatRole, ConversationId};

/// Knowledge-base documents retrieved per turn
const RAG_DOCUMENT_LIMIT: usize = 3;

/// Personal memories folded into the RAG merge per turn
const RAG_MEMORY_LIMIT: i64 = 5;

/// Runs memory-enhanced conversation turns against the configured providers
pub struct ChatPipeline<'a> {
    storage: &'a Storage,
    config: MemoryConfig,
    completion: &'a dyn CompletionService,
    similarity: &'a dyn SimilaritySearch,
    options: CompletionOptions,
}

impl<'a> ChatPipeline<'a> {
    pub fn new(
        storage: &'a Storage,
        config: MemoryConfig,
        completion: &'a dyn CompletionService,
        similarity: &'a dyn SimilaritySearch,
    ) -> Self {
        Self {
            storage,
            config,
            completion,
            similarity,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one memory-enhanced turn and return the assistant's response
    ///
    /// `messages` is the running transcript; the last user message is the
    /// current one. Returns the apology fallback (never an error) when the
    /// completion provider is degraded; the user message is still scored
    /// and captured either way.
    pub async fn run_turn(
        &self,
        user_id: &str,
        conversation_id: ConversationId,
        mut messages: Vec<ChatMessage>,
        system_prompt: &str,
    ) -> Result<String> {
        let memory_manager = MemoryManager::new(self.storage, self.config.clone(), user_id);
        let context_manager = ContextManager::new(
            self.storage,
            self.config.clone(),
            conversation_id,
            user_id,
        );

        let current_message = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        // Knowledge-base retrieval, degraded to empty on provider failure
        let rag_docs = search_or_empty(
            self.similarity,
            &current_message,
            RAG_DOCUMENT_LIMIT,
            self.options.timeout,
        )
        .await;

        let rag_memories =
            memory_manager.get_rag_enhanced_memories(&current_message, RAG_MEMORY_LIMIT);

        let ai_context = context_manager.build_context_for_ai(&current_message)?;

        // Inject the merged personal + knowledge-base context into the
        // current user message
        let merged_context = prompt::merge_rag_and_memory_context(&rag_docs, &rag_memories);
        if !merged_context.is_empty() {
            if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == ChatRole::User) {
                last_user.content =
                    format!("{}\n\nUser question: {}", merged_context, current_message);
            }
        }

        let enhanced_prompt = prompt::build_enhanced_system_prompt(system_prompt, &ai_context);
        let mut request = vec![ChatMessage::system(enhanced_prompt)];
        request.extend(prompt::build_memory_context_messages(&ai_context));
        request.extend(messages);

        debug!(
            conversation_id,
            rag_docs = rag_docs.len(),
            rag_memories = rag_memories.len(),
            request_messages = request.len(),
            "Dispatching memory-enhanced completion"
        );

        let assistant_response =
            complete_or_apology(self.completion, &request, &self.options).await;

        // Input-side bookkeeping runs even for a degraded completion
        context_manager.process_ai_response(&assistant_response, &current_message)?;

        info!(conversation_id, "Completed memory-enhanced turn");
        Ok(assistant_response)
    }
}
