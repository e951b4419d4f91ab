//! Prompt assembly
//!
//! Deterministic text builders that fold personality, memories, and
//! knowledge-base documents into the messages sent to the completion
//! provider. Pure string work - no storage, no providers.

use std::fmt::Write;

use crate::context::AiCallContext;
use crate::types::{ChatMessage, RagDocument, RagMemory};

/// Memories shown in the enhanced system prompt / merged context
const MERGED_MEMORY_LIMIT: usize = 3;

/// Short-term memories folded into context messages
const CONTEXT_MESSAGE_MEMORY_LIMIT: usize = 5;

/// Merge RAG documents with personal memories into a single context block
///
/// Personal memories come first (higher priority), then knowledge-base
/// documents. Either section is omitted when empty; an empty result means
/// there is nothing to inject.
pub fn merge_rag_and_memory_context(rag_docs: &[RagDocument], memories: &[RagMemory]) -> String {
    let mut merged = String::new();

    if !memories.is_empty() {
        merged.push_str("Personal context from previous conversations:\n");
        for memory in memories.iter().take(MERGED_MEMORY_LIMIT) {
            let _ = writeln!(merged, "- {}", memory.content);
        }
        merged.push('\n');
    }

    if !rag_docs.is_empty() {
        merged.push_str("Relevant information from knowledge base:\n");
        for doc in rag_docs {
            let _ = writeln!(merged, "{}\n", doc.text);
        }
    }

    merged
}

/// Build the enhanced system prompt with personality and memory context
pub fn build_enhanced_system_prompt(base_prompt: &str, context: &AiCallContext) -> String {
    let personality = &context.user_personality;
    let mut prompt = format!("{}\n\n", base_prompt);

    let _ = writeln!(
        prompt,
        "User Communication Style: {}",
        personality.communication_style
    );
    if !personality.interests.is_empty() {
        let _ = writeln!(prompt, "User Interests: {}", personality.interests.join(", "));
    }
    if !personality.preferences.is_empty() {
        let preferences =
            serde_json::to_string(&personality.preferences).unwrap_or_else(|_| "{}".to_string());
        let _ = writeln!(prompt, "User Preferences: {}", preferences);
    }

    if !context.relevant_memories.is_empty() {
        prompt.push_str("\nRelevant information from past conversations:\n");
        for memory in context.relevant_memories.iter().take(MERGED_MEMORY_LIMIT) {
            let _ = writeln!(
                prompt,
                "- {}: {}...",
                memory.title,
                truncate_chars(&memory.content, 200)
            );
        }
    }

    prompt.push_str("\nInstructions:\n");
    prompt.push_str(
        "- Use both the knowledge base information and personal conversation history \
         to provide accurate, personalized responses\n\
         - Reference previous conversations naturally when relevant\n\
         - Maintain consistency with past interactions and user preferences\n\
         - If the knowledge base and personal memory conflict, clarify the discrepancy\n\
         - Be conversational and natural, not robotic\n",
    );

    prompt
}

/// Build system messages carrying recent short-term memory context
pub fn build_memory_context_messages(context: &AiCallContext) -> Vec<ChatMessage> {
    if context.short_term_memory.is_empty() {
        return Vec::new();
    }

    let mut content = String::from("Recent conversation context:\n");
    for memory in context
        .short_term_memory
        .iter()
        .take(CONTEXT_MESSAGE_MEMORY_LIMIT)
    {
        let _ = writeln!(
            content,
            "- {}: {}...",
            memory.title,
            truncate_chars(&memory.content, 100)
        );
    }

    vec![ChatMessage::system(content)]
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
