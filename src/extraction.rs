//! Asynchronous conversation analysis
//!
//! Background jobs that use the completion provider to distill a
//! conversation into summary fields and durable memories, plus per-message
//! importance annotation. Everything here is best-effort: malformed LLM
//! output or a degraded provider logs a warning and stores nothing.

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::memory::MemoryManager;
use crate::prompt::truncate_chars;
use crate::providers::{CompletionOptions, CompletionService};
use crate::storage::{queries, Storage};
use crate::types::{ChatMessage, ConversationId, Message};

/// Importance above which an annotated message is captured as memory
const MESSAGE_CAPTURE_THRESHOLD: f32 = 0.6;

/// Transcript cap sent to the extraction prompt, in characters
const EXTRACTION_TRANSCRIPT_LIMIT: usize = 4000;

const ANALYSIS_SYSTEM_PROMPT: &str = "Analyze this conversation and extract:\n\
    1. Key topics discussed (max 5, return as comma-separated list)\n\
    2. Overall sentiment (positive/negative/neutral)\n\
    3. Important information that should be remembered\n\
    4. Brief summary (max 2 sentences)\n\n\
    Return your response in JSON format:\n\
    {\n\
        \"key_topics\": [\"topic1\", \"topic2\"],\n\
        \"sentiment\": \"positive\",\n\
        \"important_info\": \"key information to remember\",\n\
        \"summary\": \"brief summary\"\n\
    }";

const EXTRACTION_SYSTEM_PROMPT: &str = "Analyze this conversation and extract important \
    information that should be remembered about the user. Focus on:\n\
    1. Personal preferences and interests\n\
    2. Important life events or information\n\
    3. Goals, dreams, or aspirations\n\
    4. Likes, dislikes, and opinions\n\
    5. Any other memorable details\n\n\
    Return a JSON array of memory objects with this format:\n\
    [\n\
        {\n\
            \"title\": \"brief title for the memory\",\n\
            \"content\": \"detailed content to remember\",\n\
            \"importance\": 0.8,\n\
            \"category\": \"preference|personal|goal|opinion|other\"\n\
        }\n\
    ]";

/// Parsed result of the conversation analysis prompt
#[derive(Debug, Deserialize)]
struct ConversationAnalysis {
    #[serde(default)]
    key_topics: Vec<String>,
    #[serde(default = "default_sentiment")]
    sentiment: String,
    #[serde(default)]
    important_info: String,
    #[serde(default)]
    summary: String,
}

fn default_sentiment() -> String {
    "neutral".to_string()
}

/// Parsed memory object from the extraction prompt
#[derive(Debug, Deserialize)]
struct ExtractedMemory {
    #[serde(default = "default_memory_title")]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default = "default_memory_importance")]
    importance: f32,
    #[serde(default = "default_memory_category")]
    category: String,
}

fn default_memory_title() -> String {
    "Extracted memory".to_string()
}

fn default_memory_importance() -> f32 {
    0.7
}

fn default_memory_category() -> String {
    "other".to_string()
}

fn render_transcript(messages: &[Message]) -> String {
    let mut transcript = String::new();
    for message in messages {
        let role = if message.is_from_user { "User" } else { "Assistant" };
        transcript.push_str(&format!("{}: {}\n", role, message.content));
    }
    transcript
}

/// Update a conversation's summary fields from its recent transcript
///
/// Stores significant findings as a long-term memory. Fails soft on
/// provider errors and malformed analysis JSON.
pub async fn update_conversation_summary(
    storage: &Storage,
    config: &MemoryConfig,
    completion: &dyn CompletionService,
    conversation_id: ConversationId,
) -> Result<()> {
    let (user_id, messages) = {
        let owner = storage
            .with_connection(|conn| queries::conversation_owner(conn, conversation_id))?;
        let Some(user_id) = owner else {
            warn!(conversation_id, "Conversation not found for summary update");
            return Ok(());
        };
        let mut messages =
            storage.with_connection(|conn| queries::recent_messages(conn, conversation_id, 10))?;
        messages.reverse();
        (user_id, messages)
    };

    if messages.is_empty() {
        return Ok(());
    }

    let request = vec![
        ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
        ChatMessage::user(render_transcript(&messages)),
    ];
    let options = CompletionOptions {
        temperature: 0.3,
        ..Default::default()
    };

    let raw = match completion.complete(&request, &options).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(conversation_id, error = %e, "Failed to update conversation summary");
            return Ok(());
        }
    };

    let analysis: ConversationAnalysis = match serde_json::from_str(raw.trim()) {
        Ok(analysis) => analysis,
        Err(_) => {
            warn!(conversation_id, "Failed to parse analysis result");
            return Ok(());
        }
    };

    let mut sentiment = HashMap::new();
    sentiment.insert(
        "overall_sentiment".to_string(),
        serde_json::json!(analysis.sentiment),
    );
    sentiment.insert(
        "last_updated".to_string(),
        serde_json::json!(Utc::now().to_rfc3339()),
    );

    let conversation_title = storage.with_connection(|conn| {
        queries::update_conversation_analysis(
            conn,
            conversation_id,
            &analysis.summary,
            &analysis.key_topics,
            &sentiment,
            Utc::now(),
        )?;
        Ok(queries::get_conversation(conn, &user_id, conversation_id)?
            .map(|c| c.title)
            .unwrap_or_default())
    })?;

    // Only store substantial findings, not one-liners
    if analysis.important_info.len() > 20 {
        let manager = MemoryManager::new(storage, config.clone(), &user_id);
        let mut context = HashMap::new();
        context.insert(
            "conversation_id".to_string(),
            serde_json::json!(conversation_id),
        );
        manager.store_long_term_memory(
            &format!("Important info from {}", conversation_title),
            &analysis.important_info,
            Some(context),
            0.8,
        )?;
    }

    Ok(())
}

/// Extract durable memories from a whole conversation transcript
///
/// Returns the number of memories stored; 0 when the provider is degraded
/// or its output cannot be parsed.
pub async fn extract_and_store_conversation_memories(
    storage: &Storage,
    config: &MemoryConfig,
    completion: &dyn CompletionService,
    conversation_id: ConversationId,
) -> Result<usize> {
    let owner =
        storage.with_connection(|conn| queries::conversation_owner(conn, conversation_id))?;
    let Some(user_id) = owner else {
        warn!(conversation_id, "Conversation not found for memory extraction");
        return Ok(0);
    };

    let messages =
        storage.with_connection(|conn| queries::conversation_messages(conn, conversation_id))?;
    if messages.is_empty() {
        return Ok(0);
    }

    let transcript = render_transcript(&messages);
    let request = vec![
        ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
        ChatMessage::user(truncate_chars(&transcript, EXTRACTION_TRANSCRIPT_LIMIT).to_string()),
    ];
    let options = CompletionOptions {
        temperature: 0.3,
        ..Default::default()
    };

    let raw = match completion.complete(&request, &options).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(conversation_id, error = %e, "Failed to extract memories from conversation");
            return Ok(0);
        }
    };

    let extracted: Vec<ExtractedMemory> = match serde_json::from_str(raw.trim()) {
        Ok(extracted) => extracted,
        Err(_) => {
            warn!(conversation_id, "Failed to parse memory extraction result");
            return Ok(0);
        }
    };

    let manager = MemoryManager::new(storage, config.clone(), &user_id);
    let mut stored = 0;
    for memory in extracted {
        let mut context = HashMap::new();
        context.insert(
            "conversation_id".to_string(),
            serde_json::json!(conversation_id),
        );
        context.insert("category".to_string(), serde_json::json!(memory.category));
        context.insert(
            "extracted_at".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );
        manager.store_long_term_memory(
            &memory.title,
            &memory.content,
            Some(context),
            memory.importance,
        )?;
        stored += 1;
    }

    info!(conversation_id, stored, "Stored memories from conversation");
    Ok(stored)
}

/// Score a stored message and attach its importance annotation
///
/// High-importance messages are additionally captured as short-term
/// memories. The annotation is attached exactly once, after creation.
pub fn analyze_message_importance(
    storage: &Storage,
    config: &MemoryConfig,
    message_id: i64,
) -> Result<()> {
    let Some(message) = storage.with_connection(|conn| queries::get_message(conn, message_id))?
    else {
        warn!(message_id, "Message not found for importance analysis");
        return Ok(());
    };

    let owner = storage
        .with_connection(|conn| queries::conversation_owner(conn, message.conversation_id))?;
    let Some(user_id) = owner else {
        warn!(message_id, "Conversation owner missing for importance analysis");
        return Ok(());
    };

    let manager = MemoryManager::new(storage, config.clone(), &user_id);
    let analysis = manager.extract_important_information(&message.content, message.is_from_user);

    storage.with_connection(|conn| {
        queries::set_message_importance(conn, message_id, analysis.importance_score)
    })?;

    if analysis.importance_score > MESSAGE_CAPTURE_THRESHOLD {
        let mut context = HashMap::new();
        context.insert(
            "conversation_id".to_string(),
            serde_json::json!(message.conversation_id),
        );
        context.insert("message_id".to_string(), serde_json::json!(message_id));
        context.insert(
            "is_from_user".to_string(),
            serde_json::json!(message.is_from_user),
        );
        manager.store_short_term_memory(
            &format!("Important message: {}...", truncate_chars(&message.content, 50)),
            &message.content,
            Some(context),
            analysis.importance_score,
        )?;
    }

    Ok(())
}
