//! Database queries for memory, personality, and conversation operations
//!
//! Every time-dependent query takes `now` from the caller so tests can
//! inject a clock; production callers pass `Utc::now()`.

use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::warn;

use crate::error::Result;
use crate::types::*;

/// Escape a user-supplied substring for use in a LIKE pattern
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // Epoch sorts a corrupt record last, never ahead of live ones
            warn!(raw, "Failed to parse stored timestamp");
            DateTime::UNIX_EPOCH
        })
}

/// Parse a memory from a database row
pub fn memory_from_row(row: &Row) -> rusqlite::Result<Memory> {
    let context_str: String = row.get("context")?;
    let context: HashMap<String, serde_json::Value> =
        serde_json::from_str(&context_str).unwrap_or_default();

    let memory_type_str: String = row.get("memory_type")?;
    let last_accessed: String = row.get("last_accessed")?;
    let created_at: String = row.get("created_at")?;
    let expires_at: Option<String> = row.get("expires_at")?;

    Ok(Memory {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        memory_type: memory_type_str.parse().unwrap_or_default(),
        title: row.get("title")?,
        content: row.get("content")?,
        context,
        importance_score: row.get("importance_score")?,
        access_count: row.get("access_count")?,
        last_accessed: parse_timestamp(&last_accessed),
        created_at: parse_timestamp(&created_at),
        expires_at: expires_at.as_deref().map(parse_timestamp),
    })
}

const MEMORY_COLUMNS: &str = "id, user_id, memory_type, title, content, context, \
     importance_score, access_count, last_accessed, created_at, expires_at";

// ============================================================================
// Memory CRUD
// ============================================================================

/// Insert a memory record
///
/// The expiry invariant is enforced here: long_term and semantic memories
/// never get `expires_at`, short_term always does.
#[allow(clippy::too_many_arguments)]
pub fn create_memory(
    conn: &Connection,
    user_id: &str,
    memory_type: MemoryType,
    title: &str,
    content: &str,
    context: &HashMap<String, serde_json::Value>,
    importance: f32,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Memory> {
    let expires_at = if memory_type.expirable() {
        expires_at
    } else {
        None
    };

    let context_json = serde_json::to_string(context)?;
    conn.execute(
        "INSERT INTO memories
             (user_id, memory_type, title, content, context, importance_score,
              access_count, last_accessed, created_at, expires_at)
         VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
        params![
            user_id,
            memory_type.as_str(),
            title,
            content,
            context_json,
            importance,
            now.to_rfc3339(),
            now.to_rfc3339(),
            expires_at.map(|dt| dt.to_rfc3339()),
        ],
    )?;

    let id = conn.last_insert_rowid();
    Ok(Memory {
        id,
        user_id: user_id.to_string(),
        memory_type,
        title: title.to_string(),
        content: content.to_string(),
        context: context.clone(),
        importance_score: importance,
        access_count: 0,
        last_accessed: now,
        created_at: now,
        expires_at,
    })
}

/// Fetch a single memory owned by the given user, without access tracking
pub fn get_memory(conn: &Connection, user_id: &str, id: MemoryId) -> Result<Option<Memory>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ? AND user_id = ?"
    ))?;
    Ok(stmt
        .query_row(params![id, user_id], memory_from_row)
        .optional()?)
}

/// Delete a memory owned by the given user
pub fn delete_memory(conn: &Connection, user_id: &str, id: MemoryId) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM memories WHERE id = ? AND user_id = ?",
        params![id, user_id],
    )?;
    Ok(affected > 0)
}

/// List short-term memories, most recently accessed first
///
/// Short-term reads never bump access counters - these memories are meant
/// to age out regardless of how often they are consulted.
pub fn list_short_term(conn: &Connection, user_id: &str, limit: i64) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {MEMORY_COLUMNS} FROM memories
         WHERE user_id = ? AND memory_type = 'short_term'
         ORDER BY last_accessed DESC
         LIMIT ?"
    ))?;

    let memories = stmt
        .query_map(params![user_id, limit], memory_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(memories)
}

/// List long-term memories, optionally filtered by a substring query
///
/// Ordered by importance, then recency of access. Every returned memory
/// gets `access_count += 1` and a fresh `last_accessed` - an observable
/// side effect of reading that short-term listings deliberately lack.
pub fn list_long_term(
    conn: &Connection,
    user_id: &str,
    query: Option<&str>,
    limit: i64,
    now: DateTime<Utc>,
) -> Result<Vec<Memory>> {
    let mut memories = match query.filter(|q| !q.is_empty()) {
        Some(q) => {
            let pattern = like_pattern(q);
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {MEMORY_COLUMNS} FROM memories
                 WHERE user_id = ? AND memory_type = 'long_term'
                   AND (title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')
                 ORDER BY importance_score DESC, last_accessed DESC
                 LIMIT ?"
            ))?;
            let rows = stmt
                .query_map(params![user_id, pattern, pattern, limit], memory_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {MEMORY_COLUMNS} FROM memories
                 WHERE user_id = ? AND memory_type = 'long_term'
                 ORDER BY importance_score DESC, last_accessed DESC
                 LIMIT ?"
            ))?;
            let rows = stmt
                .query_map(params![user_id, limit], memory_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };

    for memory in &mut memories {
        conn.execute(
            "UPDATE memories SET access_count = access_count + 1, last_accessed = ?
             WHERE id = ?",
            params![now.to_rfc3339(), memory.id],
        )?;
        memory.access_count += 1;
        memory.last_accessed = now;
    }

    Ok(memories)
}

/// Search memories of any type whose title or content contains the topic
///
/// Uses the default record ordering (importance, then recency of access).
pub fn search_memories_by_topic(
    conn: &Connection,
    user_id: &str,
    topic: &str,
    limit: i64,
) -> Result<Vec<Memory>> {
    let pattern = like_pattern(topic);
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {MEMORY_COLUMNS} FROM memories
         WHERE user_id = ?
           AND (title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')
         ORDER BY importance_score DESC, last_accessed DESC
         LIMIT ?"
    ))?;

    let memories = stmt
        .query_map(params![user_id, pattern, pattern, limit], memory_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(memories)
}

/// Promote a short-term memory to long-term in a single atomic update
///
/// Succeeds only when the memory exists, belongs to the user, is still
/// short-term, and clears the importance threshold. The single UPDATE makes
/// concurrent promotions safe: the second caller matches zero rows and
/// observes a no-op failure. `created_at` and `content` are untouched.
pub fn promote_memory(
    conn: &Connection,
    user_id: &str,
    id: MemoryId,
    importance_threshold: f32,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE memories
         SET memory_type = 'long_term', expires_at = NULL
         WHERE id = ? AND user_id = ? AND memory_type = 'short_term'
           AND importance_score >= ?",
        params![id, user_id, importance_threshold],
    )?;
    Ok(affected > 0)
}

/// Run both cleanup passes for a user's short-term memories
///
/// Pass 1 deletes expired records, pass 2 keeps only the top `limit`
/// ranked by importance then recency of access. Both passes are idempotent.
pub fn cleanup_short_term(
    conn: &Connection,
    user_id: &str,
    limit: i64,
    now: DateTime<Utc>,
) -> Result<CleanupStats> {
    let expired = conn.execute(
        "DELETE FROM memories
         WHERE user_id = ? AND memory_type = 'short_term'
           AND expires_at IS NOT NULL AND expires_at < ?",
        params![user_id, now.to_rfc3339()],
    )?;

    let evicted = conn.execute(
        "DELETE FROM memories
         WHERE id IN (
             SELECT id FROM memories
             WHERE user_id = ? AND memory_type = 'short_term'
             ORDER BY importance_score DESC, last_accessed DESC
             LIMIT -1 OFFSET ?
         )",
        params![user_id, limit],
    )?;

    Ok(CleanupStats {
        expired: expired as i64,
        evicted: evicted as i64,
    })
}

/// Distinct users owning at least one memory
pub fn users_with_memories(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT DISTINCT user_id FROM memories ORDER BY user_id")?;
    let users = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

/// Short-term memory ids eligible for promotion by the maintenance sweep
///
/// Eligibility is re-validated by `promote_memory`; a score that dropped
/// between selection and promotion resolves to a skip, not an error.
pub fn promotable_short_term(
    conn: &Connection,
    user_id: &str,
    importance_threshold: f32,
    created_before: DateTime<Utc>,
) -> Result<Vec<MemoryId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM memories
         WHERE user_id = ? AND memory_type = 'short_term'
           AND importance_score >= ? AND created_at < ?",
    )?;
    let ids = stmt
        .query_map(
            params![user_id, importance_threshold, created_before.to_rfc3339()],
            |row| row.get(0),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Count memories per type for a user
pub fn count_memories_by_type(conn: &Connection, user_id: &str) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT memory_type, COUNT(*) FROM memories WHERE user_id = ? GROUP BY memory_type",
    )?;
    let counts = stmt
        .query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(counts)
}

// ============================================================================
// Personality profiles
// ============================================================================

fn personality_from_row(row: &Row) -> rusqlite::Result<PersonalityProfile> {
    let interests: String = row.get("interests")?;
    let preferences: String = row.get("preferences")?;
    let patterns: String = row.get("conversation_patterns")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(PersonalityProfile {
        user_id: row.get("user_id")?,
        communication_style: row.get("communication_style")?,
        interests: serde_json::from_str(&interests).unwrap_or_default(),
        preferences: serde_json::from_str(&preferences).unwrap_or_default(),
        conversation_patterns: serde_json::from_str(&patterns).unwrap_or_default(),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

/// Fetch a personality profile, creating it with defaults on first access
pub fn get_or_create_personality(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<PersonalityProfile> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_id, communication_style, interests, preferences,
                conversation_patterns, created_at, updated_at
         FROM personalities WHERE user_id = ?",
    )?;
    if let Some(profile) = stmt
        .query_row(params![user_id], personality_from_row)
        .optional()?
    {
        return Ok(profile);
    }

    let profile = PersonalityProfile::defaults(user_id, now);
    conn.execute(
        "INSERT INTO personalities
             (user_id, communication_style, interests, preferences,
              conversation_patterns, created_at, updated_at)
         VALUES (?, ?, '[]', '{}', '{}', ?, ?)",
        params![
            user_id,
            profile.communication_style,
            now.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )?;
    Ok(profile)
}

/// Apply a partial personality update, creating the profile if missing
pub fn update_personality(
    conn: &Connection,
    user_id: &str,
    update: &PersonalityUpdate,
    now: DateTime<Utc>,
) -> Result<PersonalityProfile> {
    let mut profile = get_or_create_personality(conn, user_id, now)?;

    if let Some(style) = &update.communication_style {
        profile.communication_style = style.clone();
    }
    if let Some(interests) = &update.interests {
        profile.interests = interests.clone();
    }
    if let Some(preferences) = &update.preferences {
        profile.preferences = preferences.clone();
    }
    if let Some(patterns) = &update.conversation_patterns {
        profile.conversation_patterns = patterns.clone();
    }
    profile.updated_at = now;

    conn.execute(
        "UPDATE personalities
         SET communication_style = ?, interests = ?, preferences = ?,
             conversation_patterns = ?, updated_at = ?
         WHERE user_id = ?",
        params![
            profile.communication_style,
            serde_json::to_string(&profile.interests)?,
            serde_json::to_string(&profile.preferences)?,
            serde_json::to_string(&profile.conversation_patterns)?,
            now.to_rfc3339(),
            user_id,
        ],
    )?;

    Ok(profile)
}

// ============================================================================
// Conversations and messages
// ============================================================================

fn conversation_from_row(row: &Row) -> rusqlite::Result<Conversation> {
    let key_topics: String = row.get("key_topics")?;
    let sentiment: String = row.get("sentiment_analysis")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Conversation {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        favourite: row.get::<_, i64>("favourite")? != 0,
        archived: row.get::<_, i64>("archived")? != 0,
        conversation_summary: row.get("conversation_summary")?,
        key_topics: serde_json::from_str(&key_topics).unwrap_or_default(),
        sentiment_analysis: serde_json::from_str(&sentiment).unwrap_or_default(),
    })
}

/// Generate a random conversation id in [10^10, 10^11)
fn generate_conversation_id() -> ConversationId {
    rand::thread_rng().gen_range(10_000_000_000..100_000_000_000)
}

/// Create a conversation with a random id
pub fn create_conversation(
    conn: &Connection,
    user_id: &str,
    title: &str,
    now: DateTime<Utc>,
) -> Result<Conversation> {
    let id = generate_conversation_id();
    conn.execute(
        "INSERT INTO conversations (id, user_id, title, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)",
        params![id, user_id, title, now.to_rfc3339(), now.to_rfc3339()],
    )?;

    Ok(Conversation {
        id,
        user_id: user_id.to_string(),
        title: title.to_string(),
        created_at: now,
        updated_at: now,
        favourite: false,
        archived: false,
        conversation_summary: String::new(),
        key_topics: Vec::new(),
        sentiment_analysis: HashMap::new(),
    })
}

/// Fetch a conversation owned by the given user
pub fn get_conversation(
    conn: &Connection,
    user_id: &str,
    id: ConversationId,
) -> Result<Option<Conversation>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, user_id, title, created_at, updated_at, favourite, archived,
                conversation_summary, key_topics, sentiment_analysis
         FROM conversations WHERE id = ? AND user_id = ?",
    )?;
    Ok(stmt
        .query_row(params![id, user_id], conversation_from_row)
        .optional()?)
}

/// Write back derived analysis fields on a conversation
pub fn update_conversation_analysis(
    conn: &Connection,
    id: ConversationId,
    summary: &str,
    key_topics: &[String],
    sentiment: &HashMap<String, serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE conversations
         SET conversation_summary = ?, key_topics = ?, sentiment_analysis = ?,
             updated_at = ?
         WHERE id = ?",
        params![
            summary,
            serde_json::to_string(key_topics)?,
            serde_json::to_string(sentiment)?,
            now.to_rfc3339(),
            id,
        ],
    )?;
    Ok(())
}

/// Owner of a conversation, if it exists
pub fn conversation_owner(conn: &Connection, id: ConversationId) -> Result<Option<String>> {
    let mut stmt = conn.prepare_cached("SELECT user_id FROM conversations WHERE id = ?")?;
    Ok(stmt
        .query_row(params![id], |row| row.get(0))
        .optional()?)
}

/// Conversations of a user updated since the given time
pub fn active_conversations(
    conn: &Connection,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<ConversationId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM conversations WHERE user_id = ? AND updated_at >= ?",
    )?;
    let ids = stmt
        .query_map(params![user_id, since.to_rfc3339()], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    let emotions: String = row.get("emotions")?;
    let entities: String = row.get("entities")?;
    let created_at: String = row.get("created_at")?;

    Ok(Message {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        content: row.get("content")?,
        is_from_user: row.get::<_, i64>("is_from_user")? != 0,
        created_at: parse_timestamp(&created_at),
        importance_score: row.get("importance_score")?,
        emotions: serde_json::from_str(&emotions).unwrap_or_default(),
        entities: serde_json::from_str(&entities).unwrap_or_default(),
        intent: row.get("intent")?,
    })
}

/// Append a message to a conversation, touching its updated_at
pub fn append_message(
    conn: &Connection,
    conversation_id: ConversationId,
    content: &str,
    is_from_user: bool,
    now: DateTime<Utc>,
) -> Result<Message> {
    conn.execute(
        "INSERT INTO messages (conversation_id, content, is_from_user, created_at)
         VALUES (?, ?, ?, ?)",
        params![conversation_id, content, is_from_user, now.to_rfc3339()],
    )?;
    let id = conn.last_insert_rowid();

    conn.execute(
        "UPDATE conversations SET updated_at = ? WHERE id = ?",
        params![now.to_rfc3339(), conversation_id],
    )?;

    Ok(Message {
        id,
        conversation_id,
        content: content.to_string(),
        is_from_user,
        created_at: now,
        importance_score: 0.0,
        emotions: HashMap::new(),
        entities: Vec::new(),
        intent: String::new(),
    })
}

/// Fetch a single message
pub fn get_message(conn: &Connection, id: i64) -> Result<Option<Message>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, conversation_id, content, is_from_user, created_at,
                importance_score, emotions, entities, intent
         FROM messages WHERE id = ?",
    )?;
    Ok(stmt.query_row(params![id], message_from_row).optional()?)
}

/// Attach the importance annotation to a message (mutated exactly once)
pub fn set_message_importance(conn: &Connection, id: i64, importance: f32) -> Result<()> {
    conn.execute(
        "UPDATE messages SET importance_score = ? WHERE id = ?",
        params![importance, id],
    )?;
    Ok(())
}

/// Most recent messages of a conversation, newest first
pub fn recent_messages(
    conn: &Connection,
    conversation_id: ConversationId,
    limit: i64,
) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, conversation_id, content, is_from_user, created_at,
                importance_score, emotions, entities, intent
         FROM messages WHERE conversation_id = ?
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )?;
    let messages = stmt
        .query_map(params![conversation_id, limit], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

/// All messages of a conversation, oldest first
pub fn conversation_messages(
    conn: &Connection,
    conversation_id: ConversationId,
) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, conversation_id, content, is_from_user, created_at,
                importance_score, emotions, entities, intent
         FROM messages WHERE conversation_id = ?
         ORDER BY created_at ASC, id ASC",
    )?;
    let messages = stmt
        .query_map(params![conversation_id], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

// ============================================================================
// Conversation contexts
// ============================================================================

fn context_from_row(row: &Row) -> rusqlite::Result<ConversationContext> {
    let flow: String = row.get("conversation_flow")?;
    let active: String = row.get("active_memories")?;
    let variables: String = row.get("context_variables")?;

    Ok(ConversationContext {
        conversation_id: row.get("conversation_id")?,
        current_topic: row.get("current_topic")?,
        user_mood: row.get("user_mood")?,
        conversation_flow: serde_json::from_str(&flow).unwrap_or_default(),
        active_memories: serde_json::from_str(&active).unwrap_or_default(),
        context_variables: serde_json::from_str(&variables).unwrap_or_default(),
    })
}

/// Fetch a conversation context, creating it with defaults on demand
pub fn get_or_create_context(
    conn: &Connection,
    conversation_id: ConversationId,
) -> Result<ConversationContext> {
    let mut stmt = conn.prepare_cached(
        "SELECT conversation_id, current_topic, user_mood, conversation_flow,
                active_memories, context_variables
         FROM conversation_contexts WHERE conversation_id = ?",
    )?;
    if let Some(context) = stmt
        .query_row(params![conversation_id], context_from_row)
        .optional()?
    {
        return Ok(context);
    }

    conn.execute(
        "INSERT INTO conversation_contexts (conversation_id) VALUES (?)",
        params![conversation_id],
    )?;
    Ok(ConversationContext::defaults(conversation_id))
}

/// Apply a partial context update, creating the context row if missing
pub fn update_context(
    conn: &Connection,
    conversation_id: ConversationId,
    update: &ContextUpdate,
) -> Result<ConversationContext> {
    let mut context = get_or_create_context(conn, conversation_id)?;

    if let Some(topic) = &update.current_topic {
        context.current_topic = topic.clone();
    }
    if let Some(mood) = &update.user_mood {
        context.user_mood = mood.clone();
    }
    if let Some(flow) = &update.conversation_flow {
        context.conversation_flow = flow.clone();
    }
    if let Some(active) = &update.active_memories {
        context.active_memories = active.clone();
    }
    if let Some(variables) = &update.context_variables {
        context.context_variables = variables.clone();
    }

    conn.execute(
        "UPDATE conversation_contexts
         SET current_topic = ?, user_mood = ?, conversation_flow = ?,
             active_memories = ?, context_variables = ?
         WHERE conversation_id = ?",
        params![
            context.current_topic,
            context.user_mood,
            serde_json::to_string(&context.conversation_flow)?,
            serde_json::to_string(&context.active_memories)?,
            serde_json::to_string(&context.context_variables)?,
            conversation_id,
        ],
    )?;

    Ok(context)
}
