//! Database migrations for Recall

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Run all migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < SCHEMA_VERSION {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Initial schema (v1)
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Per-user memory records
        CREATE TABLE IF NOT EXISTS memories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            memory_type TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            context TEXT NOT NULL DEFAULT '{}',
            importance_score REAL NOT NULL DEFAULT 0.0,
            access_count INTEGER NOT NULL DEFAULT 0,
            last_accessed TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_memories_user_type
            ON memories(user_id, memory_type);
        CREATE INDEX IF NOT EXISTS idx_memories_importance
            ON memories(importance_score);
        CREATE INDEX IF NOT EXISTS idx_memories_last_accessed
            ON memories(last_accessed);

        -- Personality profiles, one per user
        CREATE TABLE IF NOT EXISTS personalities (
            user_id TEXT PRIMARY KEY,
            communication_style TEXT NOT NULL DEFAULT 'casual',
            interests TEXT NOT NULL DEFAULT '[]',
            preferences TEXT NOT NULL DEFAULT '{}',
            conversation_patterns TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Conversations with derived summary fields
        CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT 'Empty',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            favourite INTEGER NOT NULL DEFAULT 0,
            archived INTEGER NOT NULL DEFAULT 0,
            conversation_summary TEXT NOT NULL DEFAULT '',
            key_topics TEXT NOT NULL DEFAULT '[]',
            sentiment_analysis TEXT NOT NULL DEFAULT '{}'
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user_updated
            ON conversations(user_id, updated_at);

        -- Messages within conversations
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            is_from_user INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            importance_score REAL NOT NULL DEFAULT 0.0,
            emotions TEXT NOT NULL DEFAULT '{}',
            entities TEXT NOT NULL DEFAULT '[]',
            intent TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
            ON messages(conversation_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_importance
            ON messages(importance_score);

        -- Dynamic conversation context, one row per conversation
        CREATE TABLE IF NOT EXISTS conversation_contexts (
            conversation_id INTEGER PRIMARY KEY,
            current_topic TEXT NOT NULL DEFAULT '',
            user_mood TEXT NOT NULL DEFAULT 'neutral',
            conversation_flow TEXT NOT NULL DEFAULT '[]',
            active_memories TEXT NOT NULL DEFAULT '[]',
            context_variables TEXT NOT NULL DEFAULT '{}',
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        INSERT INTO schema_version (version) VALUES (1);
        "#,
    )?;

    Ok(())
}
