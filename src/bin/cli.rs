//! Recall CLI
//!
//! Command-line interface for inspecting and maintaining per-user memory.

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recall::config::MemoryConfig;
use recall::error::Result;
use recall::maintenance::run_maintenance;
use recall::memory::MemoryManager;
use recall::storage::queries;
use recall::storage::Storage;
use recall::types::PersonalityUpdate;

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Per-user conversational memory CLI")]
#[command(version)]
struct Cli {
    /// Database path
    #[arg(
        long,
        env = "RECALL_DB_PATH",
        default_value = "~/.local/share/recall/memories.db"
    )]
    db_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a memory for a user
    Remember {
        /// User the memory belongs to
        user: String,
        /// Content to remember
        content: String,
        /// Short title (defaults to the first words of the content)
        #[arg(short, long)]
        title: Option<String>,
        /// Store directly as long-term memory
        #[arg(short, long)]
        long_term: bool,
        /// Importance (0-1); scored from the content when omitted
        #[arg(short, long)]
        importance: Option<f32>,
    },
    /// List a user's memories
    Memories {
        /// User to list memories for
        user: String,
        /// Show long-term instead of short-term memories
        #[arg(short, long)]
        long_term: bool,
        /// Filter long-term memories by query
        #[arg(short, long)]
        query: Option<String>,
        /// Maximum number to return
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Promote a short-term memory to long-term storage
    Promote {
        /// User the memory belongs to
        user: String,
        /// Memory ID
        id: i64,
    },
    /// Delete a memory
    Forget {
        /// User the memory belongs to
        user: String,
        /// Memory ID
        id: i64,
    },
    /// Show a user's personality profile
    Personality {
        /// User to inspect
        user: String,
        /// Set the communication style
        #[arg(short, long)]
        style: Option<String>,
    },
    /// Run the maintenance sweep across all users
    Maintain,
    /// Show memory statistics
    Stats {
        /// Restrict to one user
        #[arg(short, long)]
        user: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Expand ~ in path
    let db_path = shellexpand::tilde(&cli.db_path).to_string();

    let storage = Storage::open(db_path)?;
    let config = MemoryConfig::default();

    match cli.command {
        Commands::Remember {
            user,
            content,
            title,
            long_term,
            importance,
        } => {
            let manager = MemoryManager::new(&storage, config, &user);
            let importance = importance.unwrap_or_else(|| {
                manager
                    .extract_important_information(&content, true)
                    .importance_score
            });
            let title = title.unwrap_or_else(|| {
                content.chars().take(50).collect::<String>()
            });

            let memory = if long_term {
                manager.store_long_term_memory(&title, &content, None, importance)?
            } else {
                manager.store_short_term_memory(&title, &content, None, importance)?
            };
            println!(
                "Stored {} memory #{} (importance {:.2})",
                memory.memory_type.as_str(),
                memory.id,
                memory.importance_score
            );
        }

        Commands::Memories {
            user,
            long_term,
            query,
            limit,
        } => {
            let manager = MemoryManager::new(&storage, config, &user);
            let memories = if long_term {
                manager.get_long_term_memory(query.as_deref(), limit)?
            } else {
                manager.get_short_term_memory(Some(limit))?
            };

            for memory in memories {
                println!(
                    "#{} [{}] ({:.2}) {} - {}",
                    memory.id,
                    memory.memory_type.as_str(),
                    memory.importance_score,
                    memory.title,
                    truncate(&memory.content, 60)
                );
            }
        }

        Commands::Promote { user, id } => {
            let manager = MemoryManager::new(&storage, config, &user);
            if manager.promote_to_long_term(id)? {
                println!("Promoted memory #{} to long-term storage", id);
            } else {
                println!("Memory #{} was not eligible for promotion", id);
            }
        }

        Commands::Forget { user, id } => {
            let deleted =
                storage.with_transaction(|conn| queries::delete_memory(conn, &user, id))?;
            if deleted {
                println!("Deleted memory #{}", id);
            } else {
                println!("Memory #{} not found", id);
            }
        }

        Commands::Personality { user, style } => {
            let manager = MemoryManager::new(&storage, config, &user);
            let profile = if let Some(style) = style {
                manager.update_user_personality(&PersonalityUpdate {
                    communication_style: Some(style),
                    ..Default::default()
                })?
            } else {
                manager.get_user_personality()?
            };
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }

        Commands::Maintain => {
            let report = run_maintenance(&storage, &config, Utc::now())?;
            println!("Users processed:    {}", report.users_processed);
            println!("Memories promoted:  {}", report.memories_promoted);
            println!("Memories cleaned:   {}", report.memories_cleaned);
            println!("Contexts refreshed: {}", report.contexts_refreshed);
        }

        Commands::Stats { user } => {
            let users = match user {
                Some(user) => vec![user],
                None => storage.with_connection(queries::users_with_memories)?,
            };

            for user_id in users {
                let counts = storage
                    .with_connection(|conn| queries::count_memories_by_type(conn, &user_id))?;
                let mut counts: Vec<_> = counts.into_iter().collect();
                counts.sort();
                let summary: Vec<String> = counts
                    .iter()
                    .map(|(kind, count)| format!("{}: {}", kind, count))
                    .collect();
                println!("{} - {}", user_id, summary.join(", "));
            }
            println!("Database: {} ({} bytes)", storage.db_path(), storage.db_size()?);
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or(s);
    if first_line.chars().count() <= max {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
