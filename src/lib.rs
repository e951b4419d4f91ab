//! Recall - Per-User Conversational Memory Engine
//!
//! Decides what a chat backend remembers about each user, how long it is
//! kept, how relevant fragments are retrieved for a new message, and how
//! they are blended with knowledge-base retrieval into a single prompt
//! context.

pub mod config;
pub mod context;
pub mod error;
pub mod extraction;
pub mod maintenance;
pub mod memory;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod scoring;
pub mod storage;
pub mod types;

pub use config::MemoryConfig;
pub use context::{AiCallContext, ContextManager};
pub use error::{RecallError, Result};
pub use memory::MemoryManager;
pub use storage::Storage;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
