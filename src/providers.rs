//! External provider capabilities
//!
//! The LLM and the vector-similarity service are consumed through the
//! trait seams below; concrete HTTP clients live with the callers that own
//! credentials. Both calls are network round trips, so the wrappers here
//! bound them with a timeout and bake in the degraded-mode fallbacks: a
//! fixed apology string for completions, an empty list for similarity
//! search. Callers never see a provider failure.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::Result;
use crate::types::{ChatMessage, RagDocument};

/// Fallback text returned when the completion provider is degraded
pub const FALLBACK_COMPLETION: &str =
    "Sorry, I'm having trouble understanding you. Could you please rephrase your question?";

/// Default bound on provider round trips
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for a completion request
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-16k".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// Chat completion capability
///
/// Implementations fail with `RecallError::Provider` on timeout or non-2xx;
/// the engine only ever calls this through [`complete_or_apology`].
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions)
        -> Result<String>;
}

/// Knowledge-base similarity search capability
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RagDocument>>;
}

/// Call the completion provider, substituting the apology string on failure
///
/// A degraded completion must never crash the enclosing request or leave
/// the caller hanging: errors and timeouts are logged and swallowed here.
pub async fn complete_or_apology(
    service: &dyn CompletionService,
    messages: &[ChatMessage],
    options: &CompletionOptions,
) -> String {
    match tokio::time::timeout(options.timeout, service.complete(messages, options)).await {
        Ok(Ok(text)) => text.trim().to_string(),
        Ok(Err(e)) => {
            error!(error = %e, "Completion provider failed");
            FALLBACK_COMPLETION.to_string()
        }
        Err(_) => {
            error!(timeout_ms = options.timeout.as_millis() as u64, "Completion provider timed out");
            FALLBACK_COMPLETION.to_string()
        }
    }
}

/// Query the similarity search provider, substituting an empty list on failure
pub async fn search_or_empty(
    service: &dyn SimilaritySearch,
    query: &str,
    k: usize,
    timeout: Duration,
) -> Vec<RagDocument> {
    match tokio::time::timeout(timeout, service.search(query, k)).await {
        Ok(Ok(docs)) => docs,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to get similar documents");
            Vec::new()
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Similarity search timed out");
            Vec::new()
        }
    }
}
