//! Importance scoring
//!
//! Pure, deterministic message analysis: keyword-driven importance plus
//! personal-info / question / request flags. No side effects, no failure
//! modes. More sophisticated NLP can replace this behind the same contract.

use serde::{Deserialize, Serialize};

/// Substrings that flag personal information
const PERSONAL_INFO_MARKERS: &[&str] = &["my", "i am", "i like", "i prefer"];

/// Substrings that flag a request
const REQUEST_MARKERS: &[&str] = &["please", "can you", "could you", "would you"];

/// Result of analyzing one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAnalysis {
    /// Importance score in [0, 1]
    pub importance_score: f32,
    pub contains_personal_info: bool,
    pub is_question: bool,
    pub is_request: bool,
}

/// Analyze a message for memory storage
///
/// Scoring: +0.1 for each keyword found in the text (one hit per keyword
/// regardless of repeats), +0.2 when the message came from the user, final
/// score clamped to [0, 1]. All matching is case-insensitive substring
/// containment, so "army" does contain "my" - the contract is literal.
pub fn analyze_message(text: &str, is_from_user: bool, keywords: &[String]) -> MessageAnalysis {
    let text_lower = text.to_lowercase();

    let mut importance_score = 0.0f32;
    for keyword in keywords {
        if text_lower.contains(&keyword.to_lowercase()) {
            importance_score += 0.1;
        }
    }

    // User messages about preferences are generally more important
    if is_from_user {
        importance_score += 0.2;
    }

    importance_score = importance_score.clamp(0.0, 1.0);

    MessageAnalysis {
        importance_score,
        contains_personal_info: PERSONAL_INFO_MARKERS
            .iter()
            .any(|marker| text_lower.contains(marker)),
        is_question: text.trim().ends_with('?'),
        is_request: REQUEST_MARKERS
            .iter()
            .any(|marker| text_lower.contains(marker)),
    }
}
