//! Retrieved context and prompt assembly.

use serde::{Deserialize, Serialize};

use crate::document::{Role, SearchHit};

/// A conversation turn selected as context for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantMessage {
    /// Turn content.
    pub text: String,

    /// Who produced the turn.
    pub role: Role,

    /// Similarity to the query.
    pub score: f32,

    /// Id of the originating chat message.
    pub message_id: String,
}

impl From<&SearchHit> for RelevantMessage {
    fn from(hit: &SearchHit) -> Self {
        Self {
            text: hit.document.text.clone(),
            role: hit.document.role,
            score: hit.score,
            message_id: hit.document.source_message_id.clone(),
        }
    }
}

/// Context assembled for a query.
///
/// Either `relevant_messages` holds the turns that fit the token budget, or,
/// when matches existed but none fit, `summary` condenses the top matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Selected turns in rank order.
    pub relevant_messages: Vec<RelevantMessage>,

    /// Fallback summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Estimated token cost of the context.
    pub total_tokens: usize,
}

impl RetrievedContext {
    /// Whether there is nothing to add to a prompt.
    pub fn is_empty(&self) -> bool {
        self.relevant_messages.is_empty() && self.summary.is_none()
    }

    /// Prefix `question` with the retrieved context. Returns the question
    /// unchanged when there is no context.
    pub fn augment_prompt(&self, question: &str) -> String {
        if self.is_empty() {
            return question.to_string();
        }

        let mut parts = Vec::new();
        if let Some(summary) = &self.summary {
            parts.push(format!("Previous context: {summary}"));
        }
        if !self.relevant_messages.is_empty() {
            let lines: Vec<String> = self
                .relevant_messages
                .iter()
                .map(|m| format!("[Previous context] {}", m.text))
                .collect();
            parts.push(lines.join("\n"));
        }

        format!(
            "Previous conversation context:\n{}\n\nCurrent question: {question}",
            parts.join("\n\n")
        )
    }
}
