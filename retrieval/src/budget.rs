//! Token budgeting for retrieved context.
//!
//! Token counts are estimated from character counts. Packing is greedy in
//! rank order and stops at the first result that would overflow the
//! budget, even when a later, smaller result would still fit.

use serde::{Deserialize, Serialize};

use crate::config::{
    AVG_TOKENS_PER_CHAR, CONTEXT_OVERHEAD_TOKENS, CONTEXT_SAFETY_MARGIN, MAX_CONTEXT_TOKENS,
};
use crate::document::SearchHit;

/// Estimates how many model tokens a piece of text will cost.
pub trait TokenEstimator: Send + Sync {
    /// Estimated token count of `text`.
    fn estimate(&self, text: &str) -> usize;
}

/// Estimates tokens as `ceil(chars * tokens_per_char)`.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    tokens_per_char: f64,
}

impl CharRatioEstimator {
    /// Create an estimator with the given ratio.
    pub fn new(tokens_per_char: f64) -> Self {
        Self { tokens_per_char }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(AVG_TOKENS_PER_CHAR)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count() as f64;
        (chars * self.tokens_per_char).ceil() as usize
    }
}

/// Token budget for assembled context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBudget {
    /// Total tokens available to retrieved context.
    pub max_context_tokens: usize,

    /// Tokens reserved for the prompt framing around the context.
    pub overhead_tokens: usize,

    /// Fraction of `max_context_tokens` held back for estimation error.
    pub safety_margin: f64,

    /// Ratio used by the default character-based estimator.
    pub tokens_per_char: f64,
}

impl ContextBudget {
    /// Tokens left for context after overhead and the safety margin.
    pub fn effective_tokens(&self) -> usize {
        let margin = (self.max_context_tokens as f64 * self.safety_margin).ceil() as usize;
        self.max_context_tokens
            .saturating_sub(self.overhead_tokens)
            .saturating_sub(margin)
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_context_tokens: MAX_CONTEXT_TOKENS,
            overhead_tokens: CONTEXT_OVERHEAD_TOKENS,
            safety_margin: CONTEXT_SAFETY_MARGIN,
            tokens_per_char: AVG_TOKENS_PER_CHAR,
        }
    }
}

/// Outcome of packing ranked hits into a budget.
#[derive(Debug, Clone)]
pub struct Packed {
    /// Accepted hits, in rank order.
    pub selected: Vec<SearchHit>,

    /// Estimated tokens of the accepted hits.
    pub total_tokens: usize,
}

/// Accept hits in rank order while the running total stays within
/// `budget_tokens`. Stops at the first hit that would overflow.
pub fn pack(hits: &[SearchHit], budget_tokens: usize, estimator: &dyn TokenEstimator) -> Packed {
    let mut selected = Vec::new();
    let mut total_tokens: usize = 0;

    for hit in hits {
        let tokens = estimator.estimate(&hit.document.text);
        match total_tokens.checked_add(tokens) {
            Some(total) if total <= budget_tokens => total_tokens = total,
            _ => break,
        }
        selected.push(hit.clone());
    }

    Packed {
        selected,
        total_tokens,
    }
}

/// Condense the top hits into a short summary: the text of up to
/// `max_results` hits joined by spaces, cut to `max_chars` characters and
/// followed by an ellipsis.
pub fn summarize(hits: &[SearchHit], max_results: usize, max_chars: usize) -> String {
    let joined = hits
        .iter()
        .take(max_results)
        .map(|hit| hit.document.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let mut summary: String = joined.chars().take(max_chars).collect();
    summary.push_str("...");
    summary
}
