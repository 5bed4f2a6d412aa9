//! Fits a message history into a model's context window.

pub mod strategy;
pub mod tokenizer;

pub use strategy::{ContextStrategy, DEFAULT_PRESERVE_RECENT};
pub use tokenizer::{HeuristicTokenCounter, TokenCounter};

use std::sync::Arc;

use crate::message::Message;

/// The outcome of [`ContextManager::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextFit {
    pub tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOverflow {
    pub tokens: usize,
    pub limit: usize,
}

/// Estimates tokens and truncates message histories to a budget.
pub struct ContextManager {
    counter: Arc<dyn TokenCounter>,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(Arc::new(HeuristicTokenCounter))
    }
}

impl ContextManager {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    pub fn estimate_tokens(&self, messages: &[Message]) -> usize {
        self.counter.count_messages(messages)
    }

    /// Returns the subsequence of `messages` fitting within
    /// `max_tokens`, per `strategy`. The result is always a genuine
    /// subsequence — same relative order, no reordering, no insertion.
    pub fn fit(
        &self,
        messages: &[Message],
        strategy: ContextStrategy,
        preserve_recent: usize,
        max_tokens: usize,
    ) -> Vec<Message> {
        let counter = Arc::clone(&self.counter);
        strategy::truncate(messages, strategy, preserve_recent, max_tokens, move |m| {
            counter.count_messages(m)
        })
    }

    /// Checks whether `messages` already fits `max_tokens` without
    /// truncating — used after [`ContextManager::fit`] to report
    /// `context_too_large` if truncation still didn't make it fit (e.g. a
    /// single system message alone exceeds budget).
    pub fn validate(
        &self,
        messages: &[Message],
        max_tokens: usize,
    ) -> Result<ContextFit, ContextOverflow> {
        let tokens = self.estimate_tokens(messages);
        if tokens <= max_tokens {
            Ok(ContextFit { tokens })
        } else {
            Err(ContextOverflow {
                tokens,
                limit: max_tokens,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn validate_reports_overflow_when_still_too_large_after_fit() {
        let manager = ContextManager::default();
        let messages: Vec<Message> = (0..5)
            .map(|i| Message::user(format!("this is message number {i} with some padding text")))
            .collect();
        let fitted = manager.fit(&messages, ContextStrategy::SlidingWindow, 1, 5);
        assert!(manager.validate(&fitted, 5).is_err());
    }

    #[test]
    fn validate_ok_when_within_budget() {
        let manager = ContextManager::default();
        let messages = vec![Message::user("hi")];
        assert!(manager.validate(&messages, 1000).is_ok());
    }
}
