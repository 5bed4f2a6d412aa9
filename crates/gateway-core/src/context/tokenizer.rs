//! Token estimation: heuristic by default, pluggable per provider.

use crate::message::Message;

/// Estimates token counts for messages. The heuristic default never needs a
/// provider-specific tokenizer table; an adapter that has one can inject it
/// here without changing any caller of [`crate::context::ContextManager`].
pub trait TokenCounter: Send + Sync {
    fn count_message(&self, message: &Message) -> usize;

    fn count_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count_message(m)).sum()
    }
}

/// `chars / 4`, nudged up for messages dense in punctuation (a rough proxy
/// for the extra tokens punctuation-heavy text tends to split into).
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count_message(&self, message: &Message) -> usize {
        let text = message.text_content();
        if text.is_empty() {
            return 1;
        }
        let base = text.len() / 4;
        let punctuation = text
            .chars()
            .filter(|c| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
            .count();
        (base + punctuation / 2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn empty_message_counts_as_one_token() {
        let counter = HeuristicTokenCounter;
        let msg = Message::text(Role::User, "");
        assert_eq!(counter.count_message(&msg), 1);
    }

    #[test]
    fn punctuation_heavy_text_counts_more_than_base_chars_over_four() {
        let counter = HeuristicTokenCounter;
        let plain = Message::user("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let punctuated = Message::user("a.a,a!a?a;a:a.a,a!a?a;a:a.a,a!a?a;a:a.a,a!a?a;a:a.a,a!a?a;a:a.a,a!a?a;a:a.a,a!a");
        assert!(counter.count_message(&punctuated) >= counter.count_message(&plain));
    }
}
