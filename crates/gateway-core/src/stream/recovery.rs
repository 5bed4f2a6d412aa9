//! Stream recovery: what a coordinator records so a dropped stream can be
//! resumed as a fresh request instead of losing partial output.

use chrono::{DateTime, Utc};

use crate::message::Message;
use crate::options::RecoveryStrategy;

/// What's needed to resume a stream that failed partway through.
#[derive(Debug, Clone)]
pub struct RecoveryRecord {
    pub recovery_id: String,
    pub provider: String,
    pub messages: Vec<Message>,
    pub partial_content: String,
    pub created_at: DateTime<Utc>,
}

impl RecoveryRecord {
    pub fn new(recovery_id: impl Into<String>, provider: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            recovery_id: recovery_id.into(),
            provider: provider.into(),
            messages,
            partial_content: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn append(&mut self, text: &str) {
        self.partial_content.push_str(text);
    }
}

/// The point in `text` where the last complete paragraph ends, i.e. the
/// start of the final `\n\n`-delimited run. `None` if `text` contains no
/// paragraph break, meaning it is itself one incomplete paragraph.
fn last_paragraph_boundary(text: &str) -> Option<usize> {
    text.rfind("\n\n")
}

/// Builds the message list a resumed request should send, per strategy.
///
/// - `Exact`: appends the partial assistant output verbatim and asks the
///   provider to continue from that exact suffix, token for token — the
///   resumed stream's content concatenates with the partial to form one
///   coherent reply.
/// - `Paragraph`: trims the partial output back to its last complete
///   paragraph (dropping whatever incomplete paragraph was cut off mid-way)
///   and asks the provider to continue from that boundary. Falls back to
///   re-sending the original messages unchanged when the partial output
///   never completed a paragraph — there's no boundary to anchor on, so
///   regenerating from scratch is safer than continuing from a token-level
///   cut.
/// - `Summarize`: like `Exact`, but the partial output is framed as a
///   summary rather than verbatim continuation — useful when the partial
///   content is long enough that re-sending it verbatim would itself risk
///   the context window, leaving the actual summarization to the caller's
///   own preprocessing before invoking this (this function only shapes the
///   message, it never calls out to summarize).
pub fn resume_stream(record: &RecoveryRecord, strategy: RecoveryStrategy) -> Vec<Message> {
    let mut messages = record.messages.clone();
    if record.partial_content.is_empty() {
        return messages;
    }
    match strategy {
        RecoveryStrategy::Exact => {
            messages.push(Message::assistant(record.partial_content.clone()));
            messages.push(Message::user(
                "Continue your previous response starting from exactly where it was cut off. \
                 Do not repeat any of the text above.",
            ));
            messages
        }
        RecoveryStrategy::Paragraph => match last_paragraph_boundary(&record.partial_content) {
            Some(boundary) => {
                messages.push(Message::assistant(record.partial_content[..boundary].to_string()));
                messages.push(Message::user("Continue from the end of the last paragraph above."));
                messages
            }
            None => messages,
        },
        RecoveryStrategy::Summarize => {
            messages.push(Message::user(format!(
                "Your previous response was cut off. Here is what you had generated so far:\n\n{}\n\nContinue from there.",
                record.partial_content
            )));
            messages
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecoveryRecord {
        let mut record = RecoveryRecord::new("r1", "openai", vec![Message::user("tell me a story")]);
        record.append("Once upon a time");
        record
    }

    fn sample_multi_paragraph() -> RecoveryRecord {
        let mut record = RecoveryRecord::new("r1", "openai", vec![Message::user("tell me a story")]);
        record.append("Once upon a time, there was a dragon.\n\nThen one day the dragon fle");
        record
    }

    #[test]
    fn exact_strategy_appends_partial_verbatim_and_continuation_prompt() {
        let record = sample();
        let resumed = resume_stream(&record, RecoveryStrategy::Exact);
        assert_eq!(resumed.len(), 3);
        assert_eq!(resumed[1].text_content(), "Once upon a time");
    }

    #[test]
    fn paragraph_strategy_trims_to_last_complete_paragraph() {
        let record = sample_multi_paragraph();
        let resumed = resume_stream(&record, RecoveryStrategy::Paragraph);
        assert_eq!(resumed.len(), 3);
        assert_eq!(resumed[1].text_content(), "Once upon a time, there was a dragon.");
        assert!(!resumed[1].text_content().contains("Then one day"));
    }

    #[test]
    fn paragraph_strategy_without_a_boundary_falls_back_to_original_messages() {
        let record = sample();
        let resumed = resume_stream(&record, RecoveryStrategy::Paragraph);
        assert_eq!(resumed.len(), 1);
    }

    #[test]
    fn empty_partial_content_is_a_no_op() {
        let record = RecoveryRecord::new("r1", "openai", vec![Message::user("hi")]);
        let resumed = resume_stream(&record, RecoveryStrategy::Paragraph);
        assert_eq!(resumed.len(), 1);
    }
}
