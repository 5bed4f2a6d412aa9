//! Truncation strategies: which messages to drop when history overflows budget.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// Which truncation strategy [`crate::context::ContextManager::fit`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContextStrategy {
    /// Drop oldest non-system messages first; keep all system messages and
    /// the last `preserve_recent`.
    SlidingWindow,
    /// Like sliding_window, but drops from the middle oldest-first instead
    /// of a strict prefix, while never separating a tool-call/tool-response
    /// pair.
    Smart,
}

impl Default for ContextStrategy {
    fn default() -> Self {
        ContextStrategy::SlidingWindow
    }
}

pub const DEFAULT_PRESERVE_RECENT: usize = 5;

/// Indices of a tool_call-requesting message and every tool_response that
/// answers one of its tool_call_ids. The pair must be kept or dropped
/// together — splitting it would hand a provider an orphaned tool_call.
fn tool_pairs(messages: &[Message]) -> Vec<HashSet<usize>> {
    let mut pairs = Vec::new();
    for (i, m) in messages.iter().enumerate() {
        if let Some(ids) = &m.tool_call_ids {
            let mut group: HashSet<usize> = HashSet::from([i]);
            for (j, other) in messages.iter().enumerate() {
                if other.role == Role::Tool {
                    if let Some(call_id) = &other.tool_call_id {
                        if ids.contains(call_id) {
                            group.insert(j);
                        }
                    }
                }
            }
            if group.len() > 1 {
                pairs.push(group);
            }
        }
    }
    pairs
}

fn pair_group_of(pairs: &[HashSet<usize>], index: usize) -> Option<usize> {
    pairs.iter().position(|g| g.contains(&index))
}

/// Applies `strategy`, keeping messages under `max_tokens` as counted by
/// `count`. Always preserves original order; never reorders.
pub fn truncate(
    messages: &[Message],
    strategy: ContextStrategy,
    preserve_recent: usize,
    max_tokens: usize,
    count: impl Fn(&[Message]) -> usize,
) -> Vec<Message> {
    if count(messages) <= max_tokens {
        return messages.to_vec();
    }

    let n = messages.len();
    let system_idx: HashSet<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::System)
        .map(|(i, _)| i)
        .collect();
    let recent_start = n.saturating_sub(preserve_recent);
    let recent_idx: HashSet<usize> = (recent_start..n).collect();
    let pairs = tool_pairs(messages);

    let mut kept: HashSet<usize> = system_idx.iter().chain(recent_idx.iter()).copied().collect();
    // A recent/system index may belong to a tool pair whose partner falls
    // outside the recent window; pull the whole group in together.
    for &i in kept.clone().iter() {
        if let Some(group_idx) = pair_group_of(&pairs, i) {
            kept.extend(pairs[group_idx].iter().copied());
        }
    }

    let middle: Vec<usize> = match strategy {
        ContextStrategy::SlidingWindow => Vec::new(),
        ContextStrategy::Smart => (0..n)
            .filter(|i| !system_idx.contains(i) && !recent_idx.contains(i))
            .collect(),
    };

    // Add back middle messages, most recent first, until the budget is
    // exhausted, respecting tool-call pairing.
    let mut candidate: Vec<usize> = kept.iter().copied().collect();
    candidate.sort_unstable();
    let mut current_tokens = count(&project(messages, &candidate));

    for &i in middle.iter().rev() {
        if kept.contains(&i) {
            continue;
        }
        let group: Vec<usize> = match pair_group_of(&pairs, i) {
            Some(gi) => pairs[gi].iter().copied().filter(|x| !kept.contains(x)).collect(),
            None => vec![i],
        };
        let mut trial: HashSet<usize> = kept.clone();
        trial.extend(group.iter().copied());
        let mut trial_sorted: Vec<usize> = trial.iter().copied().collect();
        trial_sorted.sort_unstable();
        let trial_tokens = count(&project(messages, &trial_sorted));
        if trial_tokens <= max_tokens {
            kept = trial;
            current_tokens = trial_tokens;
        } else if current_tokens < max_tokens {
            // leave room for a later, smaller message.
            continue;
        } else {
            break;
        }
    }

    let mut result: Vec<usize> = kept.into_iter().collect();
    result.sort_unstable();
    project(messages, &result)
}

fn project(messages: &[Message], indices: &[usize]) -> Vec<Message> {
    indices.iter().map(|&i| messages[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_count(messages: &[Message]) -> usize {
        messages.iter().map(|m| m.text_content().len()).sum()
    }

    #[test]
    fn preserves_order_and_never_exceeds_when_possible() {
        let messages: Vec<Message> = (0..10).map(|i| Message::user(format!("msg{i}"))).collect();
        let out = truncate(&messages, ContextStrategy::SlidingWindow, 3, 20, char_count);
        let indices: Vec<usize> = out
            .iter()
            .map(|m| {
                let text = m.text_content();
                text.trim_start_matches("msg").parse::<usize>().unwrap()
            })
            .collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted, "output must preserve original order");
    }

    #[test]
    fn system_messages_always_survive() {
        let mut messages = vec![Message::system("sys")];
        messages.extend((0..20).map(|i| Message::user(format!("msg{i}"))));
        let out = truncate(&messages, ContextStrategy::Smart, 2, 10, char_count);
        assert!(out.iter().any(|m| m.role == Role::System));
    }

    #[test]
    fn tool_call_pair_kept_or_dropped_together() {
        let mut assistant = Message::assistant("calling");
        assistant.tool_call_ids = Some(vec!["call_1".into()]);
        let tool_response = Message::tool("call_1", "result");
        let mut messages = vec![assistant, tool_response];
        messages.extend((0..20).map(|i| Message::user(format!("filler{i}"))));

        let out = truncate(&messages, ContextStrategy::Smart, 2, 30, char_count);
        let has_assistant = out.iter().any(|m| m.tool_call_ids.is_some());
        let has_tool = out.iter().any(|m| m.role == Role::Tool);
        assert_eq!(has_assistant, has_tool);
    }
}
