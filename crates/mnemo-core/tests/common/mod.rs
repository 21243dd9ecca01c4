//! Helpers for rule-based oracle stubs.
#![allow(dead_code)]

use serde_json::json;

/// `(id, content)` for every `[id] content (importance: x)` line of a prompt.
pub fn memories_in(prompt: &str) -> Vec<(String, String)> {
    prompt
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix('[')?;
            let (id, tail) = rest.split_once("] ")?;
            let content = tail
                .rsplit_once(" (importance: ")
                .map_or(tail, |(content, _)| content);
            Some((id.to_string(), content.to_string()))
        })
        .collect()
}

/// The latest user utterance in a planner prompt.
pub fn last_user_line(prompt: &str) -> &str {
    prompt
        .lines()
        .filter_map(|line| line.strip_prefix("User: "))
        .last()
        .unwrap_or("")
}

pub fn is_consolidation(prompt: &str) -> bool {
    prompt.starts_with("You are a memory consolidation system")
}

pub fn add_reply(facts: &[&str]) -> String {
    let adds: Vec<_> = facts
        .iter()
        .map(|f| json!({"content": f, "importance": "high"}))
        .collect();
    json!({"response": "Noted.", "memory_ops": {"add": adds}}).to_string()
}

pub fn empty_reply() -> String {
    json!({"response": "Ok.", "memory_ops": {"add": [], "update": [], "delete": []}}).to_string()
}
