//! Strict decoding of oracle output.
//!
//! Oracle text may wrap its JSON in markdown fences or prose. Bare JSON is
//! decoded directly; otherwise the JSON is located first. Either way it is
//! decoded against a serde schema. The result is a tagged
//! [`ParseOutcome`]; nothing downstream ever sees an unchecked shape.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::mutation::{DeleteDirective, MutationSet, ProposedEntry, UpdateDirective};
use crate::entry::Importance;

/// Result of decoding oracle output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    /// The raw oracle text that could not be decoded.
    ParseFailed(String),
}

impl<T> ParseOutcome<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::ParseFailed(_) => None,
        }
    }
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").ok())
        .as_ref()
}

/// Locate the JSON object inside raw oracle text.
///
/// Prefers the body of the first fenced block; otherwise the span from the
/// first `{` to the last `}`.
pub fn extract_json(raw: &str) -> Option<&str> {
    let body = fence_regex()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim();

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}

/// Extract and decode a JSON object of type `T`.
///
/// Text that is already valid JSON is decoded as is, so fences inside its
/// string values are never mistaken for a wrapper.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> ParseOutcome<T> {
    if let Ok(value) = serde_json::from_str::<T>(raw.trim()) {
        return ParseOutcome::Parsed(value);
    }
    let Some(json) = extract_json(raw) else {
        return ParseOutcome::ParseFailed(raw.to_string());
    };
    match serde_json::from_str::<T>(json) {
        Ok(value) => ParseOutcome::Parsed(value),
        Err(_) => ParseOutcome::ParseFailed(raw.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Wire schema for memory operations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireAdd {
    content: String,
    #[serde(default)]
    importance: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUpdate {
    id: String,
    new_content: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Deletes arrive either as bare ids or as `{id, reason}` objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireDelete {
    Bare(String),
    Detailed {
        id: String,
        #[serde(default)]
        reason: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct WireOps {
    #[serde(default)]
    add: Option<Vec<WireAdd>>,
    #[serde(default)]
    update: Option<Vec<WireUpdate>>,
    #[serde(default)]
    delete: Option<Vec<WireDelete>>,
}

fn non_blank(reason: Option<String>) -> Option<String> {
    reason.filter(|r| !r.trim().is_empty())
}

impl From<WireOps> for MutationSet {
    fn from(ops: WireOps) -> Self {
        let adds = ops
            .add
            .unwrap_or_default()
            .into_iter()
            .filter(|a| !a.content.trim().is_empty())
            .map(|a| ProposedEntry {
                content: a.content.trim().to_string(),
                importance: a
                    .importance
                    .as_deref()
                    .map(Importance::from_label)
                    .unwrap_or_default(),
            })
            .collect();

        let updates = ops
            .update
            .unwrap_or_default()
            .into_iter()
            .filter(|u| !u.new_content.trim().is_empty())
            .map(|u| UpdateDirective {
                target_id: u.id.trim().into(),
                new_content: u.new_content.trim().to_string(),
                reason: non_blank(u.reason),
            })
            .collect();

        let deletes = ops
            .delete
            .unwrap_or_default()
            .into_iter()
            .map(|d| match d {
                WireDelete::Bare(id) => DeleteDirective {
                    target_id: id.trim().into(),
                    reason: None,
                },
                WireDelete::Detailed { id, reason } => DeleteDirective {
                    target_id: id.trim().into(),
                    reason: non_blank(reason),
                },
            })
            .collect();

        MutationSet {
            adds,
            updates,
            deletes,
        }
    }
}

/// Decoded planner reply: optional conversational text plus mutations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannerReply {
    pub response: Option<String>,
    pub mutations: MutationSet,
}

const OP_KEYS: [&str; 3] = ["add", "update", "delete"];

/// Decode a planner reply.
///
/// Accepts `{"response": .., "memory_ops": {..}}` and the flat
/// `{"add": [..], "update": [..], "delete": [..]}` shape. A reply carrying
/// neither decodes to an empty mutation set.
pub fn parse_planner_reply(raw: &str) -> ParseOutcome<PlannerReply> {
    let value = match decode_json::<Value>(raw) {
        ParseOutcome::Parsed(value) => value,
        ParseOutcome::ParseFailed(raw) => return ParseOutcome::ParseFailed(raw),
    };
    let Value::Object(mut object) = value else {
        return ParseOutcome::ParseFailed(raw.to_string());
    };

    let response = match object.remove("response") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(_) => return ParseOutcome::ParseFailed(raw.to_string()),
    };

    let ops_value = match object.remove("memory_ops") {
        Some(Value::Null) => None,
        Some(ops @ Value::Object(_)) => Some(ops),
        Some(_) => return ParseOutcome::ParseFailed(raw.to_string()),
        None if OP_KEYS.iter().any(|k| object.contains_key(*k)) => Some(Value::Object(object)),
        None => None,
    };

    let ops = match ops_value {
        Some(v) => match serde_json::from_value::<WireOps>(v) {
            Ok(ops) => ops,
            Err(_) => return ParseOutcome::ParseFailed(raw.to_string()),
        },
        None => WireOps::default(),
    };

    ParseOutcome::Parsed(PlannerReply {
        response,
        mutations: ops.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_block() {
        let raw = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(extract_json(raw), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_json_from_bare_fence_and_prose() {
        assert_eq!(extract_json("```\n{\"a\": 2}\n```"), Some("{\"a\": 2}"));
        assert_eq!(extract_json("sure! {\"a\": 3} done"), Some("{\"a\": 3}"));
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_parse_conversational_reply() {
        let raw = r#"{
            "response": "Congrats on the move!",
            "memory_ops": {
                "add": [{"content": "Works on data pipelines", "importance": "high"}],
                "update": [{"id": "e1", "new_content": "Based in San Francisco", "reason": "moved"}],
                "delete": [{"id": "e2", "reason": "expired"}]
            }
        }"#;
        let reply = parse_planner_reply(raw).parsed().unwrap();
        assert_eq!(reply.response.as_deref(), Some("Congrats on the move!"));
        assert_eq!(reply.mutations.adds[0].importance, Importance::High);
        assert_eq!(reply.mutations.updates[0].target_id.as_str(), "e1");
        assert_eq!(reply.mutations.updates[0].reason.as_deref(), Some("moved"));
        assert_eq!(reply.mutations.deletes[0].reason.as_deref(), Some("expired"));
    }

    #[test]
    fn test_fence_inside_response_text_is_not_a_wrapper() {
        let raw = r#"{"response": "Sure:\n```\nls -la\n```", "memory_ops": {"add": [{"content": "Wants shell commands in code blocks", "importance": "high"}]}}"#;
        let reply = parse_planner_reply(raw).parsed().unwrap();
        assert_eq!(reply.response.as_deref(), Some("Sure:\n```\nls -la\n```"));
        assert_eq!(reply.mutations.adds.len(), 1);
        assert_eq!(reply.mutations.adds[0].importance, Importance::High);
    }

    #[test]
    fn test_fenced_reply_with_inline_code_in_response() {
        let raw = "```json\n{\"response\": \"run `ls`\", \"memory_ops\": {\"delete\": [\"e1\"]}}\n```";
        let set = parse_planner_reply(raw).parsed().unwrap().mutations;
        assert_eq!(set.deletes[0].target_id.as_str(), "e1");
    }

    #[test]
    fn test_parse_mixed_delete_shapes() {
        let raw = r#"{"memory_ops": {"delete": ["e1", {"id": "e2", "reason": "stale"}, {"id": "e3"}]}}"#;
        let set = parse_planner_reply(raw).parsed().unwrap().mutations;
        let ids: Vec<&str> = set.deletes.iter().map(|d| d.target_id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3"]);
        assert_eq!(set.deletes[0].reason, None);
        assert_eq!(set.deletes[1].reason.as_deref(), Some("stale"));
    }

    #[test]
    fn test_parse_flat_extraction_shape() {
        let raw = r#"{"add": [{"content": "Prefers Neovim"}], "update": [], "delete": []}"#;
        let reply = parse_planner_reply(raw).parsed().unwrap();
        assert_eq!(reply.response, None);
        assert_eq!(reply.mutations.adds.len(), 1);
        assert_eq!(reply.mutations.adds[0].importance, Importance::Medium);
    }

    #[test]
    fn test_parse_response_only_is_empty_set() {
        let reply = parse_planner_reply(r#"{"response": "hi"}"#).parsed().unwrap();
        assert!(reply.mutations.is_empty());
    }

    #[test]
    fn test_parse_failures() {
        assert!(!parse_planner_reply("I could not decide.").is_parsed());
        assert!(!parse_planner_reply(r#"{"memory_ops": ["add"]}"#).is_parsed());
        assert!(!parse_planner_reply(r#"{"memory_ops": {"add": [{"importance": "high"}]}}"#)
            .is_parsed());
        assert!(!parse_planner_reply(r#"{"memory_ops": {"update": [{"id": "e1"}]}}"#).is_parsed());
        assert!(!parse_planner_reply(r#"{"response": 42}"#).is_parsed());
        assert!(!parse_planner_reply("{not json}").is_parsed());
    }

    #[test]
    fn test_parse_failed_keeps_raw_text() {
        match parse_planner_reply("garbage") {
            ParseOutcome::ParseFailed(raw) => assert_eq!(raw, "garbage"),
            ParseOutcome::Parsed(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_blank_items_are_dropped_and_nulls_tolerated() {
        let raw = r#"{"memory_ops": {"add": [{"content": "  "}, {"content": "Team of 8", "importance": "urgent"}], "update": null}}"#;
        let set = parse_planner_reply(raw).parsed().unwrap().mutations;
        assert_eq!(set.adds.len(), 1);
        assert_eq!(set.adds[0].content, "Team of 8");
        assert_eq!(set.adds[0].importance, Importance::Medium);
        assert!(set.updates.is_empty());
    }
}
