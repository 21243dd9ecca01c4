//! Profile transcripts: one user's sessions as recorded JSON.

use std::path::Path;

use anyhow::{Context, Result};
use mnemo_core::Turn;
use serde::{Deserialize, Serialize};

/// One user's recorded conversation history.
///
/// Extra keys (names, descriptions, expected-memory annotations) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub sessions: Vec<ProfileSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSession {
    pub session_id: u32,
    pub turns: Vec<Turn>,
}

impl Profile {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid profile transcript")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Sessions in ordinal order, stopping before `until` when given.
    pub fn sessions_before(&self, until: Option<u32>) -> Vec<&ProfileSession> {
        let mut sessions: Vec<&ProfileSession> = self
            .sessions
            .iter()
            .filter(|s| until.map_or(true, |limit| s.session_id < limit))
            .collect();
        sessions.sort_by_key(|s| s.session_id);
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"{
        "user_id": "sarah_01",
        "name": "Sarah Chen",
        "sessions": [
            {"session_id": 3, "turns": [{"role": "user", "content": "I moved to SF"}]},
            {"session_id": 1, "turns": [
                {"role": "user", "content": "I'm based in NYC"},
                {"role": "assistant", "content": "Nice!"}
            ], "expected_memories_after": [{"fact": "Based in NYC"}]},
            {"session_id": 2, "turns": []}
        ]
    }"#;

    #[test]
    fn test_sessions_sorted_and_bounded() {
        let profile = Profile::from_json(PROFILE).unwrap();
        let ids: Vec<u32> = profile.sessions_before(None).iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let ids: Vec<u32> = profile
            .sessions_before(Some(3))
            .iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = Profile::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }
}
