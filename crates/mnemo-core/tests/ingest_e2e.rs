//! End-to-end ingestion against rule-based oracle stubs.

mod common;

use std::sync::Arc;

use common::{add_reply, empty_reply, last_user_line, memories_in};
use mnemo_core::fakes::{FnOracle, HashEmbedder, ScriptedOracle};
use mnemo_core::{AgentMemory, EngineConfig, Provenance, Turn, TurnStatus};
use serde_json::json;
use tracing_test::traced_test;

/// Persists location and work facts, updates location on a move, and
/// ignores small talk.
fn profile_oracle(prompt: &str) -> String {
    let said = last_user_line(prompt).to_lowercase();
    if said.contains("based in nyc") {
        return add_reply(&["Based in New York City"]);
    }
    if said.contains("data pipelines") {
        return add_reply(&["Works on data pipelines at Acme"]);
    }
    if said.contains("moved to san francisco") {
        let stale = memories_in(prompt)
            .into_iter()
            .find(|(_, content)| content.contains("New York"));
        return match stale {
            Some((id, _)) => json!({
                "response": "Congrats on the move!",
                "memory_ops": {"update": [{
                    "id": id,
                    "new_content": "Based in San Francisco",
                    "reason": "relocated"
                }]}
            })
            .to_string(),
            None => add_reply(&["Based in San Francisco"]),
        };
    }
    empty_reply()
}

fn engine(oracle: Arc<dyn mnemo_core::ReasoningOracle>) -> AgentMemory {
    AgentMemory::new(
        "sarah_01",
        EngineConfig::default(),
        oracle,
        Arc::new(HashEmbedder::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn location_change_in_session_three_updates_in_place() {
    let mut mem = engine(Arc::new(FnOracle::new(profile_oracle)));

    let first = mem
        .ingest(
            &[
                Turn::user("Hi! I'm Sarah, based in NYC."),
                Turn::assistant("Nice to meet you, Sarah."),
                Turn::user("I mostly work on data pipelines."),
            ],
            1,
        )
        .await;
    assert_eq!(first.len(), 2);
    let nyc_id = first
        .iter()
        .find(|e| e.content().contains("New York"))
        .map(|e| e.id.clone())
        .unwrap();

    mem.ingest(&[Turn::user("The weather is lovely today.")], 2)
        .await;
    assert_eq!(mem.len(), 2);

    let third = mem
        .ingest(
            &[Turn::user("Big news: I moved to San Francisco last month!")],
            3,
        )
        .await;

    assert_eq!(third.len(), 1);
    assert_eq!(third[0].id, nyc_id);
    assert_eq!(mem.len(), 2);
    let all = mem.get_all();
    assert!(all.iter().all(|e| !e.content().contains("New York")));

    let location = mem.get(nyc_id.as_str()).unwrap();
    assert_eq!(location.content(), "Based in San Francisco");
    assert_eq!(location.metadata.session_created, 1);
    assert_eq!(location.metadata.session_updated, 3);
    assert_eq!(location.metadata.last_update_reason.as_deref(), Some("relocated"));
    assert_eq!(location.metadata.provenance, Provenance::Conversation);

    let hits = mem.search("where is she based", 1).await.unwrap();
    assert_eq!(hits[0].id, nyc_id);
}

#[tokio::test]
async fn small_talk_is_not_persisted() {
    let oracle = Arc::new(FnOracle::new(profile_oracle));
    let mut mem = engine(oracle.clone());

    let touched = mem
        .ingest(
            &[
                Turn::user("Ugh, traffic was terrible this morning."),
                Turn::assistant("Sorry to hear that."),
                Turn::user("Had a great sandwich for lunch though."),
            ],
            1,
        )
        .await;

    assert!(touched.is_empty());
    assert!(mem.is_empty());
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
#[traced_test]
async fn malformed_oracle_output_leaves_store_unchanged() {
    let oracle = Arc::new(ScriptedOracle::with_replies([
        add_reply(&["Prefers morning meetings"]),
        "I think the user likes coffee, but I'm not sure.".to_string(),
    ]));
    let mut mem = engine(oracle);

    mem.ingest(&[Turn::user("Mornings are best for meetings.")], 1)
        .await;
    let before = mem.get_all();

    let report = mem
        .ingest_session(&[Turn::user("Coffee keeps me going.")], 2)
        .await;

    assert_eq!(report.turns[0].status, TurnStatus::ParseFailed);
    assert!(report.touched.is_empty());
    assert_eq!(mem.get_all(), before);
    assert_eq!(mem.stats().parse_failures, 1);
    assert!(logs_contain("failed to parse oracle response"));
}

#[tokio::test]
#[traced_test]
async fn oracle_outage_is_no_change_for_that_turn() {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.push_failure("connection refused");
    oracle.push_reply(add_reply(&["Uses Rust at work"]));
    let mut mem = engine(oracle.clone());

    let report = mem
        .ingest_session(
            &[Turn::user("first"), Turn::user("I use Rust at work")],
            1,
        )
        .await;

    assert_eq!(report.turns[0].status, TurnStatus::OracleFailed);
    assert_eq!(report.turns[1].status, TurnStatus::Applied);
    assert_eq!(mem.len(), 1);
    assert_eq!(mem.stats().oracle_failures, 1);
    assert!(logs_contain("oracle call failed"));
}

#[tokio::test]
async fn placeholder_turns_are_never_shown_to_the_oracle() {
    let oracle = Arc::new(ScriptedOracle::new());
    let mut mem = engine(oracle.clone());

    mem.ingest(
        &[
            Turn::user("I lead the platform team."),
            Turn::user("[MEMORY TEST] What team do I lead?"),
            Turn::assistant("[MEMORY TEST] expected: platform"),
        ],
        1,
    )
    .await;

    assert_eq!(oracle.calls(), 1);
    assert!(oracle.prompts().iter().all(|p| !p.contains("[MEMORY TEST]")));
}

#[tokio::test]
async fn fenced_replies_and_replies_are_collected() {
    let fenced = format!("Sure!\n```json\n{}\n```", add_reply(&["Has two cats"]));
    let mut mem = engine(Arc::new(ScriptedOracle::with_replies([fenced])));

    let report = mem.ingest_session(&[Turn::user("My two cats say hi")], 1).await;

    assert_eq!(report.touched.len(), 1);
    assert_eq!(report.replies, vec!["Noted.".to_string()]);
}

#[tokio::test]
async fn code_block_in_reply_text_does_not_lose_the_ops() {
    let reply = json!({
        "response": "Here you go:\n```\ngit log --oneline\n```",
        "memory_ops": {"add": [{"content": "Prefers terse shell commands", "importance": "high"}]}
    })
    .to_string();
    let mut mem = engine(Arc::new(ScriptedOracle::with_replies([reply])));

    let report = mem
        .ingest_session(&[Turn::user("Just give me the command, no explanation.")], 1)
        .await;

    assert_eq!(report.turns[0].status, TurnStatus::Applied);
    assert_eq!(mem.len(), 1);
    assert_eq!(report.touched[0].content(), "Prefers terse shell commands");
    assert!(report.replies[0].contains("git log --oneline"));
}

#[tokio::test]
async fn retrieval_is_bounded_by_k() {
    let facts = [
        "Lives in Austin",
        "Works at Initech",
        "Plays the cello",
        "Has a dog named Rex",
        "Runs marathons",
        "Learning Japanese",
        "Vegetarian",
        "Drives an EV",
    ];
    let oracle = Arc::new(ScriptedOracle::with_replies([add_reply(&facts)]));
    let mut mem = engine(oracle.clone());
    mem.ingest(&[Turn::user("let me tell you about myself")], 1)
        .await;
    assert_eq!(mem.len(), 8);

    assert_eq!(mem.search("dog", 3).await.unwrap().len(), 3);
    assert_eq!(mem.search("dog", 20).await.unwrap().len(), 8);
    assert!(mem.search("dog", 0).await.unwrap().is_empty());
    assert_eq!(mem.search("dog", 1).await.unwrap()[0].content(), "Has a dog named Rex");

    // The planner only sees retrieval_k entries for the next turn.
    mem.ingest(&[Turn::user("anything new?")], 2).await;
    let prompt = oracle.prompts().pop().unwrap();
    assert_eq!(memories_in(&prompt).len(), EngineConfig::default().retrieval_k);
}
