mod common;

use tempfile::TempDir;

use tutor_rag::chat::ChatSession;
use tutor_rag::config::Config;
use tutor_rag_core::models::Role;

use common::{open_store, test_config, FakeChat};

fn session(chat: &FakeChat, config: &Config) -> ChatSession {
    ChatSession::new(Box::new(chat.clone()), config)
}

#[tokio::test]
async fn test_context_turn_and_history() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let mut store = open_store(tmp.path());
    store
        .ingest(vec!["Mitosis splits one cell into two.".to_string()], "bio.txt", "T1")
        .await;

    let chat = FakeChat::replying("Two cells.");
    let mut session = session(&chat, &config);

    let reply = session
        .send(&store, Some("T1"), "Mitosis splits one cell into two.")
        .await;
    assert_eq!(reply, "Two cells.");

    let request = chat.last_request();
    assert_eq!(request.len(), 1);
    assert!(request[0].content.starts_with("Reference information:\nMitosis splits"));
    assert!(request[0]
        .content
        .ends_with("Answer based on the information above: Mitosis splits one cell into two."));

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "Mitosis splits one cell into two.");
    assert_eq!(history[1].role, Role::Assistant);

    session
        .send(&store, Some("T1"), "Mitosis splits one cell into two.")
        .await;
    let second = chat.last_request();
    assert_eq!(second.len(), 3);
    assert_eq!(second[0].content, "Mitosis splits one cell into two.");
    assert_eq!(second[1].content, "Two cells.");
}

#[tokio::test]
async fn test_out_of_scope_skips_provider() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let mut store = open_store(tmp.path());
    store
        .ingest(vec!["Mitosis splits one cell.".to_string()], "bio.txt", "T1")
        .await;

    let chat = FakeChat::replying("unused");
    let mut session = session(&chat, &config);

    let reply = session.send(&store, Some("T2"), "What is mitosis?").await;
    assert_eq!(reply, config.chat.out_of_scope_reply);
    assert_eq!(chat.request_count(), 0);
}

#[tokio::test]
async fn test_empty_store_answers_without_context() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = open_store(tmp.path());

    let chat = FakeChat::replying("General answer.");
    let mut session = session(&chat, &config);

    let reply = session.send(&store, None, "Hello?").await;
    assert_eq!(reply, "General answer.");
    assert_eq!(chat.last_request()[0].content, "Hello?");
}

#[tokio::test]
async fn test_provider_failure_is_inline_and_session_survives() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = open_store(tmp.path());

    let chat = FakeChat::failing();
    let mut session = session(&chat, &config);

    let reply = session.send(&store, None, "Hello?").await;
    assert!(reply.starts_with("Error: "));
    assert!(reply.contains("500"));
    assert!(session.history().is_empty());

    let again = session.send(&store, None, "Still there?").await;
    assert!(again.starts_with("Error: "));
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = open_store(tmp.path());

    let chat = FakeChat::replying("unused");
    let mut session = session(&chat, &config);

    let reply = session.send(&store, None, "   ").await;
    assert!(reply.starts_with("Error:"));
    assert_eq!(chat.request_count(), 0);
    assert!(session.history().is_empty());

    session.reset();
    assert!(session.history().is_empty());
}
