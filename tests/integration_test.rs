//! Integration tests using TestServer harness

mod harness;
mod scenarios;

use serde_json::json;

use harness::{TestServer, TestWorld};

#[tokio::test]
async fn test_server_starts_and_stops() {
    let server = TestServer::start().await.expect("Failed to start server");
    // Server shuts down automatically when dropped
    drop(server);
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start().await.expect("Failed to start server");

    let resp = server.get("/health").await.expect("Failed to get health");
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["documents"], 7);
    assert_eq!(body["pending_requests"], 0);
}

#[tokio::test]
async fn test_root_endpoint() {
    let server = TestServer::start().await.expect("Failed to start server");

    let resp = server.get("/").await.expect("Failed to get root");
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["name"], "vttd");
}

#[tokio::test]
async fn test_document_endpoint() {
    let server = TestServer::start().await.expect("Failed to start server");

    let pc = server.document("pc").await.expect("Failed to get document");
    assert_eq!(pc["name"], "Brakka");
    assert_eq!(pc["owner_id"], "alice");

    let resp = server.get("/documents/nobody").await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn test_post_requires_issuer() {
    let server = TestServer::start().await.expect("Failed to start server");

    let resp = server.post("/actions", &TestWorld::sword_swing()).await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_unknown_action_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");

    let resp = server
        .post(
            "/actions",
            &json!({"issuer_id": "gm", "action_kind": "summon-dragon"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let outcome: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(outcome["phase"], "rejected");
    assert_eq!(outcome["error"]["code"], "UNKNOWN_ACTION");
    assert_eq!(outcome["updated"], json!([]));
}

#[tokio::test]
async fn test_websocket_welcome_and_ping() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.expect("Failed to connect");
    assert_eq!(alice.id(), "alice");

    // Ping gets no reply and keeps the connection open
    alice.send_ping().await.unwrap();
    alice.send_raw("not json").await.unwrap();
    let error = alice.expect("error").await.unwrap();
    assert!(error["message"].as_str().is_some());

    let resp = server.get("/health").await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["participants"], 1);
}

#[tokio::test]
async fn test_apply_damage_writes_back() {
    let server = TestServer::start().await.expect("Failed to start server");

    let resp = server
        .post(
            "/actions",
            &json!({
                "issuer_id": "gm",
                "action_kind": "apply-damage",
                "parameters": {"amount": 3, "damage_type": "fire"},
                "target_ids": ["goblin"]
            }),
        )
        .await
        .unwrap();
    let outcome: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(outcome["phase"], "completed");
    assert_eq!(server.hit_points("goblin").await.unwrap(), 4);
}

#[tokio::test]
async fn test_participant_sees_public_chat() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut bob = server.connect("bob").await.expect("Failed to connect");

    server
        .post(
            "/actions",
            &json!({
                "issuer_id": "gm",
                "action_kind": "apply-healing",
                "parameters": {"amount": 4},
                "target_ids": ["cleric"]
            }),
        )
        .await
        .unwrap();

    let chat = bob.drain_chat().await;
    assert!(
        chat.iter().any(|line| line.contains("regains 4 hit points")),
        "{:?}",
        chat
    );
    assert_eq!(server.hit_points("cleric").await.unwrap(), 9);
}
