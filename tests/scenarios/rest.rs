//! Rest scenario tests
//!
//! Tobin is out of combat and can rest; Brakka is in the encounter and
//! cannot take a long rest.

use serde_json::json;

use crate::harness::TestServer;

/// Test: Tobin spends a hit die, rolled by his player
#[tokio::test]
async fn test_short_rest_rolls_hit_die() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut bob = server.connect("bob").await.expect("Failed to connect");

    bob.submit(json!({
        "action_kind": "short-rest",
        "parameters": {"character_id": "cleric", "hit_dice": 1}
    }))
    .await
    .unwrap();

    // 1d8+1 with a 6
    let request = bob.answer_roll(&[6]).await.unwrap();
    assert_eq!(request["kind"], "hit_die");
    assert_eq!(request["dice"], json!(["1d8+1"]));

    let outcome = bob.action_result().await.unwrap();
    assert_eq!(outcome["phase"], "completed");

    let cleric = server.document("cleric").await.unwrap();
    assert_eq!(cleric["state"]["hit_points"]["current"], 12);
    assert_eq!(cleric["state"]["hit_dice"]["remaining"], 1);
}

/// Test: a confirmed long rest restores hit points and half the hit dice
#[tokio::test]
async fn test_long_rest_confirmed() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut bob = server.connect("bob").await.expect("Failed to connect");

    bob.submit(json!({
        "action_kind": "long-rest",
        "parameters": {"character_id": "cleric"}
    }))
    .await
    .unwrap();
    bob.answer_confirmation(true).await.unwrap();

    let outcome = bob.action_result().await.unwrap();
    assert_eq!(outcome["phase"], "completed");

    let cleric = server.document("cleric").await.unwrap();
    assert_eq!(cleric["state"]["hit_points"]["current"], 18);
    assert_eq!(cleric["state"]["hit_dice"]["remaining"], 4);
}

/// Test: declining the long rest changes nothing
#[tokio::test]
async fn test_long_rest_declined() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut bob = server.connect("bob").await.expect("Failed to connect");

    bob.submit(json!({
        "action_kind": "long-rest",
        "parameters": {"character_id": "cleric"}
    }))
    .await
    .unwrap();
    bob.answer_confirmation(false).await.unwrap();
    bob.action_result().await.unwrap();

    assert_eq!(server.hit_points("cleric").await.unwrap(), 5);
}

/// Test: no long rest in the middle of an encounter
#[tokio::test]
async fn test_long_rest_blocked_in_encounter() {
    let server = TestServer::start().await.expect("Failed to start server");

    let resp = server
        .post(
            "/actions",
            &json!({
                "issuer_id": "alice",
                "action_kind": "long-rest",
                "parameters": {"character_id": "pc"}
            }),
        )
        .await
        .unwrap();
    let outcome: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(outcome["phase"], "rejected");
    assert_eq!(outcome["error"]["code"], "CANNOT_LONG_REST");
}
