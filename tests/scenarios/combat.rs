//! Combat scenario tests
//!
//! Weapon attacks rolled by the attacker's player, monster actions rolled
//! by the GM, and damage applied directly.

use serde_json::json;

use crate::harness::{TestServer, TestWorld};

/// Test: Brakka hits the goblin; the player rolls both attack and damage
#[tokio::test]
async fn test_weapon_attack_round_trip() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.expect("Failed to connect");

    alice.submit(TestWorld::sword_swing()).await.unwrap();

    // 18 + 5 = 23 vs AC 15
    let attack = alice.answer_roll(&[18]).await.unwrap();
    assert_eq!(attack["kind"], "attack");
    assert_eq!(attack["dice"], json!(["1d20"]));

    // 1d8+3 with a 2
    let damage = alice.answer_roll(&[2]).await.unwrap();
    assert_eq!(damage["dice"], json!(["1d8+3"]));

    let outcome = alice.action_result().await.unwrap();
    assert_eq!(outcome["phase"], "completed");
    assert_eq!(server.hit_points("goblin").await.unwrap(), 2);
}

/// Test: a miss asks for no damage roll
#[tokio::test]
async fn test_weapon_attack_miss() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.expect("Failed to connect");

    alice.submit(TestWorld::sword_swing()).await.unwrap();
    alice.answer_roll(&[3]).await.unwrap();

    let outcome = alice.action_result().await.unwrap();
    assert_eq!(outcome["phase"], "completed");
    assert_eq!(server.hit_points("goblin").await.unwrap(), 7);
}

/// Test: the second attack in one turn fails and changes nothing
#[tokio::test]
async fn test_action_slot_spent() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.expect("Failed to connect");

    alice.submit(TestWorld::sword_swing()).await.unwrap();
    alice.answer_roll(&[3]).await.unwrap();
    alice.action_result().await.unwrap();

    alice.submit(TestWorld::sword_swing()).await.unwrap();
    let outcome = alice.action_result().await.unwrap();
    assert_eq!(outcome["phase"], "failed");
    assert!(outcome["message"].as_str().unwrap().contains("already used"));
}

/// Test: a reply with the wrong dice is refused and can be corrected
#[tokio::test]
async fn test_bad_roll_reply_is_refused() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.expect("Failed to connect");

    alice.submit(TestWorld::sword_swing()).await.unwrap();
    let msg = alice.expect("roll_request").await.unwrap();
    let request_id = msg["request"]["id"].as_str().unwrap().to_string();

    alice
        .send_roll_result(&request_id, json!([{"faces": 6, "results": [6]}]))
        .await
        .unwrap();
    let error = alice.expect("error").await.unwrap();
    assert!(error["message"].as_str().unwrap().contains("invalid response"));

    alice
        .send_roll_result(&request_id, json!([{"faces": 20, "results": [1]}]))
        .await
        .unwrap();
    let outcome = alice.action_result().await.unwrap();
    assert_eq!(outcome["phase"], "completed");
}

/// Test: the GM rolls for the goblin, and its hit shows in chat
#[tokio::test]
async fn test_monster_action_rolled_by_gm() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut gm = server.connect("gm").await.expect("Failed to connect");

    gm.submit(json!({
        "action_kind": "monster-action",
        "parameters": {"character_id": "goblin", "action": "Scimitar"},
        "target_ids": ["pc"]
    }))
    .await
    .unwrap();

    // 14 + 4 = 18 vs AC 16, then 1d6+2 with a 4
    gm.answer_roll(&[14]).await.unwrap();
    gm.answer_roll(&[4]).await.unwrap();
    let chat = gm.drain_chat().await;
    assert!(chat.iter().any(|line| line == "Brakka takes 6 damage."), "{:?}", chat);

    assert_eq!(server.hit_points("pc").await.unwrap(), 18);
}

/// Test: with nobody to roll, the attack is skipped rather than failed
#[tokio::test]
async fn test_absent_roller_skips_target() {
    let server = TestServer::start_strict(500).await.expect("Failed to start server");

    let resp = server
        .post(
            "/actions",
            &json!({
                "issuer_id": "gm",
                "action_kind": "monster-action",
                "parameters": {"character_id": "goblin", "action": "scimitar"},
                "target_ids": ["pc"]
            }),
        )
        .await
        .unwrap();
    let outcome: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(outcome["phase"], "completed");
    assert_eq!(server.hit_points("pc").await.unwrap(), 24);
}

/// Test: damage applied over HTTP honors resistance
#[tokio::test]
async fn test_apply_damage_over_http() {
    let server = TestServer::start().await.expect("Failed to start server");

    let resp = server
        .post(
            "/actions",
            &json!({
                "issuer_id": "gm",
                "action_kind": "apply-damage",
                "parameters": {"amount": 11, "damage_type": "fire"},
                "target_ids": ["ogre"]
            }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let outcome: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(outcome["updated"], json!(["ogre"]));
    assert_eq!(server.hit_points("ogre").await.unwrap(), 54);

    let resp = server
        .post(
            "/actions",
            &json!({
                "issuer_id": "gm",
                "action_kind": "apply-damage",
                "parameters": {"amount": 5, "damage_type": "sonic"},
                "target_ids": ["ogre"]
            }),
        )
        .await
        .unwrap();
    let outcome: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(outcome["phase"], "rejected");
    assert_eq!(outcome["error"]["code"], "INVALID_DAMAGE");
}
