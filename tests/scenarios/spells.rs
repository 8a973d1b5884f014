//! Spell scenario tests
//!
//! Attack cantrips rolled by the caster, and save spells where the GM
//! rolls each monster's save before the caster rolls shared damage.

use serde_json::json;

use crate::harness::{TestServer, TestWorld};

/// Test: Fire Bolt hits the ogre, whose resistance halves the damage
#[tokio::test]
async fn test_cantrip_attack_resisted() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.expect("Failed to connect");

    alice
        .submit(json!({
            "action_kind": "cast-spell",
            "parameters": {"character_id": "pc", "spell_id": "bolt"},
            "target_ids": ["ogre"]
        }))
        .await
        .unwrap();

    // 10 + 4 = 14 vs AC 11
    alice.answer_roll(&[10]).await.unwrap();
    // 8 fire, resisted to 4
    let damage = alice.answer_roll(&[8]).await.unwrap();
    assert_eq!(damage["dice"], json!(["1d10"]));

    let outcome = alice.action_result().await.unwrap();
    assert_eq!(outcome["phase"], "completed");
    assert_eq!(server.hit_points("ogre").await.unwrap(), 55);

    // Cantrips leave slots alone
    let pc = server.document("pc").await.unwrap();
    assert_eq!(pc["state"]["spell_slots"]["1"]["used"], 0);
}

/// Test: each monster saves separately, damage is rolled once and halved on a save
#[tokio::test]
async fn test_save_spell_batches_saves() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut gm = server.connect("gm").await.expect("Failed to connect");
    let mut alice = server.connect("alice").await.expect("Failed to connect");

    alice.submit(TestWorld::flame_burst()).await.unwrap();

    // DC 12: goblin 15 + 2 saves, ogre 3 - 1 fails
    let goblin_save = gm.answer_roll(&[15]).await.unwrap();
    assert_eq!(goblin_save["kind"], "saving_throw");
    assert!(goblin_save["label"].as_str().unwrap().contains("Goblin"));
    let ogre_save = gm.answer_roll(&[3]).await.unwrap();
    assert!(ogre_save["label"].as_str().unwrap().contains("Ogre"));

    let damage = alice.answer_roll(&[4, 4, 4]).await.unwrap();
    assert_eq!(damage["dice"], json!(["3d6"]));

    let outcome = alice.action_result().await.unwrap();
    assert_eq!(outcome["phase"], "completed");

    // 12 halved to 6 on the save; 12 resisted to 6 on the failure
    assert_eq!(server.hit_points("goblin").await.unwrap(), 1);
    assert_eq!(server.hit_points("ogre").await.unwrap(), 53);

    let pc = server.document("pc").await.unwrap();
    assert_eq!(pc["state"]["spell_slots"]["1"]["used"], 1);
}

/// Test: casting with no slots left is refused before anything is rolled
#[tokio::test]
async fn test_no_slots_left() {
    let server = TestServer::start().await.expect("Failed to start server");

    let cast = json!({
        "issuer_id": "alice",
        "action_kind": "cast-spell",
        "parameters": {"character_id": "pc", "spell_id": "burst", "slot_level": 2},
        "target_ids": ["goblin"]
    });
    let resp = server.post("/actions", &cast).await.unwrap();
    let outcome: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(outcome["phase"], "rejected");
    assert_eq!(outcome["error"]["code"], "INVALID_PARAMETERS");
    assert_eq!(server.hit_points("goblin").await.unwrap(), 7);
}
