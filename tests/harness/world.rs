//! TestWorld - Standard world seed for integration tests
//!
//! - `pc`: Brakka, owned by `alice`, carrying a longsword and a fire bolt
//! - `cleric`: Tobin, owned by `bob`, out of combat
//! - `goblin`, `ogre`: GM-controlled monsters
//! - An encounter with Brakka adjacent to the goblin and the ogre 65 ft away

#![allow(dead_code)]

use std::io::Write;

use anyhow::Result;
use serde_json::{json, Value};
use tempfile::NamedTempFile;

pub struct TestWorld;

impl TestWorld {
    /// The world seed as JSON
    pub fn seed() -> Value {
        json!({
            "documents": [
                {
                    "id": "pc",
                    "kind": "character",
                    "name": "Brakka",
                    "owner_id": "alice",
                    "data": {
                        "armor_class": 16,
                        "abilities": {"str": 16, "dex": 12, "con": 14, "int": 14},
                        "proficiency_bonus": 2,
                        "hit_die": 10,
                        "spellcasting_ability": "int"
                    },
                    "state": {
                        "hit_points": {"current": 24, "max": 24},
                        "hit_dice": {"remaining": 3, "max": 3},
                        "spell_slots": {"1": {"max": 2, "used": 0}}
                    }
                },
                {
                    "id": "sword",
                    "kind": "item",
                    "name": "Longsword",
                    "parent_id": "pc",
                    "data": {
                        "weapon": {"category": "melee", "damage": {"formula": "1d8", "type": "slashing"}}
                    }
                },
                {
                    "id": "bolt",
                    "kind": "item",
                    "name": "Fire Bolt",
                    "parent_id": "pc",
                    "data": {
                        "spell": {
                            "level": 0,
                            "resolution": "attack",
                            "range": {"normal": 120},
                            "damage": [{"formula": "1d10", "type": "fire"}]
                        }
                    }
                },
                {
                    "id": "burst",
                    "kind": "item",
                    "name": "Flame Burst",
                    "parent_id": "pc",
                    "data": {
                        "spell": {
                            "level": 1,
                            "resolution": "save",
                            "save_ability": "dex",
                            "half_on_save": true,
                            "damage": [{"formula": "3d6", "type": "fire"}]
                        }
                    }
                },
                {
                    "id": "cleric",
                    "kind": "character",
                    "name": "Tobin",
                    "owner_id": "bob",
                    "data": {"abilities": {"con": 12, "dex": 10}, "hit_die": 8},
                    "state": {
                        "hit_points": {"current": 5, "max": 18},
                        "hit_dice": {"remaining": 2, "max": 4}
                    }
                },
                {
                    "id": "goblin",
                    "kind": "actor",
                    "name": "Goblin",
                    "data": {
                        "armor_class": 15,
                        "abilities": {"dex": 14},
                        "actions": [{
                            "name": "Scimitar",
                            "attack_bonus": 4,
                            "damage": [{"formula": "1d6+2", "type": "slashing"}]
                        }]
                    },
                    "state": {"hit_points": {"current": 7, "max": 7}}
                },
                {
                    "id": "ogre",
                    "kind": "actor",
                    "name": "Ogre",
                    "data": {
                        "armor_class": 11,
                        "abilities": {"dex": 8},
                        "defenses": {"resistances": ["fire"]}
                    },
                    "state": {"hit_points": {"current": 59, "max": 59}}
                }
            ],
            "encounter": {
                "id": "enc-1",
                "grid": {"cell_size": 50, "units_per_cell": 5},
                "tokens": [
                    {"id": "t-pc", "document_id": "pc", "bounds": {"x": 0, "y": 0, "width": 50, "height": 50}},
                    {"id": "t-gob", "document_id": "goblin", "bounds": {"x": 50, "y": 0, "width": 50, "height": 50}},
                    {"id": "t-ogre", "document_id": "ogre", "bounds": {"x": 650, "y": 0, "width": 100, "height": 100}}
                ]
            }
        })
    }

    /// Write the seed to a temporary file
    pub fn write() -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(Self::seed().to_string().as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    /// Brakka swings the longsword at the goblin
    pub fn sword_swing() -> Value {
        json!({
            "action_kind": "weapon-attack",
            "parameters": {"character_id": "pc", "item_id": "sword"},
            "target_ids": ["goblin"]
        })
    }

    /// Brakka casts a levelled save spell at both monsters
    pub fn flame_burst() -> Value {
        json!({
            "action_kind": "cast-spell",
            "parameters": {"character_id": "pc", "spell_id": "burst"},
            "target_ids": ["goblin", "ogre"]
        })
    }
}
