//! Projection of a live save into a portable package document.

use serde_json::{Map, Value};

use crate::doc::{array_field, as_object, object_field, required_field};
use crate::error::{CoreError, Result};
use crate::meta::ShipMetaData;

/// `$type` discriminator of the artifact the game adds for hard difficulty.
pub const HARDMODE_ARTIFACT_TYPE: &str = "HARDMODE, CobaltCore";

/// Ship stats copied verbatim when the ship category is exported.
pub const SHIP_STAT_FIELDS: &[&str] = &[
    "key",
    "baseEnergy",
    "baseDraw",
    "evadeMax",
    "hpGainFromEliteKills",
    "hpGainFromBossKills",
    "chassisUnder",
    "chassisOver",
    "hull",
    "hullMax",
    "shieldMaxBase",
    "heatMin",
    "heatTrigger",
    "overheatDamage",
];

pub const PART_FIELDS: &[&str] = &["type", "skin", "flip", "damageModifier", "invincible"];

/// Runtime-only artifact state, rebuilt on import.
pub const ARTIFACT_SKIP_FIELDS: &[&str] = &["glowTime", "animation", "lastScreenPos"];

/// Runtime-only card state, rebuilt on import.
pub const CARD_SKIP_FIELDS: &[&str] = &["pos", "targetPos", "hoverAnim", "isForeground", "drawAnim"];

/// Which categories to include in an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportFlags {
    pub ship: bool,
    pub artifacts: bool,
    pub deck: bool,
    pub map: bool,
    pub characters: bool,
}

impl ExportFlags {
    pub fn all() -> Self {
        Self { ship: true, artifacts: true, deck: true, map: true, characters: true }
    }
}

pub fn is_hardmode_artifact(artifact: &Map<String, Value>) -> bool {
    artifact.get("$type").and_then(Value::as_str) == Some(HARDMODE_ARTIFACT_TYPE)
}

/// Build a package document from `save`. `__meta` is always the first key.
pub fn project(save: &Value, flags: ExportFlags, meta: &ShipMetaData) -> Result<Value> {
    let save = as_object(save, "save").map_err(CoreError::MalformedSave)?;
    let mut out = Map::new();
    out.insert("__meta".into(), meta.to_value());

    if flags.ship {
        out.insert("ship".into(), project_ship(save).map_err(CoreError::MalformedSave)?);
    }
    if flags.artifacts {
        out.insert("artifacts".into(), project_artifacts(save).map_err(CoreError::MalformedSave)?);
    }
    if flags.deck {
        out.insert("deck".into(), project_deck(save).map_err(CoreError::MalformedSave)?);
    }
    if flags.map {
        let map = required_field(save, "map", "save").map_err(CoreError::MalformedSave)?;
        out.insert("map".into(), map.clone());
    }
    if flags.characters {
        let chars = required_field(save, "characters", "save").map_err(CoreError::MalformedSave)?;
        out.insert("characters".into(), chars.clone());
    }
    if flags.ship || flags.characters {
        let run_config = object_field(save, "runConfig", "save").map_err(CoreError::MalformedSave)?;
        let mut rc = Map::new();
        if flags.ship {
            let v = required_field(run_config, "selectedShip", "save.runConfig").map_err(CoreError::MalformedSave)?;
            rc.insert("selectedShip".into(), v.clone());
        }
        if flags.characters {
            let v = required_field(run_config, "selectedChars", "save.runConfig").map_err(CoreError::MalformedSave)?;
            rc.insert("selectedChars".into(), v.clone());
        }
        out.insert("runConfig".into(), Value::Object(rc));
    }
    Ok(Value::Object(out))
}

fn project_ship(save: &Map<String, Value>) -> Result<Value, String> {
    let ship = object_field(save, "ship", "save")?;
    let mut out = Map::new();
    for key in SHIP_STAT_FIELDS {
        out.insert((*key).to_string(), required_field(ship, key, "save.ship")?.clone());
    }
    let mut parts = Vec::new();
    for (i, part) in array_field(ship, "parts", "save.ship")?.iter().enumerate() {
        let part = as_object(part, &format!("save.ship.parts[{i}]"))?;
        // Absent fields are left out so import-time defaults apply.
        let reduced: Map<String, Value> = PART_FIELDS
            .iter()
            .filter_map(|k| part.get(*k).map(|v| ((*k).to_string(), v.clone())))
            .collect();
        parts.push(Value::Object(reduced));
    }
    out.insert("parts".into(), Value::Array(parts));
    Ok(Value::Object(out))
}

fn project_artifacts(save: &Map<String, Value>) -> Result<Value, String> {
    let mut out = Vec::new();
    for (i, artifact) in array_field(save, "artifacts", "save")?.iter().enumerate() {
        let artifact = as_object(artifact, &format!("save.artifacts[{i}]"))?;
        if is_hardmode_artifact(artifact) {
            continue;
        }
        out.push(Value::Object(without(artifact, ARTIFACT_SKIP_FIELDS)));
    }
    Ok(Value::Array(out))
}

fn project_deck(save: &Map<String, Value>) -> Result<Value, String> {
    let mut out = Vec::new();
    for (i, card) in array_field(save, "deck", "save")?.iter().enumerate() {
        let card = as_object(card, &format!("save.deck[{i}]"))?;
        out.push(Value::Object(without(card, CARD_SKIP_FIELDS)));
    }
    Ok(Value::Array(out))
}

fn without(obj: &Map<String, Value>, skip: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
