//! Splicing a package back into a save document.
//!
//! Every category is rebuilt off to the side and only assigned once it is
//! complete, so a key that fails leaves the save untouched for that key.
//! Failures are logged and reported, never raised.

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::doc::{array_field, as_array, as_object, overlay};
use crate::error::{CoreError, Result};
use crate::export::is_hardmode_artifact;

/// Map coordinate the player is moved to when `reset_position` is set.
pub const RESET_LOCATION: &str = "(2, 0)";

const ARTIFACT_FIRST_COLUMN: i64 = 86;
const ARTIFACT_COLUMN_STEP: i64 = 14;
const ARTIFACT_UPPER_ROW: i64 = 3;
const ARTIFACT_LOWER_ROW: i64 = 16;
const FIRST_CARD_UUID: i64 = 1000;
const CARD_REST_POS: &str = "(40, 203)";

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub reset_position: bool,
}

/// Outcome of a merge: which package keys made it into the save.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub applied: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool { self.skipped.is_empty() }
}

/// Apply `package` over `save` and return the merged save.
///
/// Only fails when either document is not a JSON object at the top level.
pub fn merge(mut save: Value, package: &Value, options: MergeOptions) -> Result<(Value, MergeReport)> {
    let package = as_object(package, "package").map_err(CoreError::MissingPackageField)?;
    let target = save
        .as_object_mut()
        .ok_or_else(|| CoreError::MalformedSave("save is not an object".into()))?;
    let mut report = MergeReport::default();

    for (key, incoming) in package {
        if key == "__meta" {
            continue;
        }
        match merge_key(target, key, incoming) {
            Ok(value) => {
                debug!(key = %key, "merged package key");
                target.insert(key.clone(), value);
                report.applied.push(key.clone());
            }
            Err(err) => {
                warn!(key = %key, error = %err, "skipping package key");
                report.skipped.push((key.clone(), err.to_string()));
            }
        }
    }

    if options.reset_position {
        match target.get_mut("map").and_then(Value::as_object_mut) {
            Some(map) => {
                map.insert("currentLocation".into(), Value::String(RESET_LOCATION.into()));
            }
            None => warn!("save has no map object, position not reset"),
        }
    }
    Ok((save, report))
}

fn merge_key(save: &Map<String, Value>, key: &str, incoming: &Value) -> Result<Value> {
    match key {
        "ship" => {
            let original = save
                .get("ship")
                .map(|v| as_object(v, "save.ship"))
                .transpose()
                .map_err(CoreError::MalformedSave)?;
            let incoming = as_object(incoming, "package.ship").map_err(CoreError::MissingPackageField)?;
            ship_patch(original, incoming)
        }
        "artifacts" => {
            let hardmode = save
                .get("artifacts")
                .and_then(Value::as_array)
                .and_then(|list| {
                    list.iter()
                        .filter_map(Value::as_object)
                        .find(|a| is_hardmode_artifact(a))
                });
            let incoming = as_array(incoming, "package.artifacts").map_err(CoreError::MissingPackageField)?;
            artifact_patch(incoming, hardmode)
        }
        "deck" => {
            let incoming = as_array(incoming, "package.deck").map_err(CoreError::MissingPackageField)?;
            deck_patch(incoming)
        }
        "runConfig" => {
            let original = save
                .get("runConfig")
                .map(|v| as_object(v, "save.runConfig"))
                .transpose()
                .map_err(CoreError::MalformedSave)?;
            let incoming = as_object(incoming, "package.runConfig").map_err(CoreError::MissingPackageField)?;
            let mut out = original.cloned().unwrap_or_default();
            overlay(&mut out, incoming);
            Ok(Value::Object(out))
        }
        _ => Ok(incoming.clone()),
    }
}

/// Fields every ship part carries in a save; packages only store a few.
pub fn default_part() -> Map<String, Value> {
    let mut part = Map::new();
    part.insert("flip".into(), Value::Bool(false));
    part.insert("damageModifier".into(), Value::String("none".into()));
    part.insert("damageModifierOverrideWhileActive".into(), Value::Null);
    part.insert("invincible".into(), Value::Bool(false));
    part.insert("brittleIsHidden".into(), Value::Bool(false));
    part.insert("stunnable".into(), Value::Bool(false));
    part.insert("active".into(), Value::Bool(true));
    part.insert("offset".into(), Value::String("(0, 0)".into()));
    part.insert("intent".into(), Value::Null);
    part
}

fn ship_patch(original: Option<&Map<String, Value>>, incoming: &Map<String, Value>) -> Result<Value> {
    // parts replace the old list wholesale, no positional merge
    let parts = array_field(incoming, "parts", "package.ship").map_err(CoreError::MissingPackageField)?;
    let mut new_parts = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let part = as_object(part, &format!("package.ship.parts[{i}]")).map_err(CoreError::MissingPackageField)?;
        let mut out = default_part();
        overlay(&mut out, part);
        new_parts.push(Value::Object(out));
    }

    let mut out = original.cloned().unwrap_or_default();
    for (k, v) in incoming {
        if k == "parts" {
            out.insert(k.clone(), Value::Array(new_parts.clone()));
        } else {
            out.insert(k.clone(), v.clone());
        }
    }
    Ok(Value::Object(out))
}

/// Screen slot of the n-th artifact in the HUD: two rows filled column by column.
pub fn artifact_screen_pos(index: usize) -> String {
    let column = ARTIFACT_FIRST_COLUMN + ARTIFACT_COLUMN_STEP * (index / 2) as i64;
    let row = if index % 2 == 0 { ARTIFACT_UPPER_ROW } else { ARTIFACT_LOWER_ROW };
    format!("({column}, {row})")
}

fn artifact_patch(incoming: &[Value], hardmode: Option<&Map<String, Value>>) -> Result<Value> {
    let mut out = Vec::with_capacity(incoming.len() + 1);
    if let Some(hm) = hardmode {
        out.push(Value::Object(hm.clone()));
    }
    for (i, artifact) in incoming.iter().enumerate() {
        let artifact = as_object(artifact, &format!("package.artifacts[{i}]")).map_err(CoreError::MissingPackageField)?;
        // $type must stay the first key for the game's deserializer
        let mut entry = Map::new();
        entry.insert("$type".into(), Value::Null);
        entry.insert("glowTimer".into(), json!(0.0));
        entry.insert("animation".into(), Value::Null);
        entry.insert("lastScreenPos".into(), Value::String(artifact_screen_pos(i)));
        overlay(&mut entry, artifact);
        out.push(Value::Object(entry));
    }
    Ok(Value::Array(out))
}

fn deck_patch(incoming: &[Value]) -> Result<Value> {
    let mut out = Vec::with_capacity(incoming.len());
    for (i, card) in incoming.iter().enumerate() {
        let card = as_object(card, &format!("package.deck[{i}]")).map_err(CoreError::MissingPackageField)?;
        let mut entry = Map::new();
        entry.insert("$type".into(), Value::Null);
        entry.insert("uuid".into(), json!(FIRST_CARD_UUID + i as i64));
        entry.insert("pos".into(), Value::String(CARD_REST_POS.into()));
        entry.insert("targetPos".into(), Value::String(CARD_REST_POS.into()));
        entry.insert("upgrade".into(), Value::String("None".into()));
        overlay(&mut entry, card);
        out.push(Value::Object(entry));
    }
    Ok(Value::Array(out))
}
