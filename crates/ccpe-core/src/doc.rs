// Typed access over serde_json::Value documents (saves and packages).
// - Kind-checked field access: `object_field`, `array_field`, `required_field`.
// - RFC 6901 JSON Pointer browsing: `get_by_pointer`, `list_children`.
// - File helpers: `read_json_file`, `write_json_to_file`.
// Accessors return `String` errors; callers wrap them into the matching
// `CoreError` variant for their context (save vs package).
use crate::error::{CoreError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind { Null, Bool, Number, String, Object, Array }

impl std::fmt::Display for JsonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JsonKind::Null => "null",
            JsonKind::Bool => "bool",
            JsonKind::Number => "number",
            JsonKind::String => "string",
            JsonKind::Object => "object",
            JsonKind::Array => "array",
        };
        f.write_str(s)
    }
}

pub fn kind_of(v: &Value) -> JsonKind {
    match v {
        Value::Null => JsonKind::Null,
        Value::Bool(_) => JsonKind::Bool,
        Value::Number(_) => JsonKind::Number,
        Value::String(_) => JsonKind::String,
        Value::Object(_) => JsonKind::Object,
        Value::Array(_) => JsonKind::Array,
    }
}

pub fn as_object<'a>(v: &'a Value, what: &str) -> Result<&'a Map<String, Value>, String> {
    v.as_object().ok_or_else(|| format!("{what} is {}, expected object", kind_of(v)))
}

pub fn as_array<'a>(v: &'a Value, what: &str) -> Result<&'a Vec<Value>, String> {
    v.as_array().ok_or_else(|| format!("{what} is {}, expected array", kind_of(v)))
}

pub fn required_field<'a>(obj: &'a Map<String, Value>, key: &str, what: &str) -> Result<&'a Value, String> {
    obj.get(key).ok_or_else(|| format!("{what}.{key} is missing"))
}

pub fn object_field<'a>(obj: &'a Map<String, Value>, key: &str, what: &str) -> Result<&'a Map<String, Value>, String> {
    as_object(required_field(obj, key, what)?, &format!("{what}.{key}"))
}

pub fn array_field<'a>(obj: &'a Map<String, Value>, key: &str, what: &str) -> Result<&'a Vec<Value>, String> {
    as_array(required_field(obj, key, what)?, &format!("{what}.{key}"))
}

/// Copy `src` over `dst` key by key. Existing keys keep their position,
/// new keys are appended.
pub fn overlay(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (k, v) in src {
        dst.insert(k.clone(), v.clone());
    }
}

pub fn read_json_file(path: &Path) -> Result<Value> {
    let data = fs::read(path).map_err(|e| CoreError::io(path, e))?;
    Ok(serde_json::from_slice(&data)?)
}

/// Compact output, which is what the game itself writes.
pub fn write_json_to_file(path: &Path, value: &Value) -> Result<()> {
    let s = serde_json::to_string(value)?;
    fs::write(path, s).map_err(|e| CoreError::io(path, e))
}

pub fn get_by_pointer(value: &Value, pointer: &str) -> Option<Value> {
    value.pointer(pointer).cloned()
}

/// One member of an object or array, as shown when browsing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildInfo {
    /// Member name, or the element index for arrays.
    pub key: String,
    pub kind: JsonKind,
    /// Member count for objects and arrays.
    pub len: Option<usize>,
}

impl ChildInfo {
    pub fn of(key: impl Into<String>, v: &Value) -> Self {
        let len = match v {
            Value::Object(m) => Some(m.len()),
            Value::Array(a) => Some(a.len()),
            _ => None,
        };
        Self { key: key.into(), kind: kind_of(v), len }
    }
}

/// Members of the object or array at `pointer`. Scalars have none.
pub fn list_children(value: &Value, pointer: &str) -> Result<Vec<ChildInfo>, String> {
    let node = value.pointer(pointer).ok_or_else(|| format!("{pointer} is missing"))?;
    Ok(match node {
        Value::Object(map) => map.iter().map(|(k, v)| ChildInfo::of(k.as_str(), v)).collect(),
        Value::Array(arr) => arr.iter().enumerate().map(|(i, v)| ChildInfo::of(i.to_string(), v)).collect(),
        _ => Vec::new(),
    })
}
