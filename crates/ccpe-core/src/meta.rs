use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Descriptive header stored under `__meta` in every package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ShipMetaData {
    pub name: String,
    pub author: String,
    pub description: String,
    pub required_mods: Vec<String>,
}

impl ShipMetaData {
    /// Decode a `__meta` value without failing. Missing or mistyped fields
    /// fall back to their defaults, so packages written by hand still list.
    pub fn from_value_lenient(v: Option<&Value>) -> Self {
        let Some(Value::Object(obj)) = v else {
            return Self::default();
        };
        let text = |k: &str| obj.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
        let required_mods = obj
            .get("RequiredMods")
            .and_then(Value::as_array)
            .map(|mods| mods.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            name: text("Name"),
            author: text("Author"),
            description: text("Description"),
            required_mods,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "Name": self.name,
            "Author": self.author,
            "Description": self.description,
            "RequiredMods": self.required_mods,
        })
    }
}
