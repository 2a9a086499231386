//! Ornament record format
//!
//! Stored as a JSON array:
//! `[{ "position": { "x": 1.0, "y": 2.0 }, "spriteRef": "...", "isAvatarStyle": false }]`

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A point in screen space as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for Position {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Position> for Vec2 {
    fn from(p: Position) -> Self {
        Vec2::new(p.x, p.y)
    }
}

/// Everything needed to rebuild one settled ornament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrnamentRecord {
    pub position: Position,
    pub sprite_ref: String,
    #[serde(default)]
    pub is_avatar_style: bool,
}

impl OrnamentRecord {
    fn is_valid(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite()
    }
}

/// Serialize records for storage
pub fn encode_records(records: &[OrnamentRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string(records)
}

/// Decode stored records, skipping any entry that does not parse
///
/// Empty input, a non-array document or unparseable JSON all yield an empty
/// list.
pub fn parse_records(json: &str) -> Vec<OrnamentRecord> {
    if json.trim().is_empty() {
        return Vec::new();
    }

    let values = match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Array(values)) => values,
        Ok(serde_json::Value::Null) => return Vec::new(),
        Ok(other) => {
            log::warn!("Ornament storage is not a list ({}), ignoring", kind_of(&other));
            return Vec::new();
        }
        Err(e) => {
            log::warn!("Ornament storage is not valid JSON: {}", e);
            return Vec::new();
        }
    };

    let total = values.len();
    let records: Vec<OrnamentRecord> = values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value::<OrnamentRecord>(value) {
            Ok(record) if record.is_valid() => Some(record),
            Ok(_) => {
                log::warn!("Skipping ornament record {}: non-finite position", i);
                None
            }
            Err(e) => {
                log::warn!("Skipping ornament record {}: {}", i, e);
                None
            }
        })
        .collect();

    if records.len() < total {
        log::info!("Recovered {} of {} ornament records", records.len(), total);
    }
    records
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
