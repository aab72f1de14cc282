//! Property records
//!
//! Graph entities have no fixed schema, so every exported entity becomes a
//! [`PropertyRecord`]: a map from field name to one of a closed set of
//! [`PropertyValue`] variants that the staging format knows how to render.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Synthetic identity field carried by every record
pub const ID_FIELD: &str = "__id";

/// Synthetic start-node identity on relationship records
pub const FROM_FIELD: &str = "__from";

/// Synthetic end-node identity on relationship records
pub const TO_FIELD: &str = "__to";

/// Fields that always lead the column layout, in this order
pub const IDENTITY_FIELDS: [&str; 3] = [ID_FIELD, FROM_FIELD, TO_FIELD];

/// A single scalar property value
///
/// Integers are kept as decimal text so values wider than 53 bits survive the
/// trip unchanged. Spatial values are kept in their serialized text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    String(String),
    Integer(String),
    Float(f64),
    Boolean(bool),
    Point(String),
    Null,
}

impl PropertyValue {
    /// Converts a JSON value returned by the source into a property value
    ///
    /// Lists and nested maps (other than points) are kept as compact JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Boolean(*b),
            Value::Number(n) if n.is_i64() || n.is_u64() => PropertyValue::Integer(n.to_string()),
            Value::Number(n) => match n.as_f64() {
                Some(f) => PropertyValue::Float(f),
                None => PropertyValue::Integer(n.to_string()),
            },
            Value::String(s) => PropertyValue::String(s.clone()),
            Value::Object(map) => match point_text(map) {
                Some(point) => PropertyValue::Point(point),
                None => PropertyValue::String(value.to_string()),
            },
            Value::Array(_) => PropertyValue::String(value.to_string()),
        }
    }

    /// Text written into a staged CSV cell; `Null` renders as an empty cell
    pub fn to_field(&self) -> String {
        match self {
            PropertyValue::String(s) | PropertyValue::Integer(s) | PropertyValue::Point(s) => {
                s.clone()
            }
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::Boolean(b) => b.to_string(),
            PropertyValue::Null => String::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_field())
    }
}

/// Renders a GeoJSON-style point object the way the graph driver prints points
fn point_text(map: &serde_json::Map<String, Value>) -> Option<String> {
    if map.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }
    let coordinates = map.get("coordinates")?.as_array()?;
    let srid = map
        .get("crs")
        .and_then(|crs| crs.get("srid"))
        .map(|srid| srid.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let axes = ["x", "y", "z"];
    let parts: Vec<String> = coordinates
        .iter()
        .zip(axes.iter())
        .map(|(coord, axis)| format!("{axis}={coord}"))
        .collect();

    Some(format!("Point{{srid={}, {}}}", srid, parts.join(", ")))
}

/// One exported entity
///
/// Fields are kept sorted by name; the staging layer moves the identity fields
/// to the front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    fields: BTreeMap<String, PropertyValue>,
}

impl PropertyRecord {
    /// Creates a record carrying only its identity
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(ID_FIELD.to_string(), PropertyValue::Integer(id.into()));
        Self { fields }
    }

    /// Sets a field, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.fields.insert(name.into(), value);
    }

    /// Merges a JSON property map into the record
    ///
    /// Identity fields already on the record win over same-named properties.
    pub fn extend_from_json(&mut self, properties: &serde_json::Map<String, Value>) {
        for (key, value) in properties {
            if IDENTITY_FIELDS.contains(&key.as_str()) && self.fields.contains_key(key) {
                continue;
            }
            self.fields
                .insert(key.clone(), PropertyValue::from_json(value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.fields.get(name)
    }

    /// The identity value, if present
    pub fn id(&self) -> Option<&PropertyValue> {
        self.fields.get(ID_FIELD)
    }

    /// Field names in sorted order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integers_become_text() {
        assert_eq!(
            PropertyValue::from_json(&json!(9007199254740993_i64)),
            PropertyValue::Integer("9007199254740993".to_string())
        );
        assert_eq!(
            PropertyValue::from_json(&json!(18446744073709551615_u64)),
            PropertyValue::Integer("18446744073709551615".to_string())
        );
    }

    #[test]
    fn test_scalars() {
        assert_eq!(PropertyValue::from_json(&json!(1.5)), PropertyValue::Float(1.5));
        assert_eq!(PropertyValue::from_json(&json!(true)), PropertyValue::Boolean(true));
        assert_eq!(PropertyValue::from_json(&json!(null)), PropertyValue::Null);
        assert_eq!(
            PropertyValue::from_json(&json!("hi")),
            PropertyValue::String("hi".to_string())
        );
    }

    #[test]
    fn test_point_serialization() {
        let value = json!({
            "type": "Point",
            "coordinates": [1.5, 2.0],
            "crs": {"srid": 7203, "name": "cartesian"}
        });
        assert_eq!(
            PropertyValue::from_json(&value),
            PropertyValue::Point("Point{srid=7203, x=1.5, y=2.0}".to_string())
        );
    }

    #[test]
    fn test_lists_and_maps_become_json_text() {
        assert_eq!(
            PropertyValue::from_json(&json!(["a", "b"])),
            PropertyValue::String(r#"["a","b"]"#.to_string())
        );
        assert_eq!(
            PropertyValue::from_json(&json!({"k": 1})),
            PropertyValue::String(r#"{"k":1}"#.to_string())
        );
    }

    #[test]
    fn test_null_renders_empty_cell() {
        assert_eq!(PropertyValue::Null.to_field(), "");
        assert!(PropertyValue::Null.is_null());
    }

    #[test]
    fn test_record_identity_wins_over_properties() {
        let mut record = PropertyRecord::with_id("42");
        let props = json!({"__id": "spoofed", "name": "Ada"});
        record.extend_from_json(props.as_object().unwrap());

        assert_eq!(record.id(), Some(&PropertyValue::Integer("42".to_string())));
        assert_eq!(
            record.get("name"),
            Some(&PropertyValue::String("Ada".to_string()))
        );
        assert_eq!(record.len(), 2);
    }
}
