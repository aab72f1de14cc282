//! Raw row transforms
//!
//! Page queries return identity columns plus a `props` map. These functions fold
//! them into a [`PropertyRecord`].

use super::traits::{RawRow, SourceResult};
use crate::domain::record::{FROM_FIELD, ID_FIELD, TO_FIELD};
use crate::domain::{PropertyRecord, PropertyValue, SourceError};
use serde_json::Value;

/// Column holding the entity's property map
pub const PROPS_COLUMN: &str = "props";

/// Node row: `__id` plus properties
pub fn node_record(row: &RawRow) -> SourceResult<PropertyRecord> {
    let mut record = PropertyRecord::with_id(identity(row, ID_FIELD)?);
    merge_props(&mut record, row)?;
    Ok(record)
}

/// Relationship row: `__id`, `__from` and `__to` plus properties
pub fn edge_record(row: &RawRow) -> SourceResult<PropertyRecord> {
    let mut record = PropertyRecord::with_id(identity(row, ID_FIELD)?);
    record.insert(FROM_FIELD, PropertyValue::Integer(identity(row, FROM_FIELD)?));
    record.insert(TO_FIELD, PropertyValue::Integer(identity(row, TO_FIELD)?));
    merge_props(&mut record, row)?;
    Ok(record)
}

fn identity(row: &RawRow, column: &str) -> SourceResult<String> {
    match row.get(column) {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(SourceError::InvalidResponse(format!(
            "column {column} is not an identity: {other}"
        ))),
        None => Err(SourceError::InvalidResponse(format!(
            "row is missing column {column}"
        ))),
    }
}

fn merge_props(record: &mut PropertyRecord, row: &RawRow) -> SourceResult<()> {
    match row.get(PROPS_COLUMN) {
        Some(Value::Object(props)) => {
            record.extend_from_json(props);
            Ok(())
        }
        Some(Value::Null) | None => Ok(()),
        Some(other) => Err(SourceError::InvalidResponse(format!(
            "props column is not a map: {other}"
        ))),
    }
}
