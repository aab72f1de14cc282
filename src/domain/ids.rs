//! Warehouse identifier types with validation
//!
//! This module provides newtype wrappers for sink-side identifiers.
//! Each type guarantees it only holds characters the warehouse accepts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum identifier length accepted by the warehouse
const MAX_ID_LEN: usize = 1024;

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Dataset identifier newtype wrapper
///
/// A dataset groups every table produced by one export run.
///
/// # Examples
///
/// ```
/// use cartograph::domain::ids::DatasetId;
/// use std::str::FromStr;
///
/// let dataset = DatasetId::from_str("neo4j_export_42").unwrap();
/// assert_eq!(dataset.as_str(), "neo4j_export_42");
/// assert!(DatasetId::from_str("bad-name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    /// Creates a new DatasetId, rejecting anything outside `[A-Za-z0-9_]`
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Dataset ID cannot be empty".to_string());
        }
        if id.len() > MAX_ID_LEN {
            return Err(format!("Dataset ID exceeds {MAX_ID_LEN} characters"));
        }
        if let Some(bad) = id.chars().find(|c| !is_safe_char(*c)) {
            return Err(format!(
                "Dataset ID '{id}' contains invalid character '{bad}' (allowed: letters, digits, underscore)"
            ));
        }
        Ok(Self(id))
    }

    /// Returns the dataset ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for DatasetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sink table identifier newtype wrapper
///
/// Table IDs are derived from category names, which may contain any character
/// a graph label can hold. [`TableId::sanitized`] maps them onto the safe alphabet.
///
/// # Examples
///
/// ```
/// use cartograph::domain::ids::TableId;
///
/// let table = TableId::sanitized("Person_Employee-KNOWS-Person");
/// assert_eq!(table.as_str(), "Person_Employee_KNOWS_Person");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(String);

impl TableId {
    /// Creates a TableId from an already-safe string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.is_empty() {
            return Err("Table ID cannot be empty".to_string());
        }
        if id.len() > MAX_ID_LEN {
            return Err(format!("Table ID exceeds {MAX_ID_LEN} characters"));
        }
        if let Some(bad) = id.chars().find(|c| !is_safe_char(*c)) {
            return Err(format!("Table ID '{id}' contains invalid character '{bad}'"));
        }
        Ok(Self(id))
    }

    /// Builds a TableId by replacing every character outside `[A-Za-z0-9]` with `_`
    ///
    /// An empty input yields `UNLABELED`.
    pub fn sanitized(raw: &str) -> Self {
        if raw.is_empty() {
            return Self("UNLABELED".to_string());
        }
        let mut id: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        if id.len() > MAX_ID_LEN {
            id.truncate(MAX_ID_LEN);
        }
        Self(id)
    }

    /// This ID with `_{n}` appended, shortened first if needed to stay within limits
    pub fn with_suffix(&self, n: usize) -> Self {
        let suffix = format!("_{n}");
        let mut base = self.0.clone();
        base.truncate(MAX_ID_LEN - suffix.len());
        Self(base + &suffix)
    }

    /// Returns the table ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TableId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
