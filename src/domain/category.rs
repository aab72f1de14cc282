//! Entity categories
//!
//! A category is a structurally homogeneous group of graph entities: every node
//! sharing one exact label combination, or every relationship sharing one
//! `(from labels, type, to labels)` triple. Exporting per combination rather than
//! per label guarantees each entity lands in exactly one table.

use super::ids::TableId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The shape that defines a category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CategoryKind {
    /// Nodes carrying exactly this label set
    Node { labels: Vec<String> },
    /// Relationships of one type between two exact label sets
    Edge {
        from: Vec<String>,
        rel_type: String,
        to: Vec<String>,
    },
}

/// A discovered entity category
///
/// Immutable once built; the display name and table are derived at construction.
///
/// # Examples
///
/// ```
/// use cartograph::domain::Category;
///
/// let people = Category::node(vec!["Person".into(), "Employee".into()]);
/// assert_eq!(people.name(), ":Person:Employee");
/// assert_eq!(people.table().as_str(), "Person_Employee");
///
/// let knows = Category::edge(vec!["Person".into()], "KNOWS", vec!["Person".into()]);
/// assert_eq!(knows.name(), "(:Person)-[:`KNOWS`]->(:Person)");
/// assert_eq!(knows.table().as_str(), "Person_KNOWS_Person");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    kind: CategoryKind,
    name: String,
    table: TableId,
}

impl Category {
    /// Builds a node category from an ordered label list
    pub fn node(labels: Vec<String>) -> Self {
        let name = label_path(&labels);
        let table = TableId::sanitized(&labels.join("_"));
        Self {
            kind: CategoryKind::Node { labels },
            name,
            table,
        }
    }

    /// Builds a relationship category
    pub fn edge(from: Vec<String>, rel_type: impl Into<String>, to: Vec<String>) -> Self {
        let rel_type = rel_type.into();
        let name = format!(
            "({})-[:`{}`]->({})",
            label_path(&from),
            rel_type,
            label_path(&to)
        );
        let table = TableId::sanitized(&format!(
            "{}-{}-{}",
            from.join("_"),
            rel_type,
            to.join("_")
        ));
        Self {
            kind: CategoryKind::Edge { from, rel_type, to },
            name,
            table,
        }
    }

    /// Same category, written to a different table
    pub fn with_table(mut self, table: TableId) -> Self {
        self.table = table;
        self
    }

    /// The category shape
    pub fn kind(&self) -> &CategoryKind {
        &self.kind
    }

    /// Human-readable name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Destination table for this category
    pub fn table(&self) -> &TableId {
        &self.table
    }

    /// Whether this is a relationship category
    pub fn is_edge(&self) -> bool {
        matches!(self.kind, CategoryKind::Edge { .. })
    }

    /// All type tags in order: labels for nodes, `from + [type] + to` for edges
    pub fn type_tags(&self) -> Vec<&str> {
        match &self.kind {
            CategoryKind::Node { labels } => labels.iter().map(String::as_str).collect(),
            CategoryKind::Edge { from, rel_type, to } => from
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(rel_type.as_str()))
                .chain(to.iter().map(String::as_str))
                .collect(),
        }
    }

    /// False for fully or partially untyped shapes, which are not exported
    ///
    /// A node needs at least one label; a relationship needs a label on both ends.
    pub fn is_typed(&self) -> bool {
        match &self.kind {
            CategoryKind::Node { labels } => !labels.is_empty(),
            CategoryKind::Edge { from, to, .. } => !from.is_empty() && !to.is_empty(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn label_path(labels: &[String]) -> String {
    format!(":{}", labels.join(":"))
}
