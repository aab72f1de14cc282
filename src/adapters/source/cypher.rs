//! Cypher query builders
//!
//! Count and page queries anchor on the first label in `MATCH`, require the
//! remaining labels in `WHERE`, and pin the label count so that an entity with a
//! superset of labels is never picked up by a narrower category.

use crate::domain::{Category, CategoryKind};
use serde::Serialize;
use serde_json::{Map, Value};

/// Enumerates every distinct node label combination
pub const LABEL_COMBINATIONS: &str = "MATCH (n) RETURN DISTINCT labels(n) AS labels";

/// Enumerates every distinct `(from labels, type, to labels)` triple
pub const RELATIONSHIP_COMBINATIONS: &str =
    "MATCH (n)-[r]->(m) RETURN DISTINCT labels(n) AS from, type(r) AS relType, labels(m) AS to";

/// Parameter bound to the page offset
pub const SKIP_PARAM: &str = "skip";

/// Parameter bound to the page size
pub const LIMIT_PARAM: &str = "limit";

/// A statement plus its parameters, serialized the way the HTTP endpoint expects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    #[serde(rename = "statement")]
    pub text: String,
    #[serde(rename = "parameters")]
    pub params: Map<String, Value>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Map::new(),
        }
    }

    /// Returns a copy with one more parameter bound
    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn label_combinations() -> Self {
        Self::new(LABEL_COMBINATIONS)
    }

    pub fn relationship_combinations() -> Self {
        Self::new(RELATIONSHIP_COMBINATIONS)
    }

    /// Count query for a category
    pub fn count_for(category: &Category) -> Self {
        match category.kind() {
            CategoryKind::Node { labels } => Self::new(format!(
                "{} RETURN count(n) AS count",
                node_match(labels)
            )),
            CategoryKind::Edge { from, rel_type, to } => Self::new(format!(
                "{} RETURN count(r) AS count",
                edge_match(from, rel_type, to)
            )),
        }
    }

    /// Page query for a category, ordered by the intrinsic entity id
    pub fn page_for(category: &Category) -> Self {
        match category.kind() {
            CategoryKind::Node { labels } => Self::new(format!(
                "{} RETURN id(n) AS __id, properties(n) AS props \
                 ORDER BY id(n) ASC SKIP ${SKIP_PARAM} LIMIT ${LIMIT_PARAM}",
                node_match(labels)
            )),
            CategoryKind::Edge { from, rel_type, to } => Self::new(format!(
                "{} RETURN id(r) AS __id, id(n) AS __from, id(m) AS __to, properties(r) AS props \
                 ORDER BY id(r) ASC SKIP ${SKIP_PARAM} LIMIT ${LIMIT_PARAM}",
                edge_match(from, rel_type, to)
            )),
        }
    }
}

/// Quotes an identifier with backticks, doubling any embedded backtick
pub fn escape(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// `WHERE` fragment requiring every label on `var`; `1=1` when there are none
pub fn label_predicates(labels: &[String], var: &str) -> String {
    if labels.is_empty() {
        return "1=1".to_string();
    }
    labels
        .iter()
        .map(|label| format!("{var}:{}", escape(label)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn pattern(var: &str, labels: &[String]) -> String {
    match labels.first() {
        Some(first) => format!("({var}:{})", escape(first)),
        None => format!("({var})"),
    }
}

fn exact_labels(var: &str, labels: &[String]) -> String {
    let rest = labels.get(1..).unwrap_or_default();
    format!(
        "{} AND size(labels({var})) = {}",
        label_predicates(rest, var),
        labels.len()
    )
}

fn node_match(labels: &[String]) -> String {
    format!(
        "MATCH {} WHERE {}",
        pattern("n", labels),
        exact_labels("n", labels)
    )
}

fn edge_match(from: &[String], rel_type: &str, to: &[String]) -> String {
    format!(
        "MATCH {}-[r:{}]->{} WHERE {} AND {}",
        pattern("n", from),
        escape(rel_type),
        pattern("m", to),
        exact_labels("n", from),
        exact_labels("m", to)
    )
}
