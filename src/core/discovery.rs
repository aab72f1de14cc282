//! Category discovery
//!
//! Runs one enumeration query per entity kind and maps each distinct shape to a
//! [`Category`]. Untyped shapes are returned as-is; filtering them is the
//! coordinator's policy.
//!
//! Different shapes can sanitize to the same table name (`:A_B` and `:A:B` both
//! give `A_B`). [`assign_unique_tables`] resolves those before anything is staged.

use crate::adapters::source::cypher::Query;
use crate::adapters::source::{RawRow, SourceConnector};
use crate::domain::{CartographError, Category, Result, TableId};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

pub struct CategoryDiscovery {
    source: Arc<dyn SourceConnector>,
}

impl CategoryDiscovery {
    pub fn new(source: Arc<dyn SourceConnector>) -> Self {
        Self { source }
    }

    /// Every distinct node label combination
    ///
    /// # Errors
    ///
    /// [`CartographError::Discovery`] on any query or row-shape failure
    pub async fn discover_node_categories(&self) -> Result<Vec<Category>> {
        let rows = self
            .source
            .rows(&Query::label_combinations())
            .await
            .map_err(|e| CartographError::Discovery(format!("label combinations: {e}")))?;

        let categories = rows
            .iter()
            .map(|row| Ok(Category::node(string_list(row, "labels")?)))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(count = categories.len(), "Discovered node categories");
        Ok(categories)
    }

    /// Every distinct `(from labels, type, to labels)` triple
    ///
    /// # Errors
    ///
    /// [`CartographError::Discovery`] on any query or row-shape failure
    pub async fn discover_edge_categories(&self) -> Result<Vec<Category>> {
        let rows = self
            .source
            .rows(&Query::relationship_combinations())
            .await
            .map_err(|e| CartographError::Discovery(format!("relationship combinations: {e}")))?;

        let categories = rows
            .iter()
            .map(|row| {
                let rel_type = row
                    .get("relType")
                    .and_then(Value::as_str)
                    .ok_or_else(|| shape_error("relType", row))?;
                Ok(Category::edge(
                    string_list(row, "from")?,
                    rel_type,
                    string_list(row, "to")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(count = categories.len(), "Discovered relationship categories");
        Ok(categories)
    }
}

/// Gives every category its own table
///
/// The first category holding a table name keeps it. Later ones get `_2`, `_3`, ...,
/// skipping any name another category holds naturally. Input order decides who
/// keeps the plain name.
pub fn assign_unique_tables(categories: Vec<Category>) -> Vec<Category> {
    let natural: HashSet<TableId> = categories.iter().map(|c| c.table().clone()).collect();
    let mut taken: HashSet<TableId> = HashSet::with_capacity(categories.len());

    categories
        .into_iter()
        .map(|category| {
            if taken.insert(category.table().clone()) {
                return category;
            }

            let base = category.table().clone();
            let mut n = 2;
            let unique = loop {
                let candidate = base.with_suffix(n);
                if !natural.contains(&candidate) && taken.insert(candidate.clone()) {
                    break candidate;
                }
                n += 1;
            };

            tracing::warn!(
                category = %category,
                table = %base,
                renamed = %unique,
                "Table name already taken by another category, renamed"
            );
            category.with_table(unique)
        })
        .collect()
}

fn string_list(row: &RawRow, column: &str) -> Result<Vec<String>> {
    row.get(column)
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| shape_error(column, row))
}

fn shape_error(column: &str, row: &RawRow) -> CartographError {
    CartographError::Discovery(format!(
        "unexpected {column} in row {}",
        Value::Object(row.clone())
    ))
}
