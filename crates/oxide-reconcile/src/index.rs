//! Named secondary index diffing.
//!
//! Indexes are compared by name. The column list is order-sensitive: an
//! index on `(a, b)` and one on `(b, a)` are different, and a changed index
//! is dropped and re-created rather than altered.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::CurrentTable;
use crate::model::TableSpec;

/// A named secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed columns, in key order.
    pub columns: Vec<String>,
    /// Whether the index is unique.
    pub unique: bool,
}

/// Index statements needed to go from one index set to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexChanges {
    /// Names of indexes to drop.
    pub drop: Vec<String>,
    /// Indexes to create.
    pub create: Vec<IndexDef>,
}

impl IndexChanges {
    /// Returns true when nothing changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drop.is_empty() && self.create.is_empty()
    }
}

/// The default name of a single-column index.
#[must_use]
pub fn default_index_name(table: &str, column: &str) -> String {
    format!("{table}_{column}")
}

fn add_member(indexes: &mut BTreeMap<String, IndexDef>, name: String, column: &str, unique: bool) {
    let index = indexes.entry(name.clone()).or_insert_with(|| IndexDef {
        name,
        columns: Vec::new(),
        unique,
    });
    index.unique |= unique;
    if !index.columns.iter().any(|c| c == column) {
        index.columns.push(column.to_string());
    }
}

/// The secondary indexes a table declares, by name.
///
/// A `unique` field contributes a unique index, an `index` field an index
/// of the declared uniqueness. Fields sharing a name form one index, in
/// declaration order. The primary key is not included.
#[must_use]
pub fn desired_indexes(table: &TableSpec) -> BTreeMap<String, IndexDef> {
    let mut indexes = BTreeMap::new();
    for field in &table.fields {
        let column = field.column_name();
        if field.unique {
            let name = field
                .unique_index
                .clone()
                .unwrap_or_else(|| default_index_name(&table.name, &column));
            add_member(&mut indexes, name, &column, true);
        }
        if let Some(index) = &field.index {
            let name = index
                .name
                .clone()
                .unwrap_or_else(|| default_index_name(&table.name, &column));
            add_member(&mut indexes, name, &column, index.unique);
        }
    }
    indexes
}

/// The secondary indexes a current table has, by name.
#[must_use]
pub fn current_indexes(table: &CurrentTable<'_>) -> BTreeMap<String, IndexDef> {
    let mut members: BTreeMap<&str, (bool, Vec<(u32, &str)>)> = BTreeMap::new();
    for column in &table.columns {
        for membership in column.indexes.iter().filter(|m| !m.primary) {
            let entry = members
                .entry(membership.name.as_str())
                .or_insert_with(|| (membership.unique, Vec::new()));
            entry.1.push((membership.position, column.name.as_str()));
        }
    }

    members
        .into_iter()
        .map(|(name, (unique, mut columns))| {
            columns.sort_unstable();
            let index = IndexDef {
                name: name.to_string(),
                columns: columns.into_iter().map(|(_, c)| c.to_string()).collect(),
                unique,
            };
            (name.to_string(), index)
        })
        .collect()
}

/// Columns that are the sole member of a unique index.
#[must_use]
pub fn sole_unique_columns(indexes: &BTreeMap<String, IndexDef>) -> BTreeSet<String> {
    indexes
        .values()
        .filter(|i| i.unique && i.columns.len() == 1)
        .flat_map(|i| i.columns.iter().cloned())
        .collect()
}

/// Computes the drops and creates turning `current` into `desired`.
///
/// Both lists are in name order. An index whose columns or uniqueness
/// changed appears in both.
#[must_use]
pub fn diff_indexes(
    desired: &BTreeMap<String, IndexDef>,
    current: &BTreeMap<String, IndexDef>,
) -> IndexChanges {
    let drop = current
        .iter()
        .filter(|(name, have)| desired.get(*name) != Some(*have))
        .map(|(name, _)| name.clone())
        .collect();
    let create = desired
        .iter()
        .filter(|(name, want)| current.get(*name) != Some(*want))
        .map(|(_, want)| want.clone())
        .collect();
    IndexChanges { drop, create }
}
