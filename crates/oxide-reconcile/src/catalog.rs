//! Current schema snapshot, as read from the live catalog.
//!
//! A snapshot is rebuilt on every invocation and never cached: two
//! concurrent reconcilers against the same database can race, and nothing
//! here tries to prevent that.

use std::collections::BTreeMap;

/// Membership of a column in an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMembership {
    /// Index name.
    pub name: String,
    /// 1-based position of the column within the index.
    pub position: u32,
    /// Whether the index is unique.
    pub unique: bool,
    /// Whether the index is the primary key.
    pub primary: bool,
}

/// A column as reported by the catalog, normalized by its dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    /// Table name.
    pub table: String,
    /// Column name.
    pub name: String,
    /// 1-based ordinal position.
    pub position: u32,
    /// Normalized DDL type, e.g. `VARCHAR(255)` or `ARRAY<INT64>`.
    pub data_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default literal, unquoted.
    pub default: Option<String>,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Auto-incrementing column.
    pub auto_increment: bool,
    /// Sole member of a unique secondary index.
    pub unique: bool,
    /// Character or byte length.
    pub size: Option<u64>,
    /// Numeric or fractional-second precision.
    pub precision: Option<u64>,
    /// Numeric scale.
    pub scale: Option<u64>,
    /// Normalized trailing clause or column options.
    pub extra: Option<String>,
    /// Column comment.
    pub comment: Option<String>,
    /// Indexes the column belongs to, including the primary key.
    pub indexes: Vec<IndexMembership>,
}

impl ColumnSchema {
    /// Creates a nullable column with no attributes set.
    #[must_use]
    pub fn new(table: impl Into<String>, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            position: 0,
            data_type: data_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
            size: None,
            precision: None,
            scale: None,
            extra: None,
            comment: None,
            indexes: Vec::new(),
        }
    }
}

/// The columns of one current table.
#[derive(Debug, Clone)]
pub struct CurrentTable<'a> {
    /// Table name.
    pub name: &'a str,
    /// Columns in ordinal order.
    pub columns: Vec<&'a ColumnSchema>,
}

impl<'a> CurrentTable<'a> {
    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&'a ColumnSchema> {
        self.columns.iter().copied().find(|c| c.name == name)
    }

    /// Primary key columns in key order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<String> {
        let mut key: Vec<(u32, &str)> = self
            .columns
            .iter()
            .flat_map(|c| {
                c.indexes
                    .iter()
                    .filter(|m| m.primary)
                    .map(move |m| (m.position, c.name.as_str()))
            })
            .collect();
        key.sort_unstable();
        key.into_iter().map(|(_, name)| name.to_string()).collect()
    }
}

/// Groups introspected columns by table, in table-name order.
#[must_use]
pub fn group_by_table(columns: &[ColumnSchema]) -> BTreeMap<&str, CurrentTable<'_>> {
    let mut tables: BTreeMap<&str, CurrentTable<'_>> = BTreeMap::new();
    for column in columns {
        tables
            .entry(column.table.as_str())
            .or_insert_with(|| CurrentTable {
                name: column.table.as_str(),
                columns: Vec::new(),
            })
            .columns
            .push(column);
    }
    for table in tables.values_mut() {
        table.columns.sort_by_key(|c| c.position);
    }
    tables
}
