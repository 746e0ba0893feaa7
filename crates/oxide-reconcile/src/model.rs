//! Desired schema model.
//!
//! These types describe the tables the author wants. They are usually
//! produced by a declaration parser, or loaded from a JSON
//! [`SchemaDocument`].

use std::path::Path;

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{compact, strip_option};

/// A secondary index declared on a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexSpec {
    /// Index name. Defaults to `<table>_<column>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the index is unique.
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Creates an unnamed, non-unique index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a named, non-unique index.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            unique: false,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A desired column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Declared field name.
    pub name: String,
    /// Source type spelling, e.g. `u64` or `Option<String>`.
    #[serde(rename = "type")]
    pub ty: String,
    /// Explicit nullability. `Option<T>` spellings are nullable regardless.
    #[serde(default)]
    pub nullable: bool,
    /// Column name. Defaults to the snake_case field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Column comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Unique constraint on this column alone.
    #[serde(default)]
    pub unique: bool,
    /// Name of the index backing the unique constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_index: Option<String>,
    /// Part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Auto-incrementing column.
    #[serde(default)]
    pub auto_increment: bool,
    /// Default literal, unquoted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Explicit DDL type, bypassing the type registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,
    /// Length for text and binary types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Precision for decimal and temporal types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u64>,
    /// Scale for decimal types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u64>,
    /// Free-form trailing clause (MySQL) or column options (Spanner).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    /// Secondary index membership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexSpec>,
}

impl FieldSpec {
    /// Creates a field. Nullability follows the type spelling.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            nullable: false,
            column: None,
            comment: None,
            unique: false,
            unique_index: None,
            primary_key: false,
            auto_increment: false,
            default: None,
            db_type: None,
            size: None,
            precision: None,
            scale: None,
            extra: None,
            index: None,
        }
    }

    /// Marks the field nullable even with a non-`Option` spelling.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds a unique constraint backed by a named index.
    #[must_use]
    pub fn unique_index(mut self, name: impl Into<String>) -> Self {
        self.unique = true;
        self.unique_index = Some(name.into());
        self
    }

    /// Marks the field as part of the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the field auto-incrementing.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the default literal.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Overrides the DDL type.
    #[must_use]
    pub fn db_type(mut self, db_type: impl Into<String>) -> Self {
        self.db_type = Some(db_type.into());
        self
    }

    /// Sets the size.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub fn precision(mut self, precision: u64, scale: Option<u64>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    /// Sets the trailing clause.
    #[must_use]
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// Adds the field to a secondary index.
    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.index = Some(index);
        self
    }

    /// The column name, derived from the field name when not set.
    #[must_use]
    pub fn column_name(&self) -> String {
        self.column
            .clone()
            .unwrap_or_else(|| self.name.to_case(Case::Snake))
    }

    /// Effective nullability. Primary-key columns are never nullable.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        let spelling = compact(&self.ty);
        let (_, optional) = strip_option(&spelling);
        (self.nullable || optional) && !self.primary_key
    }
}

/// A desired table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldSpec>,
    /// Table option clause appended after the table body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
}

impl TableSpec {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            option: None,
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the table option clause.
    #[must_use]
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }

    /// Primary key column names in declaration order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(FieldSpec::column_name)
            .collect()
    }
}

/// A desired schema loaded from JSON.
///
/// ```json
/// { "tables": [ { "name": "user", "fields": [
///     { "name": "id", "type": "u64", "primary_key": true, "auto_increment": true },
///     { "name": "email", "type": "String", "size": 191, "unique": true }
/// ] } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    /// Desired tables.
    pub tables: Vec<TableSpec>,
}

impl SchemaDocument {
    /// Parses a document from JSON text. Unknown keys are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a document file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
