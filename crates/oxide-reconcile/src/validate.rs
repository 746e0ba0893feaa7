//! Desired schema validation.
//!
//! Runs before any I/O. Structural problems are [`InputError`]s; constructs
//! the target backend cannot represent are reported by the dialect as
//! unsupported features.

use std::collections::{BTreeMap, BTreeSet};

use crate::dialect::DdlDialect;
use crate::error::{InputError, Result};
use crate::index::default_index_name;
use crate::model::TableSpec;

/// Validates desired tables against a dialect.
pub fn validate<D: DdlDialect + ?Sized>(dialect: &D, tables: &[TableSpec]) -> Result<()> {
    let mut names = BTreeSet::new();
    for table in tables {
        if !names.insert(table.name.as_str()) {
            return Err(InputError::DuplicateTable {
                table: table.name.clone(),
            }
            .into());
        }
        if table.fields.is_empty() {
            return Err(InputError::EmptyTable {
                table: table.name.clone(),
            }
            .into());
        }

        let mut columns = BTreeSet::new();
        for field in &table.fields {
            let column = field.column_name();
            if !columns.insert(column.clone()) {
                return Err(InputError::DuplicateColumn {
                    table: table.name.clone(),
                    column,
                }
                .into());
            }

            if field.db_type.is_none()
                && dialect
                    .types()
                    .resolve(&field.ty, field.is_nullable())
                    .is_none()
            {
                return Err(InputError::UnresolvedType {
                    table: table.name.clone(),
                    column,
                    ty: field.ty.clone(),
                }
                .into());
            }
            if field.unique_index.is_some() && !field.unique {
                return Err(InputError::invalid_tag(
                    &table.name,
                    &column,
                    "unique index name given without unique",
                )
                .into());
            }
            if field.scale.is_some() && field.precision.is_none() {
                return Err(InputError::invalid_tag(
                    &table.name,
                    &column,
                    "scale given without precision",
                )
                .into());
            }
            if field.auto_increment && field.default.is_some() {
                return Err(InputError::invalid_tag(
                    &table.name,
                    &column,
                    "auto-increment column cannot have a default",
                )
                .into());
            }

            dialect.validate_field(&table.name, field)?;
        }

        check_index_uniqueness(table)?;
        dialect.validate_table(table)?;
    }
    Ok(())
}

/// Fields sharing an index name must agree on its uniqueness.
fn check_index_uniqueness(table: &TableSpec) -> Result<()> {
    let mut declared: BTreeMap<String, bool> = BTreeMap::new();
    for field in &table.fields {
        let column = field.column_name();
        let mut uses = Vec::new();
        if field.unique {
            let name = field
                .unique_index
                .clone()
                .unwrap_or_else(|| default_index_name(&table.name, &column));
            uses.push((name, true));
        }
        if let Some(index) = &field.index {
            let name = index
                .name
                .clone()
                .unwrap_or_else(|| default_index_name(&table.name, &column));
            uses.push((name, index.unique));
        }

        for (name, unique) in uses {
            match declared.get(&name) {
                Some(&seen) if seen != unique => {
                    return Err(InputError::invalid_tag(
                        &table.name,
                        &column,
                        format!("index `{name}` is declared both unique and non-unique"),
                    )
                    .into());
                }
                _ => {
                    declared.insert(name, unique);
                }
            }
        }
    }
    Ok(())
}
