//! Schema diff engine.
//!
//! Compares desired tables with a current catalog snapshot and produces the
//! DDL statements that make the catalog match. The comparison is a pure
//! function of the two snapshots; [`diff`] only adds introspection in front
//! of it.
//!
//! Statements for one existing table are emitted in this order, so that a
//! key or index name is always released before it is reused:
//!
//! 1. primary key change, with any new column the new key needs
//! 2. index drops
//! 3. column drops
//! 4. column adds
//! 5. column alters
//! 6. index creates

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info};

use crate::catalog::{group_by_table, ColumnSchema, CurrentTable};
use crate::dialect::{DdlDialect, Dialect};
use crate::error::Result;
use crate::index::{current_indexes, desired_indexes, diff_indexes, sole_unique_columns};
use crate::model::{FieldSpec, TableSpec};
use crate::types::Resolution;
use crate::validate::validate;

/// One DDL statement of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Table the statement belongs to.
    pub table: String,
    /// DDL text, without a trailing semicolon.
    pub sql: String,
}

impl Statement {
    fn new(table: &str, sql: String) -> Self {
        Self {
            table: table.to_string(),
            sql,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Computes the statements that bring the database behind `dialect` to the
/// desired schema.
///
/// Every table of the database is considered: tables that are not desired
/// are dropped.
///
/// # Errors
///
/// Fails on invalid input, on a construct the dialect cannot express, or
/// when the catalog cannot be read.
pub async fn diff(dialect: &Dialect, desired: &[TableSpec]) -> Result<Vec<Statement>> {
    let ddl = dialect.ddl();
    validate(ddl, desired)?;

    let current = dialect.introspect(&[]).await?;
    plan_validated(ddl, desired, &current)
}

/// Computes the statements turning `current` into `desired`.
///
/// # Errors
///
/// Fails on invalid input or on a construct the dialect cannot express.
pub fn plan<D: DdlDialect + ?Sized>(
    dialect: &D,
    desired: &[TableSpec],
    current: &[ColumnSchema],
) -> Result<Vec<Statement>> {
    validate(dialect, desired)?;
    plan_validated(dialect, desired, current)
}

fn plan_validated<D: DdlDialect + ?Sized>(
    dialect: &D,
    desired: &[TableSpec],
    current: &[ColumnSchema],
) -> Result<Vec<Statement>> {
    let current_tables = group_by_table(current);
    let mut ordered: Vec<&TableSpec> = desired.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    let mut statements = Vec::new();
    let mut created = 0;
    for table in &ordered {
        let sql = match current_tables.get(table.name.as_str()) {
            None => {
                created += 1;
                let indexes: Vec<_> = desired_indexes(table).into_values().collect();
                dialect.create_table(table, &indexes)
            }
            Some(existing) => diff_table(dialect, table, existing)?,
        };
        statements.extend(sql.into_iter().map(|s| Statement::new(&table.name, s)));
    }

    let wanted: BTreeSet<&str> = ordered.iter().map(|t| t.name.as_str()).collect();
    let mut dropped = 0;
    for (name, existing) in &current_tables {
        if wanted.contains(name) {
            continue;
        }
        dropped += 1;
        let indexes: Vec<_> = current_indexes(existing).into_values().collect();
        let sql = dialect.drop_table(name, &indexes);
        statements.extend(sql.into_iter().map(|s| Statement::new(name, s)));
    }

    info!(
        dialect = dialect.name(),
        desired = desired.len(),
        current = current_tables.len(),
        created,
        dropped,
        statements = statements.len(),
        "Computed schema diff"
    );
    Ok(statements)
}

/// Per-table statement buckets, in emission order.
#[derive(Debug, Default)]
struct TablePlan {
    primary_key: Vec<String>,
    drop_indexes: Vec<String>,
    drop_columns: Vec<String>,
    add_columns: Vec<String>,
    alter_columns: Vec<String>,
    create_indexes: Vec<String>,
}

impl TablePlan {
    fn into_statements(self) -> Vec<String> {
        let mut statements = self.primary_key;
        statements.extend(self.drop_indexes);
        statements.extend(self.drop_columns);
        statements.extend(self.add_columns);
        statements.extend(self.alter_columns);
        statements.extend(self.create_indexes);
        statements
    }
}

fn diff_table<D: DdlDialect + ?Sized>(
    dialect: &D,
    table: &TableSpec,
    current: &CurrentTable<'_>,
) -> Result<Vec<String>> {
    let mut plan = TablePlan::default();

    let wanted_key = table.primary_key();
    let current_key = current.primary_key();
    let mut added_with_key = BTreeSet::new();
    if wanted_key != current_key {
        debug!(
            table = %table.name,
            from = ?current_key,
            to = ?wanted_key,
            "Primary key changed"
        );
        let new_key_fields: Vec<&FieldSpec> = table
            .fields
            .iter()
            .filter(|f| {
                let name = f.column_name();
                wanted_key.contains(&name) && current.column(&name).is_none()
            })
            .collect();
        let change =
            dialect.change_primary_key(&table.name, &current_key, &wanted_key, &new_key_fields)?;
        plan.primary_key = change.statements;
        added_with_key.extend(change.added_columns);
    }

    let wanted_indexes = desired_indexes(table);
    let unique_columns = sole_unique_columns(&wanted_indexes);

    let declared: BTreeSet<String> = table.fields.iter().map(FieldSpec::column_name).collect();
    for column in &current.columns {
        if !declared.contains(&column.name) {
            plan.drop_columns
                .extend(dialect.drop_column(&table.name, &column.name));
        }
    }

    for field in &table.fields {
        let name = field.column_name();
        match current.column(&name) {
            None if added_with_key.contains(&name) => {}
            None => plan.add_columns.extend(dialect.add_column(&table.name, field)?),
            Some(column) => {
                let existing = dialect.field_from_column(column);
                if column_changed(dialect, field, unique_columns.contains(&name), column, &existing) {
                    debug!(table = %table.name, column = %name, "Column changed");
                    plan.alter_columns
                        .extend(dialect.alter_column(&table.name, &existing, field)?);
                }
            }
        }
    }

    let changes = diff_indexes(&wanted_indexes, &current_indexes(current));
    for name in &changes.drop {
        plan.drop_indexes.extend(dialect.drop_index(&table.name, name));
    }
    for index in &changes.create {
        plan.create_indexes.extend(dialect.create_index(
            &table.name,
            &index.name,
            &index.columns,
            index.unique,
        ));
    }

    Ok(plan.into_statements())
}

/// Whether a declared field differs from the column it maps to.
///
/// The declared type must be in the equivalence set of the stored type,
/// and every other attribute must match the field reconstructed from the
/// column. The unique flag is computed from index membership on both sides.
fn column_changed<D: DdlDialect + ?Sized>(
    dialect: &D,
    field: &FieldSpec,
    unique: bool,
    column: &ColumnSchema,
    existing: &FieldSpec,
) -> bool {
    let nullable = field.is_nullable();
    if field.db_type.is_none() {
        if let Some(Resolution::Canonical(_)) = dialect.types().resolve(&field.ty, nullable) {
            if !dialect.types().equivalent(&field.ty, &column.data_type, nullable) {
                return true;
            }
        }
    }

    let mut wanted = dialect.attributes(field);
    wanted.unique = unique;
    let mut stored = dialect.attributes(existing);
    stored.unique = column.unique;
    wanted != stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IndexMembership;
    use crate::dialect::{MySqlDialect, SpannerDialect};
    use crate::error::SyncError;
    use crate::model::IndexSpec;

    fn column(table: &str, name: &str, position: u32, data_type: &str) -> ColumnSchema {
        let mut column = ColumnSchema::new(table, name, data_type);
        column.position = position;
        column.nullable = false;
        column
    }

    fn primary(mut column: ColumnSchema, position: u32) -> ColumnSchema {
        column.primary_key = true;
        column.indexes.push(IndexMembership {
            name: "PRIMARY".to_string(),
            position,
            unique: true,
            primary: true,
        });
        column
    }

    fn sql(statements: &[Statement]) -> Vec<&str> {
        statements.iter().map(|s| s.sql.as_str()).collect()
    }

    fn user_id() -> ColumnSchema {
        let mut id = primary(column("user", "id", 1, "BIGINT UNSIGNED"), 1);
        id.auto_increment = true;
        id
    }

    #[test]
    fn test_statement_display() {
        let statement = Statement::new("user", "DROP TABLE `user`".to_string());
        assert_eq!(statement.to_string(), "DROP TABLE `user`");
    }

    #[test]
    fn test_create_missing_table() {
        let desired = vec![TableSpec::new("user").field(FieldSpec::new("id", "u64").primary_key())];
        let statements = plan(&MySqlDialect::default(), &desired, &[]).unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].table, "user");
        assert!(statements[0].sql.starts_with("CREATE TABLE `user`"));
    }

    #[test]
    fn test_matching_table_is_noop() {
        let desired = vec![TableSpec::new("user")
            .field(FieldSpec::new("id", "u64").primary_key().auto_increment())];
        let statements = plan(&MySqlDialect::default(), &desired, &[user_id()]).unwrap();
        assert!(statements.is_empty());
    }

    #[test]
    fn test_add_and_drop_columns() {
        let desired = vec![TableSpec::new("user")
            .field(FieldSpec::new("id", "u64").primary_key().auto_increment())
            .field(FieldSpec::new("age", "Option<i32>"))];
        let current = vec![user_id(), column("user", "legacy", 2, "INT")];

        let statements = plan(&MySqlDialect::default(), &desired, &current).unwrap();
        assert_eq!(
            sql(&statements),
            vec![
                "ALTER TABLE `user` DROP `legacy`",
                "ALTER TABLE `user` ADD `age` INT NULL",
            ]
        );
    }

    #[test]
    fn test_changed_column_is_modified() {
        let desired = vec![TableSpec::new("user")
            .field(FieldSpec::new("id", "u64").primary_key().auto_increment())
            .field(FieldSpec::new("name", "String").size(100))];
        let current = vec![user_id(), {
            let mut name = column("user", "name", 2, "VARCHAR(40)");
            name.size = Some(40);
            name
        }];

        let statements = plan(&MySqlDialect::default(), &desired, &current).unwrap();
        assert_eq!(
            sql(&statements),
            vec!["ALTER TABLE `user` MODIFY `name` VARCHAR(100) NOT NULL"]
        );
    }

    #[test]
    fn test_type_outside_equivalence_set_is_modified() {
        let desired = vec![TableSpec::new("user")
            .field(FieldSpec::new("id", "u64").primary_key().auto_increment())
            .field(FieldSpec::new("score", "i64"))];
        let current = vec![user_id(), column("user", "score", 2, "INT")];

        let statements = plan(&MySqlDialect::default(), &desired, &current).unwrap();
        assert_eq!(
            sql(&statements),
            vec!["ALTER TABLE `user` MODIFY `score` BIGINT NOT NULL"]
        );
    }

    #[test]
    fn test_primary_key_drop_precedes_unique_drop() {
        let desired = vec![TableSpec::new("user")
            .field(FieldSpec::new("id", "u64"))
            .field(FieldSpec::new("code", "String").primary_key())];
        let mut id = primary(column("user", "id", 1, "BIGINT UNSIGNED"), 1);
        id.unique = true;
        id.indexes.push(IndexMembership {
            name: "user_id".to_string(),
            position: 1,
            unique: true,
            primary: false,
        });
        let mut code = column("user", "code", 2, "VARCHAR(255)");
        code.size = Some(255);

        let statements = plan(&MySqlDialect::default(), &desired, &[id, code]).unwrap();
        assert_eq!(
            sql(&statements),
            vec![
                "ALTER TABLE `user` DROP PRIMARY KEY, ADD PRIMARY KEY (`code`)",
                "DROP INDEX `user_id` ON `user`",
                "ALTER TABLE `user` MODIFY `id` BIGINT UNSIGNED NOT NULL",
                "ALTER TABLE `user` MODIFY `code` VARCHAR(255) NOT NULL",
            ]
        );
    }

    #[test]
    fn test_index_changes_bracket_column_changes() {
        let desired = vec![TableSpec::new("user")
            .field(FieldSpec::new("id", "u64").primary_key().auto_increment())
            .field(FieldSpec::new("age", "i32").index(IndexSpec::named("user_age_idx")))];
        let mut age = column("user", "age", 2, "INT");
        age.indexes.push(IndexMembership {
            name: "age".to_string(),
            position: 1,
            unique: false,
            primary: false,
        });

        let statements = plan(&MySqlDialect::default(), &desired, &[user_id(), age]).unwrap();
        assert_eq!(
            sql(&statements),
            vec![
                "DROP INDEX `age` ON `user`",
                "CREATE INDEX `user_age_idx` ON `user` (`age`)",
            ]
        );
    }

    #[test]
    fn test_undesired_tables_dropped_in_order() {
        let desired = vec![TableSpec::new("user")
            .field(FieldSpec::new("id", "u64").primary_key().auto_increment())];
        let current = vec![
            user_id(),
            column("zebra", "id", 1, "INT"),
            column("audit", "id", 1, "INT"),
        ];

        let statements = plan(&MySqlDialect::default(), &desired, &current).unwrap();
        assert_eq!(
            sql(&statements),
            vec!["DROP TABLE `audit`", "DROP TABLE `zebra`"]
        );
        assert_eq!(statements[0].table, "audit");
    }

    #[test]
    fn test_new_key_column_is_added_with_the_key() {
        let desired = vec![TableSpec::new("log")
            .field(FieldSpec::new("id", "u64").primary_key().auto_increment())
            .field(FieldSpec::new("message", "String"))
            .field(FieldSpec::new("level", "Option<i32>"))];
        let mut message = column("log", "message", 1, "VARCHAR(255)");
        message.size = Some(255);

        let statements = plan(&MySqlDialect::default(), &desired, &[message]).unwrap();
        assert_eq!(
            sql(&statements),
            vec![
                "ALTER TABLE `log` ADD `id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT, \
                 ADD PRIMARY KEY (`id`)",
                "ALTER TABLE `log` ADD `level` INT NULL",
            ]
        );
    }

    #[test]
    fn test_spanner_rejects_primary_key_change() {
        let desired = vec![TableSpec::new("user")
            .field(FieldSpec::new("id", "i64"))
            .field(FieldSpec::new("email", "String").primary_key())];
        let current = vec![
            primary(column("user", "id", 1, "INT64"), 1),
            column("user", "email", 2, "STRING(MAX)"),
        ];

        let err = plan(&SpannerDialect::new(), &desired, &current).unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedFeature { .. }));
    }

    #[test]
    fn test_invalid_input_fails_before_planning() {
        let desired = vec![TableSpec::new("user").field(FieldSpec::new("m", "HashMap<String, i64>"))];
        let err = plan(&MySqlDialect::default(), &desired, &[]).unwrap_err();
        assert!(matches!(err, SyncError::Input(_)));
    }
}
