//! Cloud Spanner dialect.
//!
//! Spanner has no defaults, no auto-increment and no way to change a
//! primary key after creation. Nullability changes are their own `ALTER
//! COLUMN` statement, and trailing column clauses are named options:
//!
//! ```text
//! `created_at` TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true)
//! ```

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::catalog::{ColumnSchema, IndexMembership};
use crate::error::{InputError, IntrospectionError, Result, SyncError};
use crate::index::IndexDef;
use crate::model::{FieldSpec, TableSpec};
use crate::types::{base_type, normalize_ddl, Resolution, TypeEquivalence, TypeRegistry};

use super::admin::SpannerAdmin;
use super::{DdlDialect, PrimaryKeyChange};

const MAX_STRING: u64 = 2_621_440;
const MAX_BYTES: u64 = 10_485_760;

const CATALOG_QUERY: &str = "SELECT c.TABLE_NAME, c.COLUMN_NAME, c.ORDINAL_POSITION, \
    c.IS_NULLABLE, c.SPANNER_TYPE, i.INDEX_NAME, ic.ORDINAL_POSITION, i.INDEX_TYPE, \
    i.IS_UNIQUE, o.OPTION_NAME, o.OPTION_VALUE \
    FROM INFORMATION_SCHEMA.COLUMNS AS c \
    LEFT JOIN INFORMATION_SCHEMA.INDEX_COLUMNS AS ic \
    ON ic.TABLE_SCHEMA = c.TABLE_SCHEMA AND ic.TABLE_NAME = c.TABLE_NAME \
    AND ic.COLUMN_NAME = c.COLUMN_NAME \
    LEFT JOIN INFORMATION_SCHEMA.INDEXES AS i \
    ON i.TABLE_SCHEMA = ic.TABLE_SCHEMA AND i.TABLE_NAME = ic.TABLE_NAME \
    AND i.INDEX_NAME = ic.INDEX_NAME AND i.SPANNER_IS_MANAGED = FALSE \
    LEFT JOIN INFORMATION_SCHEMA.COLUMN_OPTIONS AS o \
    ON o.TABLE_SCHEMA = c.TABLE_SCHEMA AND o.TABLE_NAME = c.TABLE_NAME \
    AND o.COLUMN_NAME = c.COLUMN_NAME \
    WHERE c.TABLE_SCHEMA = ''";

/// Cloud Spanner DDL dialect.
#[derive(Debug, Clone)]
pub struct SpannerDialect {
    types: TypeRegistry,
}

impl Default for SpannerDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SpannerDialect {
    /// Creates a Spanner dialect.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: TypeRegistry::new(builtin_types()).with_array_syntax("ARRAY<", ">"),
        }
    }

    /// Registers additional type equivalences.
    #[must_use]
    pub fn with_types(mut self, entries: Vec<TypeEquivalence>) -> Self {
        self.types.register(entries);
        self
    }

    fn sized(&self, ddl: &str, size: Option<u64>) -> String {
        let Some(size) = size else {
            return ddl.to_string();
        };
        if let Some(element) = self.types.array_element(ddl) {
            return format!("ARRAY<{}>", self.sized(element, Some(size)));
        }
        match base_type(ddl).as_str() {
            "STRING" if size <= MAX_STRING => format!("STRING({size})"),
            "BYTES" if size <= MAX_BYTES => format!("BYTES({size})"),
            _ => ddl.to_string(),
        }
    }

    fn unsupported(&self, table: &str, column: Option<&str>, feature: &str) -> SyncError {
        SyncError::unsupported(self.name(), table, column, feature)
    }

    /// Column options with cleared (`null`) entries removed.
    fn options(extra: Option<&str>) -> BTreeMap<String, String> {
        let mut options = extra
            .and_then(|e| parse_options(e).ok())
            .unwrap_or_default();
        options.retain(|_, v| v != "null");
        options
    }

    /// The `INFORMATION_SCHEMA` query for the given tables, or all tables.
    #[must_use]
    pub fn catalog_query(&self, tables: &[&str]) -> String {
        let mut sql = String::from(CATALOG_QUERY);
        if !tables.is_empty() {
            let names: Vec<String> = tables.iter().map(|t| self.quote_literal(t)).collect();
            sql.push_str(&format!(" AND c.TABLE_NAME IN ({})", names.join(", ")));
        }
        sql.push_str(" ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION, i.INDEX_NAME");
        sql
    }

    /// Reads the current schema through the admin client.
    pub async fn introspect(
        &self,
        admin: &dyn SpannerAdmin,
        tables: &[&str],
    ) -> std::result::Result<Vec<ColumnSchema>, IntrospectionError> {
        let rows = admin.execute_sql(&self.catalog_query(tables)).await?;
        let schema = self.columns_from_rows(&rows)?;
        info!(
            rows = rows.len(),
            columns = schema.len(),
            "Introspected Spanner schema"
        );
        Ok(schema)
    }

    /// Builds normalized columns from the rows of [`catalog_query`].
    ///
    /// The join yields one row per (column, index, option) combination;
    /// rows of one column are merged.
    ///
    /// [`catalog_query`]: Self::catalog_query
    pub fn columns_from_rows(
        &self,
        rows: &[Vec<Value>],
    ) -> std::result::Result<Vec<ColumnSchema>, IntrospectionError> {
        let mut columns: Vec<ColumnSchema> = Vec::new();
        let mut slots: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut options: BTreeMap<usize, BTreeMap<String, String>> = BTreeMap::new();

        for row in rows {
            let table = text(row, 0)
                .ok_or_else(|| IntrospectionError::malformed("?", "?", "missing TABLE_NAME"))?;
            let name = text(row, 1)
                .ok_or_else(|| IntrospectionError::malformed(table, "?", "missing COLUMN_NAME"))?;
            let malformed = |reason: String| IntrospectionError::malformed(table, name, reason);

            let key = (table.to_string(), name.to_string());
            let slot = match slots.get(&key) {
                Some(&slot) => slot,
                None => {
                    let position = integer(row, 2)
                        .map_err(malformed)?
                        .ok_or_else(|| malformed("missing ORDINAL_POSITION".to_string()))?;
                    let nullable = match text(row, 3) {
                        Some("YES") => true,
                        Some("NO") => false,
                        other => {
                            return Err(malformed(format!(
                                "unexpected IS_NULLABLE value {other:?}"
                            )))
                        }
                    };
                    let data_type = text(row, 4)
                        .ok_or_else(|| malformed("missing SPANNER_TYPE".to_string()))?;

                    let mut column = ColumnSchema::new(table, name, normalize_ddl(data_type));
                    column.position = position;
                    column.nullable = nullable;
                    column.size = declared_size(&column.data_type);
                    columns.push(column);
                    slots.insert(key, columns.len() - 1);
                    columns.len() - 1
                }
            };

            let index_position = integer(row, 6).map_err(malformed)?;
            if let (Some(index), Some(position)) = (text(row, 5), index_position) {
                let membership = IndexMembership {
                    name: index.to_string(),
                    position,
                    unique: boolean(row, 8),
                    primary: text(row, 7) == Some("PRIMARY_KEY"),
                };
                if !columns[slot].indexes.contains(&membership) {
                    columns[slot].indexes.push(membership);
                }
            }
            if let (Some(option), Some(value)) = (text(row, 9), text(row, 10)) {
                options
                    .entry(slot)
                    .or_default()
                    .insert(option.to_ascii_lowercase(), value.to_string());
            }
        }

        let mut index_sizes: BTreeMap<(String, String), usize> = BTreeMap::new();
        for column in &columns {
            for membership in &column.indexes {
                *index_sizes
                    .entry((column.table.clone(), membership.name.clone()))
                    .or_default() += 1;
            }
        }

        for (slot, column) in columns.iter_mut().enumerate() {
            let unique = column.indexes.iter().any(|m| {
                m.unique
                    && !m.primary
                    && index_sizes.get(&(column.table.clone(), m.name.clone())) == Some(&1)
            });
            column.unique = unique;
            column.primary_key = column.indexes.iter().any(|m| m.primary);
            if let Some(options) = options.get(&slot) {
                let extra: Vec<String> = options.iter().map(|(k, v)| format!("{k}={v}")).collect();
                column.extra = self.normalize_extra(Some(&extra.join(", ")));
            }
        }

        columns.sort_by(|a, b| (a.table.as_str(), a.position).cmp(&(b.table.as_str(), b.position)));
        Ok(columns)
    }
}

impl DdlDialect for SpannerDialect {
    fn name(&self) -> &'static str {
        "spanner"
    }

    fn types(&self) -> &TypeRegistry {
        &self.types
    }

    fn type_of(&self, field: &FieldSpec) -> String {
        if let Some(db_type) = &field.db_type {
            return normalize_ddl(db_type);
        }
        match self.types.resolve(&field.ty, field.is_nullable()) {
            Some(Resolution::Canonical(ddl)) => self.sized(&ddl, field.size),
            Some(Resolution::Override(ddl)) => ddl,
            None => normalize_ddl(&field.ty),
        }
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    }

    fn column_definition(&self, field: &FieldSpec) -> String {
        let mut sql = format!("{} {}", self.quote(&field.column_name()), self.type_of(field));
        if !field.is_nullable() {
            sql.push_str(" NOT NULL");
        }
        if let Some(options) = self.normalize_extra(field.extra.as_deref()) {
            sql.push_str(&format!(" OPTIONS ({options})"));
        }
        sql
    }

    fn create_table(&self, table: &TableSpec, indexes: &[IndexDef]) -> Vec<String> {
        let columns: Vec<String> = table
            .fields
            .iter()
            .map(|f| self.column_definition(f))
            .collect();

        let mut sql = format!(
            "CREATE TABLE {} (\n  {}\n) PRIMARY KEY ({})",
            self.quote(&table.name),
            columns.join(",\n  "),
            self.quote_list(&table.primary_key())
        );
        let option = table
            .option
            .as_deref()
            .map(|o| o.trim().trim_start_matches(',').trim())
            .filter(|o| !o.is_empty());
        if let Some(option) = option {
            sql.push_str(", ");
            sql.push_str(option);
        }

        let mut statements = vec![sql];
        for index in indexes {
            statements.extend(self.create_index(&table.name, &index.name, &index.columns, index.unique));
        }
        statements
    }

    fn add_column(&self, table: &str, field: &FieldSpec) -> Result<Vec<String>> {
        if !field.is_nullable() {
            return Err(self.unsupported(
                table,
                Some(&field.column_name()),
                "adding a NOT NULL column to an existing table",
            ));
        }
        Ok(vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote(table),
            self.column_definition(field)
        )])
    }

    fn alter_column(&self, table: &str, old: &FieldSpec, new: &FieldSpec) -> Result<Vec<String>> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.quote(table),
            self.quote(&new.column_name())
        );
        let new_type = self.type_of(new);
        let mut statements = Vec::new();

        // A type change keeps the old nullability; nullability is its own statement.
        if normalize_ddl(&self.type_of(old)) != normalize_ddl(&new_type) {
            let not_null = if old.is_nullable() { "" } else { " NOT NULL" };
            statements.push(format!("{prefix} {new_type}{not_null}"));
        }
        if old.is_nullable() != new.is_nullable() {
            let not_null = if new.is_nullable() { "" } else { " NOT NULL" };
            statements.push(format!("{prefix} {new_type}{not_null}"));
        }

        let before = Self::options(old.extra.as_deref());
        let after = Self::options(new.extra.as_deref());
        let mut changes: BTreeMap<&str, &str> = BTreeMap::new();
        for (name, value) in &after {
            if before.get(name) != Some(value) {
                changes.insert(name, value);
            }
        }
        for name in before.keys() {
            if !after.contains_key(name) {
                changes.insert(name, "null");
            }
        }
        if !changes.is_empty() {
            let options: Vec<String> = changes.iter().map(|(k, v)| format!("{k}={v}")).collect();
            statements.push(format!("{prefix} SET OPTIONS ({})", options.join(", ")));
        }

        Ok(statements)
    }

    fn drop_index(&self, _table: &str, name: &str) -> Vec<String> {
        vec![format!("DROP INDEX {}", self.quote(name))]
    }

    fn drop_table(&self, table: &str, indexes: &[IndexDef]) -> Vec<String> {
        let mut statements: Vec<String> = indexes
            .iter()
            .flat_map(|index| self.drop_index(table, &index.name))
            .collect();
        statements.push(format!("DROP TABLE {}", self.quote(table)));
        statements
    }

    fn change_primary_key(
        &self,
        table: &str,
        _from: &[String],
        _to: &[String],
        _added: &[&FieldSpec],
    ) -> Result<PrimaryKeyChange> {
        Err(self.unsupported(table, None, "changing the primary key"))
    }

    fn validate_table(&self, table: &TableSpec) -> Result<()> {
        if table.primary_key().is_empty() {
            return Err(self.unsupported(&table.name, None, "a table without a primary key"));
        }
        Ok(())
    }

    fn validate_field(&self, table: &str, field: &FieldSpec) -> Result<()> {
        let column = field.column_name();
        if field.default.is_some() {
            return Err(self.unsupported(table, Some(&column), "default values"));
        }
        if field.auto_increment {
            return Err(self.unsupported(table, Some(&column), "auto-increment"));
        }
        if let Some(extra) = field.extra.as_deref() {
            parse_options(extra).map_err(|reason| InputError::invalid_tag(table, &column, reason))?;
        }
        if field.comment.is_some() {
            debug!(table, column = %column, "Ignoring column comment");
        }
        Ok(())
    }

    fn normalize_default(&self, _field: &FieldSpec) -> Option<String> {
        None
    }

    fn normalize_extra(&self, extra: Option<&str>) -> Option<String> {
        let options = Self::options(extra);
        let rendered: Vec<String> = options.iter().map(|(k, v)| format!("{k}={v}")).collect();
        (!rendered.is_empty()).then(|| rendered.join(", "))
    }

    fn normalize_comment(&self, _comment: Option<&str>) -> Option<String> {
        None
    }
}

fn builtin_types() -> Vec<TypeEquivalence> {
    vec![
        TypeEquivalence::new("BOOL", &["bool"]),
        TypeEquivalence::new(
            "INT64",
            &["i64", "i32", "i16", "i8", "u32", "u16", "u8", "isize"],
        ),
        TypeEquivalence::new("FLOAT64", &["f64"]),
        TypeEquivalence::new("FLOAT32", &["f32"]),
        TypeEquivalence::new("STRING(MAX)", &["String"]),
        TypeEquivalence::new("BYTES(MAX)", &["Vec<u8>"]),
        TypeEquivalence::new(
            "TIMESTAMP",
            &[
                "DateTime<Utc>",
                "chrono::DateTime<Utc>",
                "chrono::DateTime<chrono::Utc>",
                "time::OffsetDateTime",
            ],
        ),
        TypeEquivalence::new("DATE", &["NaiveDate", "chrono::NaiveDate", "time::Date"]),
        TypeEquivalence::new("NUMERIC", &["Decimal", "rust_decimal::Decimal"]),
        TypeEquivalence::new("JSON", &["serde_json::Value", "Value"]),
    ]
}

/// Parses `name=value, ...`, optionally wrapped in `OPTIONS (...)`.
fn parse_options(extra: &str) -> std::result::Result<BTreeMap<String, String>, String> {
    let mut body = extra.trim();
    if body
        .get(..7)
        .is_some_and(|head| head.eq_ignore_ascii_case("OPTIONS"))
    {
        body = body[7..]
            .trim()
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .ok_or_else(|| format!("malformed option list `{extra}`"))?
            .trim();
    }

    let mut options = BTreeMap::new();
    for entry in body.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, value) = entry
            .split_once('=')
            .map(|(n, v)| (n.trim(), v.trim()))
            .filter(|(n, v)| !n.is_empty() && !v.is_empty())
            .ok_or_else(|| format!("option `{entry}` is not of the form name=value"))?;

        let lowered = value.to_ascii_lowercase();
        let value = if matches!(lowered.as_str(), "true" | "false" | "null") {
            lowered
        } else {
            value.to_string()
        };
        options.insert(name.to_ascii_lowercase(), value);
    }
    Ok(options)
}

/// Size of the innermost `STRING(n)` or `BYTES(n)`, `None` for `MAX`.
fn declared_size(ddl: &str) -> Option<u64> {
    let open = ddl.rfind('(')?;
    let close = open + ddl[open..].find(')')?;
    ddl[open + 1..close].parse().ok()
}

fn text(row: &[Value], index: usize) -> Option<&str> {
    row.get(index).and_then(Value::as_str)
}

fn boolean(row: &[Value], index: usize) -> bool {
    match row.get(index) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// INT64 values arrive as JSON strings.
fn integer(row: &[Value], index: usize) -> std::result::Result<Option<u32>, String> {
    match row.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| format!("`{s}` is not a valid position")),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| format!("`{n}` is not a valid position")),
        Some(other) => Err(format!("unexpected value {other}")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(
        table: &str,
        column: &str,
        position: u32,
        nullable: bool,
        ty: &str,
        index: Option<(&str, u32, &str, bool)>,
        option: Option<(&str, &str)>,
    ) -> Vec<Value> {
        let (index_name, index_position, index_type, unique) = match index {
            Some((n, p, t, u)) => (json!(n), json!(p.to_string()), json!(t), json!(u)),
            None => (Value::Null, Value::Null, Value::Null, Value::Null),
        };
        let (option_name, option_value) = match option {
            Some((n, v)) => (json!(n), json!(v)),
            None => (Value::Null, Value::Null),
        };
        vec![
            json!(table),
            json!(column),
            json!(position.to_string()),
            json!(if nullable { "YES" } else { "NO" }),
            json!(ty),
            index_name,
            index_position,
            index_type,
            unique,
            option_name,
            option_value,
        ]
    }

    #[test]
    fn test_type_of() {
        let dialect = SpannerDialect::new();
        assert_eq!(dialect.type_of(&FieldSpec::new("n", "u32")), "INT64");
        assert_eq!(dialect.type_of(&FieldSpec::new("n", "String")), "STRING(MAX)");
        assert_eq!(
            dialect.type_of(&FieldSpec::new("n", "String").size(64)),
            "STRING(64)"
        );
        assert_eq!(
            dialect.type_of(&FieldSpec::new("n", "String").size(5_000_000)),
            "STRING(MAX)"
        );
        assert_eq!(dialect.type_of(&FieldSpec::new("n", "Vec<u8>")), "BYTES(MAX)");
        assert_eq!(
            dialect.type_of(&FieldSpec::new("n", "Option<Vec<String>>").size(16)),
            "ARRAY<STRING(16)>"
        );
        assert_eq!(dialect.type_of(&FieldSpec::new("n", "Vec<i64>")), "ARRAY<INT64>");
    }

    #[test]
    fn test_u64_has_no_canonical_type() {
        let dialect = SpannerDialect::new();
        let resolved = dialect.types().resolve("u64", false).unwrap();
        assert!(!resolved.is_canonical());
    }

    #[test]
    fn test_create_table() {
        let dialect = SpannerDialect::new();
        let table = TableSpec::new("album")
            .field(FieldSpec::new("singer_id", "i64").primary_key())
            .field(FieldSpec::new("album_id", "i64").primary_key())
            .field(FieldSpec::new("title", "Option<String>"))
            .field(
                FieldSpec::new("updated_at", "DateTime<Utc>")
                    .extra("allow_commit_timestamp = TRUE"),
            )
            .option("INTERLEAVE IN PARENT singer ON DELETE CASCADE");
        let indexes = vec![IndexDef {
            name: "album_title".to_string(),
            columns: vec!["title".to_string()],
            unique: false,
        }];

        let sql = dialect.create_table(&table, &indexes);
        assert_eq!(sql.len(), 2);
        assert_eq!(
            sql[0],
            "CREATE TABLE `album` (\n  \
             `singer_id` INT64 NOT NULL,\n  \
             `album_id` INT64 NOT NULL,\n  \
             `title` STRING(MAX),\n  \
             `updated_at` TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true)\n\
             ) PRIMARY KEY (`singer_id`, `album_id`), \
             INTERLEAVE IN PARENT singer ON DELETE CASCADE"
        );
        assert_eq!(sql[1], "CREATE INDEX `album_title` ON `album` (`title`)");
    }

    #[test]
    fn test_add_not_null_column_is_unsupported() {
        let dialect = SpannerDialect::new();
        let err = dialect
            .add_column("user", &FieldSpec::new("age", "i64"))
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedFeature { .. }));

        let sql = dialect
            .add_column("user", &FieldSpec::new("age", "Option<i64>"))
            .unwrap();
        assert_eq!(sql, vec!["ALTER TABLE `user` ADD COLUMN `age` INT64"]);
    }

    #[test]
    fn test_alter_type_and_nullability_are_separate() {
        let dialect = SpannerDialect::new();
        let old = FieldSpec::new("name", "Option<String>").size(10);
        let new = FieldSpec::new("name", "String").size(20);

        let sql = dialect.alter_column("user", &old, &new).unwrap();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE `user` ALTER COLUMN `name` STRING(20)",
                "ALTER TABLE `user` ALTER COLUMN `name` STRING(20) NOT NULL",
            ]
        );
    }

    #[test]
    fn test_alter_type_keeps_not_null() {
        let dialect = SpannerDialect::new();
        let old = FieldSpec::new("name", "String").size(10);
        let new = FieldSpec::new("name", "String");

        let sql = dialect.alter_column("user", &old, &new).unwrap();
        assert_eq!(
            sql,
            vec!["ALTER TABLE `user` ALTER COLUMN `name` STRING(MAX) NOT NULL"]
        );
    }

    #[test]
    fn test_alter_options_clears_with_null() {
        let dialect = SpannerDialect::new();
        let old = FieldSpec::new("at", "Option<DateTime<Utc>>").extra("allow_commit_timestamp=true");
        let new = FieldSpec::new("at", "Option<DateTime<Utc>>");

        let sql = dialect.alter_column("event", &old, &new).unwrap();
        assert_eq!(
            sql,
            vec!["ALTER TABLE `event` ALTER COLUMN `at` SET OPTIONS (allow_commit_timestamp=null)"]
        );
        assert!(dialect.alter_column("event", &new, &new).unwrap().is_empty());
    }

    #[test]
    fn test_primary_key_changes_are_unsupported() {
        let dialect = SpannerDialect::new();
        let id = vec!["id".to_string()];
        assert!(dialect.change_primary_key("user", &id, &[], &[]).is_err());
        assert!(dialect.change_primary_key("user", &[], &id, &[]).is_err());
    }

    #[test]
    fn test_drop_table_drops_indexes_first() {
        let dialect = SpannerDialect::new();
        let indexes = vec![IndexDef {
            name: "user_email".to_string(),
            columns: vec!["email".to_string()],
            unique: true,
        }];
        assert_eq!(
            dialect.drop_table("user", &indexes),
            vec!["DROP INDEX `user_email`", "DROP TABLE `user`"]
        );
    }

    #[test]
    fn test_validate_field() {
        let dialect = SpannerDialect::new();
        let err = dialect
            .validate_field("user", &FieldSpec::new("id", "i64").auto_increment())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "auto-increment is not supported by spanner (column `user.id`)"
        );

        let err = dialect
            .validate_field("user", &FieldSpec::new("n", "i64").default_value("0"))
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedFeature { .. }));

        let err = dialect
            .validate_field("user", &FieldSpec::new("n", "i64").extra("NOT NULL"))
            .unwrap_err();
        assert!(matches!(err, SyncError::Input(InputError::InvalidTag { .. })));

        assert!(dialect
            .validate_field("user", &FieldSpec::new("n", "i64").comment("ignored"))
            .is_ok());
    }

    #[test]
    fn test_validate_table_requires_primary_key() {
        let dialect = SpannerDialect::new();
        let table = TableSpec::new("log").field(FieldSpec::new("line", "String"));
        assert!(matches!(
            dialect.validate_table(&table),
            Err(SyncError::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_parse_options() {
        let options = parse_options("OPTIONS (Allow_Commit_Timestamp = TRUE)").unwrap();
        assert_eq!(options.get("allow_commit_timestamp").map(String::as_str), Some("true"));
        assert!(parse_options("").unwrap().is_empty());
        assert!(parse_options("OPTIONS allow_commit_timestamp=true").is_err());
        assert!(parse_options("allow_commit_timestamp").is_err());
    }

    #[test]
    fn test_catalog_query_filters_tables() {
        let dialect = SpannerDialect::new();
        let sql = dialect.catalog_query(&["user", "o'brien"]);
        assert!(sql.contains("AND c.TABLE_NAME IN ('user', 'o\\'brien')"));
        assert!(sql.contains("SPANNER_IS_MANAGED = FALSE"));
        assert!(!dialect.catalog_query(&[]).contains("IN ("));
    }

    #[test]
    fn test_columns_from_rows_merges_join_rows() {
        let dialect = SpannerDialect::new();
        let rows = vec![
            row("user", "id", 1, false, "INT64", Some(("PRIMARY_KEY", 1, "PRIMARY_KEY", true)), None),
            row("user", "email", 2, false, "STRING(191)", Some(("user_email", 1, "INDEX", true)), None),
            row(
                "user",
                "seen_at",
                3,
                true,
                "TIMESTAMP",
                None,
                Some(("allow_commit_timestamp", "TRUE")),
            ),
            row(
                "user",
                "seen_at",
                3,
                true,
                "TIMESTAMP",
                None,
                Some(("allow_commit_timestamp", "TRUE")),
            ),
            row("user", "tags", 4, true, "ARRAY<STRING(MAX)>", None, None),
        ];

        let columns = dialect.columns_from_rows(&rows).unwrap();
        assert_eq!(columns.len(), 4);

        assert!(columns[0].primary_key);
        assert!(!columns[0].unique);
        assert_eq!(columns[1].size, Some(191));
        assert!(columns[1].unique);
        assert_eq!(columns[2].extra.as_deref(), Some("allow_commit_timestamp=true"));
        assert!(columns[2].indexes.is_empty());
        assert_eq!(columns[3].data_type, "ARRAY<STRING(MAX)>");
        assert_eq!(columns[3].size, None);
    }

    #[test]
    fn test_columns_from_rows_rejects_bad_nullability() {
        let dialect = SpannerDialect::new();
        let mut bad = row("user", "id", 1, false, "INT64", None, None);
        bad[3] = json!("SOMETIMES");
        assert!(matches!(
            dialect.columns_from_rows(&[bad]),
            Err(IntrospectionError::MalformedRow { .. })
        ));
    }
}
