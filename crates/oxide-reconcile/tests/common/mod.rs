#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use oxide_reconcile::catalog::ColumnSchema;
use oxide_reconcile::dialect::{
    DdlDialect, MySqlColumnRow, MySqlDialect, MySqlIndexRow, SpannerAdmin, SpannerAdminError,
    SpannerDialect,
};
use oxide_reconcile::index::desired_indexes;
use oxide_reconcile::model::{FieldSpec, TableSpec};
use oxide_reconcile::types::base_type;

// =============================================================================
// Fake Spanner admin client
// =============================================================================

/// Serves canned catalog rows and records submitted DDL batches.
#[derive(Default)]
pub struct FakeSpanner {
    rows: Mutex<Vec<Vec<Value>>>,
    batches: Mutex<Vec<Vec<String>>>,
    queries: Mutex<Vec<String>>,
    failure: Mutex<Option<SpannerAdminError>>,
}

impl FakeSpanner {
    pub fn with_rows(rows: Vec<Vec<Value>>) -> Self {
        let fake = Self::default();
        fake.set_rows(rows);
        fake
    }

    pub fn set_rows(&self, rows: Vec<Vec<Value>>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn fail_with(&self, error: SpannerAdminError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpannerAdmin for FakeSpanner {
    async fn execute_sql(&self, sql: &str) -> Result<Vec<Vec<Value>>, SpannerAdminError> {
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn update_ddl(&self, statements: &[String]) -> Result<(), SpannerAdminError> {
        self.batches.lock().unwrap().push(statements.to_vec());
        match self.failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

// =============================================================================
// MySQL catalog simulation
// =============================================================================

/// Column type as an older server reports it, with integer display widths.
fn legacy_column_type(ddl: &str) -> String {
    match ddl {
        "TINYINT" => "tinyint(4)".to_string(),
        "SMALLINT" => "smallint(6)".to_string(),
        "INT" => "int(11)".to_string(),
        "INT UNSIGNED" => "int(10) unsigned".to_string(),
        "BIGINT" => "bigint(20)".to_string(),
        "BIGINT UNSIGNED" => "bigint(20) unsigned".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn arguments(ddl: &str) -> Vec<u64> {
    let Some(open) = ddl.find('(') else {
        return Vec::new();
    };
    let Some(close) = ddl.find(')') else {
        return Vec::new();
    };
    ddl[open + 1..close]
        .split(',')
        .filter_map(|a| a.trim().parse().ok())
        .collect()
}

fn text_length(data_type: &str) -> Option<u64> {
    match data_type {
        "tinytext" | "tinyblob" => Some(255),
        "text" | "blob" => Some(65_535),
        "mediumtext" | "mediumblob" => Some(16_777_215),
        "longtext" | "longblob" => Some(4_294_967_295),
        _ => None,
    }
}

/// `CURRENT_TIMESTAMP` and its synonyms, spelled the way the server reports
/// them.
fn timestamp_default(value: &str, mariadb: bool) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    let (name, args) = match lower.split_once('(') {
        Some((name, rest)) => (name.trim(), rest.trim_end_matches(')').trim()),
        None => (lower.as_str(), ""),
    };
    if !matches!(name, "now" | "current_timestamp" | "localtime" | "localtimestamp") {
        return None;
    }
    let args = if args == "0" { "" } else { args };
    Some(match (mariadb, args.is_empty()) {
        (true, _) => format!("current_timestamp({args})"),
        (false, true) => "CURRENT_TIMESTAMP".to_string(),
        (false, false) => format!("CURRENT_TIMESTAMP({args})"),
    })
}

/// A numeric literal as the server stores it in a column of `data_type`.
fn stored_number(value: &str, data_type: &str, args: &[u64]) -> Option<String> {
    let value = match value.to_ascii_lowercase().as_str() {
        "true" => "1",
        "false" => "0",
        _ => value,
    };
    let number: f64 = value.parse().ok()?;
    match data_type {
        "tinyint" | "smallint" | "mediumint" | "int" | "bigint" => {
            Some(format!("{}", number.round() as i128))
        }
        "decimal" => {
            let scale = args.get(1).copied().unwrap_or(0) as usize;
            Some(format!("{number:.scale$}"))
        }
        "float" | "double" => Some(number.to_string()),
        _ => None,
    }
}

/// A temporal literal as the server stores it: `DATETIME` and `TIMESTAMP`
/// values carry a time and a fraction of the column's precision.
fn stored_literal(value: &str, data_type: &str, args: &[u64]) -> String {
    let mut literal = value.to_string();
    if !matches!(data_type, "datetime" | "timestamp") {
        return literal;
    }
    if literal.len() == 10 {
        literal.push_str(" 00:00:00");
    }
    if let Some(precision) = args.first().filter(|p| **p > 0) {
        if !literal.contains('.') {
            literal.push('.');
            literal.push_str(&"0".repeat(*precision as usize));
        }
    }
    literal
}

/// Raw `COLUMN_DEFAULT` for a field, as the server stores and reports it.
fn raw_default(mariadb: bool, field: &FieldSpec, data_type: &str, args: &[u64]) -> Option<String> {
    let value = field
        .default
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.eq_ignore_ascii_case("NULL"));
    let Some(value) = value else {
        return (mariadb && field.is_nullable()).then(|| "NULL".to_string());
    };
    if let Some(expression) = timestamp_default(value, mariadb) {
        return Some(expression);
    }
    if let Some(number) = stored_number(value, data_type, args) {
        return Some(number);
    }
    let literal = stored_literal(value, data_type, args);
    if mariadb {
        Some(format!("'{}'", literal.replace('\\', "\\\\").replace('\'', "''")))
    } else {
        Some(literal)
    }
}

/// The `information_schema` rows MySQL reports after creating `tables`.
pub fn mysql_rows(
    dialect: &MySqlDialect,
    tables: &[TableSpec],
) -> (Vec<MySqlColumnRow>, Vec<MySqlIndexRow>) {
    let mut columns = Vec::new();
    let mut indexes = Vec::new();

    for table in tables {
        for (i, field) in table.fields.iter().enumerate() {
            let ddl = dialect.type_of(field);
            let data_type = base_type(&ddl)
                .split(' ')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            let args = arguments(&ddl);

            let mut extra = Vec::new();
            if field.auto_increment {
                extra.push("auto_increment".to_string());
            }
            let default = raw_default(
                dialect.server().quotes_literal_defaults(),
                field,
                &data_type,
                &args,
            );
            if default
                .as_deref()
                .is_some_and(|d| d.to_ascii_uppercase().starts_with("CURRENT_TIMESTAMP"))
            {
                extra.push("DEFAULT_GENERATED".to_string());
            }
            if let Some(clause) = dialect.normalize_extra(field.extra.as_deref()) {
                extra.push(clause.to_ascii_lowercase());
            }

            let mut row = MySqlColumnRow {
                table: table.name.clone(),
                column: Some(field.column_name()),
                position: (i + 1) as u32,
                column_type: legacy_column_type(&ddl),
                is_nullable: if field.is_nullable() { "YES" } else { "NO" }.to_string(),
                default,
                extra: Some(extra.join(" ")),
                comment: Some(field.comment.clone().unwrap_or_default()),
                ..MySqlColumnRow::default()
            };
            match data_type.as_str() {
                "char" | "varchar" | "binary" | "varbinary" => {
                    row.char_length = args.first().copied();
                }
                "decimal" => {
                    row.numeric_precision = args.first().copied();
                    row.numeric_scale = Some(args.get(1).copied().unwrap_or(0));
                }
                "datetime" | "timestamp" | "time" => {
                    row.datetime_precision = Some(args.first().copied().unwrap_or(0));
                }
                other => row.char_length = text_length(other),
            }
            row.data_type = data_type;
            columns.push(row);
        }

        for (i, column) in table.primary_key().into_iter().enumerate() {
            indexes.push(MySqlIndexRow {
                table: table.name.clone(),
                index: "PRIMARY".to_string(),
                column: Some(column),
                position: (i + 1) as u32,
                non_unique: false,
            });
        }
        for index in desired_indexes(table).into_values() {
            for (i, column) in index.columns.into_iter().enumerate() {
                indexes.push(MySqlIndexRow {
                    table: table.name.clone(),
                    index: index.name.clone(),
                    column: Some(column),
                    position: (i + 1) as u32,
                    non_unique: !index.unique,
                });
            }
        }
    }
    (columns, indexes)
}

/// The normalized catalog MySQL reports after creating `tables`.
pub fn mysql_catalog(dialect: &MySqlDialect, tables: &[TableSpec]) -> Vec<ColumnSchema> {
    let (columns, indexes) = mysql_rows(dialect, tables);
    dialect
        .columns_from_rows(columns, indexes)
        .expect("simulated catalog rows are well formed")
}

// =============================================================================
// Spanner catalog simulation
// =============================================================================

fn spanner_row(
    table: &str,
    column: &str,
    position: usize,
    nullable: bool,
    ty: &str,
    index: Option<&(String, usize, &str, bool)>,
    option: Option<&(String, String)>,
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

/// The joined `INFORMATION_SCHEMA` rows Spanner returns after creating
/// `tables`: one row per column, index membership and option.
pub fn spanner_rows(dialect: &SpannerDialect, tables: &[TableSpec]) -> Vec<Vec<Value>> {
    let mut rows = Vec::new();
    for table in tables {
        let primary_key = table.primary_key();
        let indexes = desired_indexes(table);

        for (i, field) in table.fields.iter().enumerate() {
            let column = field.column_name();

            let mut memberships = Vec::new();
            if let Some(p) = primary_key.iter().position(|c| *c == column) {
                memberships.push(("PRIMARY_KEY".to_string(), p + 1, "PRIMARY_KEY", true));
            }
            for index in indexes.values() {
                if let Some(p) = index.columns.iter().position(|c| *c == column) {
                    memberships.push((index.name.clone(), p + 1, "INDEX", index.unique));
                }
            }

            let options: Vec<(String, String)> = dialect
                .normalize_extra(field.extra.as_deref())
                .map(|extra| {
                    extra
                        .split(", ")
                        .filter_map(|o| o.split_once('='))
                        .map(|(k, v)| (k.to_string(), v.to_ascii_uppercase()))
                        .collect()
                })
                .unwrap_or_default();

            let ty = dialect.type_of(field);
            let nullable = field.is_nullable();
            let index_slots: Vec<Option<&(String, usize, &str, bool)>> = if memberships.is_empty() {
                vec![None]
            } else {
                memberships.iter().map(Some).collect()
            };
            let option_slots: Vec<Option<&(String, String)>> = if options.is_empty() {
                vec![None]
            } else {
                options.iter().map(Some).collect()
            };
            for index in &index_slots {
                for option in &option_slots {
                    rows.push(spanner_row(
                        &table.name,
                        &column,
                        i + 1,
                        nullable,
                        &ty,
                        *index,
                        *option,
                    ));
                }
            }
        }
    }
    rows
}

/// The normalized catalog Spanner reports after creating `tables`.
pub fn spanner_catalog(dialect: &SpannerDialect, tables: &[TableSpec]) -> Vec<ColumnSchema> {
    dialect
        .columns_from_rows(&spanner_rows(dialect, tables))
        .expect("simulated catalog rows are well formed")
}
