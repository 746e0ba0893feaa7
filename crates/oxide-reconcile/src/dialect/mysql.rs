//! MySQL and MariaDB dialect.
//!
//! DDL runs as plain `ALTER TABLE` statements. The catalog is read from
//! `information_schema.COLUMNS` and `information_schema.STATISTICS`, scoped
//! to the connection's current database.

use std::collections::BTreeMap;

use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use tracing::{debug, info};

use crate::catalog::{ColumnSchema, IndexMembership};
use crate::error::{IntrospectionError, Result};
use crate::index::IndexDef;
use crate::model::{FieldSpec, TableSpec};
use crate::types::{base_type, normalize_ddl, Resolution, TypeEquivalence, TypeRegistry};

use super::{DdlDialect, PrimaryKeyChange};

const INTEGER_TYPES: [&str; 6] = ["TINYINT", "SMALLINT", "MEDIUMINT", "INT", "INTEGER", "BIGINT"];

const NUMERIC_TYPES: [&str; 12] = [
    "TINYINT", "SMALLINT", "MEDIUMINT", "INT", "INTEGER", "BIGINT", "DECIMAL", "NUMERIC", "FLOAT",
    "DOUBLE", "REAL", "BIT",
];

const MAX_VARCHAR: u64 = 16_383;
const MAX_VARBINARY: u64 = 65_532;
const MAX_MEDIUM: u64 = 16_777_215;

// ============================================================================
// Server detection
// ============================================================================

/// Server family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFlavor {
    /// Oracle MySQL.
    MySql,
    /// MariaDB.
    MariaDb,
}

/// Server flavor and version, as reported by `SELECT VERSION()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerVersion {
    /// Server family.
    pub flavor: ServerFlavor,
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
}

impl Default for ServerVersion {
    fn default() -> Self {
        Self {
            flavor: ServerFlavor::MySql,
            major: 8,
            minor: 0,
            patch: 0,
        }
    }
}

impl ServerVersion {
    /// Parses a version string such as `8.0.36`, `10.6.12-MariaDB-log` or
    /// `5.5.5-10.3.39-MariaDB`.
    #[must_use]
    pub fn parse(version: &str) -> Option<Self> {
        let flavor = if version.to_ascii_lowercase().contains("mariadb") {
            ServerFlavor::MariaDb
        } else {
            ServerFlavor::MySql
        };
        // MariaDB behind the MySQL replication protocol reports a fake 5.5.5 prefix.
        let version = version.trim();
        let version = version.strip_prefix("5.5.5-").unwrap_or(version);

        let numeric = version
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()?;
        let mut parts = numeric.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);

        Some(Self {
            flavor,
            major,
            minor,
            patch,
        })
    }

    /// Whether `COLUMN_DEFAULT` is reported as a SQL literal (quoted
    /// strings, `NULL` for no default). True for MariaDB 10.2.7 and later.
    #[must_use]
    pub fn quotes_literal_defaults(&self) -> bool {
        self.flavor == ServerFlavor::MariaDb && (self.major, self.minor, self.patch) >= (10, 2, 7)
    }
}

/// Detects the server behind a pool.
pub async fn detect_server(pool: &MySqlPool) -> std::result::Result<ServerVersion, IntrospectionError> {
    let version: String = sqlx::query_scalar("SELECT VERSION()")
        .fetch_one(pool)
        .await?;
    let server = ServerVersion::parse(&version).ok_or_else(|| {
        IntrospectionError::malformed("?", "?", format!("unrecognized server version `{version}`"))
    })?;
    info!(version = %version, flavor = ?server.flavor, "Detected MySQL server");
    Ok(server)
}

// ============================================================================
// Dialect
// ============================================================================

/// MySQL DDL dialect.
#[derive(Debug, Clone)]
pub struct MySqlDialect {
    server: ServerVersion,
    types: TypeRegistry,
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new(ServerVersion::default())
    }
}

impl MySqlDialect {
    /// Creates a dialect for the given server.
    #[must_use]
    pub fn new(server: ServerVersion) -> Self {
        Self {
            server,
            types: TypeRegistry::new(builtin_types()),
        }
    }

    /// Registers additional type equivalences.
    #[must_use]
    pub fn with_types(mut self, entries: Vec<TypeEquivalence>) -> Self {
        self.types.register(entries);
        self
    }

    /// Returns the server this dialect targets.
    #[must_use]
    pub fn server(&self) -> ServerVersion {
        self.server
    }

    fn sized(ddl: &str, field: &FieldSpec) -> String {
        match base_type(ddl).as_str() {
            "VARCHAR" => match field.size {
                None => ddl.to_string(),
                Some(n) if n <= MAX_VARCHAR => format!("VARCHAR({n})"),
                Some(n) if n <= MAX_MEDIUM => "MEDIUMTEXT".to_string(),
                Some(_) => "LONGTEXT".to_string(),
            },
            "VARBINARY" => match field.size {
                None => ddl.to_string(),
                Some(n) if n <= MAX_VARBINARY => format!("VARBINARY({n})"),
                Some(n) if n <= MAX_MEDIUM => "MEDIUMBLOB".to_string(),
                Some(_) => "LONGBLOB".to_string(),
            },
            "DECIMAL" => match field.precision {
                Some(p) => format!("DECIMAL({p},{})", field.scale.unwrap_or(0)),
                None => ddl.to_string(),
            },
            "DATETIME" | "TIMESTAMP" | "TIME" => match field.precision {
                Some(p) if p > 0 => format!("{ddl}({p})"),
                _ => ddl.to_string(),
            },
            _ => ddl.to_string(),
        }
    }

    /// Renders the `DEFAULT` value of a column definition.
    fn render_default(&self, field: &FieldSpec) -> Option<String> {
        let value = self.normalize_default(field)?;
        let base = base_type(&self.type_of(field));
        if value.starts_with("CURRENT_TIMESTAMP")
            || value.starts_with('(')
            || (is_numeric(&base) && is_numeric_literal(&value))
        {
            Some(value)
        } else {
            Some(self.quote_literal(&value))
        }
    }

    /// Interprets a raw `COLUMN_DEFAULT` according to the server convention.
    fn catalog_default(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?;
        if !self.server.quotes_literal_defaults() {
            return Some(raw.to_string());
        }
        if raw.eq_ignore_ascii_case("NULL") {
            return None;
        }
        match raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
            Some(inner) => Some(unescape_literal(inner)),
            None => Some(raw.to_string()),
        }
    }

    /// Reads the current schema.
    pub async fn introspect(
        &self,
        pool: &MySqlPool,
        tables: &[&str],
    ) -> std::result::Result<Vec<ColumnSchema>, IntrospectionError> {
        let columns = fetch_columns(pool, tables).await?;
        let indexes = fetch_indexes(pool, tables).await?;
        let schema = self.columns_from_rows(columns, indexes)?;
        info!(
            columns = schema.len(),
            indexes = schema.iter().map(|c| c.indexes.len()).sum::<usize>(),
            "Introspected MySQL schema"
        );
        Ok(schema)
    }

    /// Builds normalized columns from raw catalog rows.
    pub fn columns_from_rows(
        &self,
        columns: Vec<MySqlColumnRow>,
        indexes: Vec<MySqlIndexRow>,
    ) -> std::result::Result<Vec<ColumnSchema>, IntrospectionError> {
        let mut index_sizes: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut memberships: BTreeMap<(String, String), Vec<IndexMembership>> = BTreeMap::new();
        for row in indexes {
            // Functional key parts have no column.
            let Some(column) = row.column else {
                continue;
            };
            *index_sizes
                .entry((row.table.clone(), row.index.clone()))
                .or_default() += 1;
            memberships
                .entry((row.table, column))
                .or_default()
                .push(IndexMembership {
                    primary: row.index == "PRIMARY",
                    name: row.index,
                    position: row.position,
                    unique: !row.non_unique,
                });
        }

        let mut schema = Vec::with_capacity(columns.len());
        for row in columns {
            let Some(name) = row.column else {
                debug!(table = %row.table, "Skipping catalog row without a column name");
                continue;
            };
            let nullable = match row.is_nullable.as_str() {
                "YES" => true,
                "NO" => false,
                other => {
                    return Err(IntrospectionError::malformed(
                        &row.table,
                        &name,
                        format!("unexpected IS_NULLABLE value `{other}`"),
                    ))
                }
            };

            let indexes = memberships
                .remove(&(row.table.clone(), name.clone()))
                .unwrap_or_default();
            let unique = indexes.iter().any(|m| {
                m.unique
                    && !m.primary
                    && index_sizes.get(&(row.table.clone(), m.name.clone())) == Some(&1)
            });
            let data_type = row.data_type.to_ascii_lowercase();

            let mut column =
                ColumnSchema::new(row.table, name, normalize_column_type(&row.column_type));
            column.position = row.position;
            column.nullable = nullable;
            column.default = self.catalog_default(row.default.as_deref());
            column.primary_key = indexes.iter().any(|m| m.primary);
            column.auto_increment = row
                .extra
                .as_deref()
                .is_some_and(|e| e.to_ascii_lowercase().contains("auto_increment"));
            column.unique = unique;
            column.size = if is_sized(&data_type) {
                row.char_length
            } else {
                None
            };
            (column.precision, column.scale) = match data_type.as_str() {
                "decimal" | "numeric" => (row.numeric_precision, row.numeric_scale),
                "datetime" | "timestamp" | "time" => (row.datetime_precision, None),
                _ => (None, None),
            };
            column.extra = self.normalize_extra(row.extra.as_deref());
            column.comment = row.comment.filter(|c| !c.is_empty());
            column.indexes = indexes;
            schema.push(column);
        }
        Ok(schema)
    }
}

impl DdlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn types(&self) -> &TypeRegistry {
        &self.types
    }

    fn type_of(&self, field: &FieldSpec) -> String {
        if let Some(db_type) = &field.db_type {
            return normalize_column_type(db_type);
        }
        match self.types.resolve(&field.ty, field.is_nullable()) {
            Some(Resolution::Canonical(ddl)) => Self::sized(&ddl, field),
            Some(Resolution::Override(ddl)) => normalize_column_type(&ddl),
            None => normalize_column_type(&field.ty),
        }
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn column_definition(&self, field: &FieldSpec) -> String {
        let mut parts = vec![self.quote(&field.column_name()), self.type_of(field)];

        parts.push(if field.is_nullable() { "NULL" } else { "NOT NULL" }.to_string());
        if field.auto_increment {
            parts.push("AUTO_INCREMENT".to_string());
        }
        if let Some(default) = self.render_default(field) {
            parts.push(format!("DEFAULT {default}"));
        }
        if let Some(extra) = self.normalize_extra(field.extra.as_deref()) {
            parts.push(extra);
        }
        if let Some(comment) = self.normalize_comment(field.comment.as_deref()) {
            parts.push(format!("COMMENT {}", self.quote_literal(&comment)));
        }

        parts.join(" ")
    }

    fn create_table(&self, table: &TableSpec, indexes: &[IndexDef]) -> Vec<String> {
        let mut lines: Vec<String> = table
            .fields
            .iter()
            .map(|f| self.column_definition(f))
            .collect();

        let primary_key = table.primary_key();
        if !primary_key.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", self.quote_list(&primary_key)));
        }
        for index in indexes {
            let unique = if index.unique { "UNIQUE " } else { "" };
            lines.push(format!(
                "{unique}INDEX {} ({})",
                self.quote(&index.name),
                self.quote_list(&index.columns)
            ));
        }

        let mut sql = format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote(&table.name),
            lines.join(",\n  ")
        );
        if let Some(option) = table.option.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
            sql.push(' ');
            sql.push_str(option);
        }
        vec![sql]
    }

    fn add_column(&self, table: &str, field: &FieldSpec) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} ADD {}",
            self.quote(table),
            self.column_definition(field)
        )])
    }

    fn alter_column(&self, table: &str, _old: &FieldSpec, new: &FieldSpec) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} MODIFY {}",
            self.quote(table),
            self.column_definition(new)
        )])
    }

    fn drop_column(&self, table: &str, column: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP {}",
            self.quote(table),
            self.quote(column)
        )]
    }

    fn drop_index(&self, table: &str, name: &str) -> Vec<String> {
        vec![format!(
            "DROP INDEX {} ON {}",
            self.quote(name),
            self.quote(table)
        )]
    }

    fn drop_table(&self, table: &str, _indexes: &[IndexDef]) -> Vec<String> {
        vec![format!("DROP TABLE {}", self.quote(table))]
    }

    /// Folds the whole key change into one `ALTER TABLE`. An
    /// `AUTO_INCREMENT` column must be a key at every step, so the old key
    /// cannot be dropped, nor an auto-increment column added, on its own.
    fn change_primary_key(
        &self,
        table: &str,
        from: &[String],
        to: &[String],
        added: &[&FieldSpec],
    ) -> Result<PrimaryKeyChange> {
        let mut clauses = Vec::new();
        if !from.is_empty() {
            clauses.push("DROP PRIMARY KEY".to_string());
        }
        for field in added {
            clauses.push(format!("ADD {}", self.column_definition(field)));
        }
        if !to.is_empty() {
            clauses.push(format!("ADD PRIMARY KEY ({})", self.quote_list(to)));
        }
        if clauses.is_empty() {
            return Ok(PrimaryKeyChange::default());
        }

        Ok(PrimaryKeyChange {
            statements: vec![format!(
                "ALTER TABLE {} {}",
                self.quote(table),
                clauses.join(", ")
            )],
            added_columns: added.iter().map(|f| f.column_name()).collect(),
        })
    }

    fn normalize_default(&self, field: &FieldSpec) -> Option<String> {
        let value = field.default.as_deref()?.trim();
        if value.eq_ignore_ascii_case("NULL") {
            return None;
        }

        let ddl = self.type_of(field);
        let base = base_type(&ddl);
        if is_temporal(&base) && is_zero_temporal(value) {
            return None;
        }
        if let Some(expression) = timestamp_expression(value) {
            return Some(expression);
        }
        if ddl == "TINYINT(1)" {
            if value.eq_ignore_ascii_case("true") {
                return Some("1".to_string());
            }
            if value.eq_ignore_ascii_case("false") {
                return Some("0".to_string());
            }
        }
        // The server stores literals in the column's own format: `1.5` on
        // DECIMAL(12,2) reads back as `1.50`, `007` on INT as `7`.
        if is_numeric(&base) && is_numeric_literal(value) {
            if let Some(number) = canonical_number(&ddl, value) {
                return Some(number);
            }
        }
        if matches!(first_word(&base), "DATETIME" | "TIMESTAMP") {
            let precision = type_arguments(&ddl).first().copied().unwrap_or(0);
            if let Some(literal) = canonical_datetime(value, precision) {
                return Some(literal);
            }
        }
        Some(value.to_string())
    }

    fn normalize_extra(&self, extra: Option<&str>) -> Option<String> {
        let extra = normalize_ddl(extra?);
        let kept: Vec<&str> = extra
            .split(' ')
            .filter(|w| !matches!(*w, "AUTO_INCREMENT" | "DEFAULT_GENERATED"))
            .collect();
        let extra = kept.join(" ").replace("CURRENT_TIMESTAMP()", "CURRENT_TIMESTAMP");
        (!extra.is_empty()).then_some(extra)
    }
}

fn builtin_types() -> Vec<TypeEquivalence> {
    vec![
        TypeEquivalence::new("TINYINT(1)", &["bool"]),
        TypeEquivalence::new("TINYINT", &["i8"]),
        TypeEquivalence::new("TINYINT UNSIGNED", &["u8"]),
        TypeEquivalence::new("SMALLINT", &["i16"]),
        TypeEquivalence::new("SMALLINT UNSIGNED", &["u16"]),
        TypeEquivalence::new("INT", &["i32"]),
        TypeEquivalence::new("INT UNSIGNED", &["u32"]),
        TypeEquivalence::new("BIGINT", &["i64", "isize"]),
        TypeEquivalence::new("BIGINT UNSIGNED", &["u64", "usize"]),
        TypeEquivalence::new("FLOAT", &["f32"]),
        TypeEquivalence::new("DOUBLE", &["f64"]),
        TypeEquivalence::new("DECIMAL(10,0)", &["Decimal", "rust_decimal::Decimal"]),
        TypeEquivalence::new("VARCHAR(255)", &["String"]),
        TypeEquivalence::new("VARBINARY(255)", &["Vec<u8>"]),
        TypeEquivalence::new(
            "DATETIME",
            &[
                "NaiveDateTime",
                "chrono::NaiveDateTime",
                "DateTime<Utc>",
                "chrono::DateTime<Utc>",
                "chrono::DateTime<chrono::Utc>",
                "time::PrimitiveDateTime",
            ],
        ),
        TypeEquivalence::new("DATE", &["NaiveDate", "chrono::NaiveDate", "time::Date"]),
        TypeEquivalence::new("TIME", &["NaiveTime", "chrono::NaiveTime", "time::Time"]),
        TypeEquivalence::new("JSON", &["serde_json::Value", "Value"]),
        // Stored types reached only through sizes or overrides.
        TypeEquivalence::new("CHAR", &["String"]),
        TypeEquivalence::new("TINYTEXT", &["String"]),
        TypeEquivalence::new("TEXT", &["String"]),
        TypeEquivalence::new("MEDIUMTEXT", &["String"]),
        TypeEquivalence::new("LONGTEXT", &["String"]),
        TypeEquivalence::new("BINARY", &["Vec<u8>"]),
        TypeEquivalence::new("TINYBLOB", &["Vec<u8>"]),
        TypeEquivalence::new("BLOB", &["Vec<u8>"]),
        TypeEquivalence::new("MEDIUMBLOB", &["Vec<u8>"]),
        TypeEquivalence::new("LONGBLOB", &["Vec<u8>"]),
        TypeEquivalence::new(
            "TIMESTAMP",
            &["DateTime<Utc>", "chrono::DateTime<Utc>", "time::OffsetDateTime"],
        ),
    ]
}

/// Normalizes a MySQL column type.
///
/// Integer display widths are stripped (`bigint(20) unsigned` becomes
/// `BIGINT UNSIGNED`), except for `TINYINT(1)`, which marks booleans.
/// `INTEGER` becomes `INT`, `BOOL` and `BOOLEAN` become `TINYINT(1)`.
#[must_use]
pub fn normalize_column_type(ddl: &str) -> String {
    let ddl = normalize_ddl(ddl);
    if matches!(ddl.as_str(), "BOOL" | "BOOLEAN" | "TINYINT(1)") {
        return "TINYINT(1)".to_string();
    }

    let base = base_type(&ddl);
    let mut words = base.splitn(2, ' ');
    let head = words.next().unwrap_or_default();
    if !INTEGER_TYPES.contains(&head) {
        return ddl;
    }
    let head = if head == "INTEGER" { "INT" } else { head };
    match words.next() {
        Some(rest) => format!("{head} {rest}"),
        None => head.to_string(),
    }
}

fn first_word(ddl: &str) -> &str {
    ddl.split(|c: char| c == ' ' || c == '(').next().unwrap_or(ddl)
}

fn is_numeric(ddl: &str) -> bool {
    NUMERIC_TYPES.contains(&first_word(ddl))
}

fn is_temporal(ddl: &str) -> bool {
    matches!(first_word(ddl), "DATE" | "DATETIME" | "TIMESTAMP")
}

fn is_sized(data_type: &str) -> bool {
    matches!(
        data_type,
        "char"
            | "varchar"
            | "binary"
            | "varbinary"
            | "tinytext"
            | "text"
            | "mediumtext"
            | "longtext"
            | "tinyblob"
            | "blob"
            | "mediumblob"
            | "longblob"
    )
}

fn is_numeric_literal(value: &str) -> bool {
    let digits = value.strip_prefix(&['-', '+'][..]).unwrap_or(value);
    !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
        && value.parse::<f64>().is_ok()
}

/// Numeric arguments of a type, `DECIMAL(12,2)` gives `[12, 2]`.
fn type_arguments(ddl: &str) -> Vec<usize> {
    let (Some(open), Some(close)) = (ddl.find('('), ddl.find(')')) else {
        return Vec::new();
    };
    if close < open {
        return Vec::new();
    }
    ddl[open + 1..close]
        .split(',')
        .filter_map(|a| a.trim().parse().ok())
        .collect()
}

/// Formats a numeric literal the way the server stores it for `ddl`.
fn canonical_number(ddl: &str, value: &str) -> Option<String> {
    match first_word(ddl) {
        "DECIMAL" | "NUMERIC" => {
            let scale = type_arguments(ddl).get(1).copied().unwrap_or(0);
            decimal_literal(value, scale)
        }
        "FLOAT" | "DOUBLE" | "REAL" => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.to_string()),
        "BIT" => None,
        _ => decimal_literal(value, 0),
    }
}

/// Rounds a decimal literal half away from zero to `scale` digits.
fn decimal_literal(value: &str, scale: usize) -> Option<String> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let plain = (!int.is_empty() || !frac.is_empty())
        && int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit());
    if !plain {
        // Exponent notation.
        return value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| format!("{v:.scale$}"));
    }

    let mut kept: Vec<u8> = int.bytes().collect();
    kept.extend(frac.bytes().take(scale));
    kept.resize(int.len() + scale, b'0');
    if frac.as_bytes().get(scale).is_some_and(|d| *d >= b'5') {
        let mut carry = true;
        for digit in kept.iter_mut().rev() {
            if *digit == b'9' {
                *digit = b'0';
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            kept.insert(0, b'1');
        }
    }

    let split = kept.len() - scale;
    let int = String::from_utf8_lossy(&kept[..split]);
    let int = match int.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let frac = String::from_utf8_lossy(&kept[split..]);
    let zero = int == "0" && frac.bytes().all(|d| d == b'0');
    let sign = if negative && !zero { "-" } else { "" };
    Some(if scale == 0 {
        format!("{sign}{int}")
    } else {
        format!("{sign}{int}.{frac}")
    })
}

/// Expands a `DATETIME`/`TIMESTAMP` literal to the stored form: a bare date
/// gains a midnight time, and the fraction is padded to `precision` digits.
fn canonical_datetime(value: &str, precision: usize) -> Option<String> {
    let (date, time) = value.split_once(' ').unwrap_or((value, "00:00:00"));
    let (clock, fraction) = time.split_once('.').unwrap_or((time, ""));
    if !matches_pattern(date, "dddd-dd-dd")
        || !matches_pattern(clock, "dd:dd:dd")
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    if precision == 0 {
        return Some(format!("{date} {clock}"));
    }
    let mut fraction: String = fraction.chars().take(precision).collect();
    while fraction.len() < precision {
        fraction.push('0');
    }
    Some(format!("{date} {clock}.{fraction}"))
}

/// Matches `value` against a pattern where `d` is any ASCII digit.
fn matches_pattern(value: &str, pattern: &str) -> bool {
    value.len() == pattern.len()
        && value.bytes().zip(pattern.bytes()).all(|(v, p)| match p {
            b'd' => v.is_ascii_digit(),
            _ => v == p,
        })
}

fn is_zero_temporal(value: &str) -> bool {
    value.starts_with("0000-00-00")
        && value
            .chars()
            .all(|c| matches!(c, '0' | '-' | ':' | ' ' | '.'))
}

/// Folds `now()`, `current_timestamp()`, `CURRENT_TIMESTAMP(3)` and their
/// synonyms to `CURRENT_TIMESTAMP[(n)]`.
fn timestamp_expression(value: &str) -> Option<String> {
    let upper = value.trim().to_ascii_uppercase();
    let (name, args) = match upper.find('(') {
        Some(open) => (
            upper[..open].trim(),
            Some(upper[open + 1..].strip_suffix(')')?.trim()),
        ),
        None => (upper.as_str(), None),
    };
    if !matches!(
        name,
        "CURRENT_TIMESTAMP" | "NOW" | "LOCALTIMESTAMP" | "LOCALTIME"
    ) {
        return None;
    }
    match args {
        None | Some("" | "0") => Some("CURRENT_TIMESTAMP".to_string()),
        Some(p) if p.chars().all(|c| c.is_ascii_digit()) => {
            Some(format!("CURRENT_TIMESTAMP({p})"))
        }
        Some(_) => None,
    }
}

fn unescape_literal(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                out.push('\'');
            }
            _ => out.push(ch),
        }
    }
    out
}

// ============================================================================
// Catalog queries
// ============================================================================

/// One row of `information_schema.COLUMNS`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MySqlColumnRow {
    /// `TABLE_NAME`.
    pub table: String,
    /// `COLUMN_NAME`.
    pub column: Option<String>,
    /// `ORDINAL_POSITION`.
    pub position: u32,
    /// `COLUMN_TYPE`, e.g. `bigint(20) unsigned`.
    pub column_type: String,
    /// `DATA_TYPE`, e.g. `bigint`.
    pub data_type: String,
    /// `IS_NULLABLE`: `YES` or `NO`.
    pub is_nullable: String,
    /// `COLUMN_DEFAULT`, raw.
    pub default: Option<String>,
    /// `EXTRA`.
    pub extra: Option<String>,
    /// `COLUMN_COMMENT`.
    pub comment: Option<String>,
    /// `CHARACTER_MAXIMUM_LENGTH`.
    pub char_length: Option<u64>,
    /// `NUMERIC_PRECISION`.
    pub numeric_precision: Option<u64>,
    /// `NUMERIC_SCALE`.
    pub numeric_scale: Option<u64>,
    /// `DATETIME_PRECISION`.
    pub datetime_precision: Option<u64>,
}

/// One row of `information_schema.STATISTICS`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MySqlIndexRow {
    /// `TABLE_NAME`.
    pub table: String,
    /// `INDEX_NAME`; `PRIMARY` for the primary key.
    pub index: String,
    /// `COLUMN_NAME`, absent for functional key parts.
    pub column: Option<String>,
    /// `SEQ_IN_INDEX`.
    pub position: u32,
    /// `NON_UNIQUE`.
    pub non_unique: bool,
}

const COLUMNS_QUERY: &str = "SELECT \
    CAST(TABLE_NAME AS CHAR) AS table_name, \
    CAST(COLUMN_NAME AS CHAR) AS column_name, \
    CAST(ORDINAL_POSITION AS UNSIGNED) AS position, \
    CAST(COLUMN_TYPE AS CHAR) AS column_type, \
    CAST(DATA_TYPE AS CHAR) AS data_type, \
    CAST(IS_NULLABLE AS CHAR) AS is_nullable, \
    CAST(COLUMN_DEFAULT AS CHAR) AS column_default, \
    CAST(EXTRA AS CHAR) AS extra, \
    CAST(COLUMN_COMMENT AS CHAR) AS column_comment, \
    CAST(CHARACTER_MAXIMUM_LENGTH AS UNSIGNED) AS char_length, \
    CAST(NUMERIC_PRECISION AS UNSIGNED) AS numeric_precision, \
    CAST(NUMERIC_SCALE AS UNSIGNED) AS numeric_scale, \
    CAST(DATETIME_PRECISION AS UNSIGNED) AS datetime_precision \
    FROM information_schema.COLUMNS \
    WHERE TABLE_SCHEMA = DATABASE()";

const INDEXES_QUERY: &str = "SELECT \
    CAST(TABLE_NAME AS CHAR) AS table_name, \
    CAST(INDEX_NAME AS CHAR) AS index_name, \
    CAST(COLUMN_NAME AS CHAR) AS column_name, \
    CAST(SEQ_IN_INDEX AS UNSIGNED) AS position, \
    CAST(NON_UNIQUE AS UNSIGNED) AS non_unique \
    FROM information_schema.STATISTICS \
    WHERE TABLE_SCHEMA = DATABASE()";

fn table_filter(tables: usize) -> String {
    if tables == 0 {
        return String::new();
    }
    format!(" AND TABLE_NAME IN ({})", vec!["?"; tables].join(", "))
}

fn position(
    row: &MySqlRow,
    table: &str,
    column: Option<&str>,
) -> std::result::Result<u32, IntrospectionError> {
    let position: u64 = row.try_get("position")?;
    u32::try_from(position).map_err(|_| {
        IntrospectionError::malformed(table, column.unwrap_or("?"), "position out of range")
    })
}

async fn fetch_columns(
    pool: &MySqlPool,
    tables: &[&str],
) -> std::result::Result<Vec<MySqlColumnRow>, IntrospectionError> {
    let sql = format!(
        "{COLUMNS_QUERY}{} ORDER BY TABLE_NAME, ORDINAL_POSITION",
        table_filter(tables.len())
    );
    let mut query = sqlx::query(&sql);
    for table in tables {
        query = query.bind(*table);
    }

    let rows = query.fetch_all(pool).await?;
    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let table: String = row.try_get("table_name")?;
        let column: Option<String> = row.try_get("column_name")?;
        let position = position(row, &table, column.as_deref())?;
        columns.push(MySqlColumnRow {
            position,
            column_type: row.try_get("column_type")?,
            data_type: row.try_get("data_type")?,
            is_nullable: row.try_get("is_nullable")?,
            default: row.try_get("column_default")?,
            extra: row.try_get("extra")?,
            comment: row.try_get("column_comment")?,
            char_length: row.try_get("char_length")?,
            numeric_precision: row.try_get("numeric_precision")?,
            numeric_scale: row.try_get("numeric_scale")?,
            datetime_precision: row.try_get("datetime_precision")?,
            table,
            column,
        });
    }
    Ok(columns)
}

async fn fetch_indexes(
    pool: &MySqlPool,
    tables: &[&str],
) -> std::result::Result<Vec<MySqlIndexRow>, IntrospectionError> {
    let sql = format!(
        "{INDEXES_QUERY}{} ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX",
        table_filter(tables.len())
    );
    let mut query = sqlx::query(&sql);
    for table in tables {
        query = query.bind(*table);
    }

    let rows = query.fetch_all(pool).await?;
    let mut indexes = Vec::with_capacity(rows.len());
    for row in &rows {
        let table: String = row.try_get("table_name")?;
        let column: Option<String> = row.try_get("column_name")?;
        let position = position(row, &table, column.as_deref())?;
        let non_unique: u64 = row.try_get("non_unique")?;
        indexes.push(MySqlIndexRow {
            index: row.try_get("index_name")?,
            position,
            non_unique: non_unique != 0,
            table,
            column,
        });
    }
    Ok(indexes)
}
