//! Database dialect implementations.
//!
//! [`DdlDialect`] is the pure generation side: type resolution, quoting and
//! statement builders. [`Dialect`] binds one generation dialect to the live
//! handle the caller owns, and adds the two operations that need I/O:
//! catalog introspection and DDL application.

pub mod admin;
mod mysql;
mod spanner;

use std::sync::Arc;

use sqlx::MySqlPool;

pub use admin::{SpannerAdmin, SpannerAdminError};
pub use mysql::{
    detect_server, normalize_column_type, MySqlColumnRow, MySqlDialect, MySqlIndexRow,
    ServerFlavor, ServerVersion,
};
pub use spanner::SpannerDialect;

use crate::catalog::ColumnSchema;
use crate::error::{Result, SyncError};
use crate::executor::{DdlTransaction, SpannerBatch};
use crate::index::IndexDef;
use crate::model::{FieldSpec, TableSpec};
use crate::types::{normalize_ddl, TypeRegistry};

/// The comparable, normalized attributes of a column.
///
/// Two fields with equal attributes need no ALTER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAttributes {
    /// Normalized DDL type, carrying size, precision and scale.
    pub ddl_type: String,
    /// Effective nullability.
    pub nullable: bool,
    /// Normalized default literal.
    pub default: Option<String>,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Auto-incrementing.
    pub auto_increment: bool,
    /// Sole member of a unique secondary index.
    pub unique: bool,
    /// Normalized trailing clause or options.
    pub extra: Option<String>,
    /// Comment, when the dialect stores one.
    pub comment: Option<String>,
}

/// Statements replacing a primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryKeyChange {
    /// Statements, run before any other change to the table.
    pub statements: Vec<String>,
    /// Columns the statements add.
    pub added_columns: Vec<String>,
}

/// Trait for database-specific DDL generation.
pub trait DdlDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the type registry.
    fn types(&self) -> &TypeRegistry;

    /// Returns the DDL type for a field.
    fn type_of(&self, field: &FieldSpec) -> String;

    /// Quotes an identifier (table name, column name, etc.).
    fn quote(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Quotes a list of identifiers, comma separated.
    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Quotes a string literal.
    fn quote_literal(&self, value: &str) -> String;

    /// Generates a column definition.
    fn column_definition(&self, field: &FieldSpec) -> String;

    /// Generates the statements creating a table and its indexes.
    fn create_table(&self, table: &TableSpec, indexes: &[IndexDef]) -> Vec<String>;

    /// Generates the statements adding a column to an existing table.
    fn add_column(&self, table: &str, field: &FieldSpec) -> Result<Vec<String>>;

    /// Generates the statements turning `old` into `new`.
    fn alter_column(&self, table: &str, old: &FieldSpec, new: &FieldSpec) -> Result<Vec<String>>;

    /// Generates the statements dropping a column.
    fn drop_column(&self, table: &str, column: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote(table),
            self.quote(column)
        )]
    }

    /// Generates the statements creating a secondary index.
    fn create_index(&self, table: &str, name: &str, columns: &[String], unique: bool) -> Vec<String> {
        let unique = if unique { "UNIQUE " } else { "" };
        vec![format!(
            "CREATE {unique}INDEX {} ON {} ({})",
            self.quote(name),
            self.quote(table),
            self.quote_list(columns)
        )]
    }

    /// Generates the statements dropping a secondary index.
    fn drop_index(&self, table: &str, name: &str) -> Vec<String>;

    /// Generates the statements dropping a table that has the given
    /// secondary indexes.
    fn drop_table(&self, table: &str, indexes: &[IndexDef]) -> Vec<String>;

    /// Generates the statements moving a table's primary key from `from` to
    /// `to`. Either side may be empty.
    ///
    /// `added` are the fields the table gains that `to` covers. A dialect
    /// may add them as part of the key change; it reports the ones it did
    /// in [`PrimaryKeyChange::added_columns`].
    fn change_primary_key(
        &self,
        table: &str,
        from: &[String],
        to: &[String],
        added: &[&FieldSpec],
    ) -> Result<PrimaryKeyChange>;

    /// Checks that the backend can represent a table.
    fn validate_table(&self, _table: &TableSpec) -> Result<()> {
        Ok(())
    }

    /// Checks that the backend can represent a field.
    fn validate_field(&self, _table: &str, _field: &FieldSpec) -> Result<()> {
        Ok(())
    }

    /// The default literal as the catalog would report it.
    fn normalize_default(&self, field: &FieldSpec) -> Option<String>;

    /// The trailing clause as the catalog would report it.
    fn normalize_extra(&self, extra: Option<&str>) -> Option<String>;

    /// The comment as the catalog would report it.
    fn normalize_comment(&self, comment: Option<&str>) -> Option<String> {
        comment.filter(|c| !c.is_empty()).map(str::to_string)
    }

    /// The comparable attributes of a field.
    fn attributes(&self, field: &FieldSpec) -> ColumnAttributes {
        ColumnAttributes {
            ddl_type: normalize_ddl(&self.type_of(field)),
            nullable: field.is_nullable(),
            default: self.normalize_default(field),
            primary_key: field.primary_key,
            auto_increment: field.auto_increment,
            unique: field.unique,
            extra: self.normalize_extra(field.extra.as_deref()),
            comment: self.normalize_comment(field.comment.as_deref()),
        }
    }

    /// Reconstructs the field that would have produced a catalog column.
    ///
    /// The source type is the canonical spelling of the stored type. When
    /// that spelling does not generate the stored type back, the stored type
    /// is kept as an explicit override.
    fn field_from_column(&self, column: &ColumnSchema) -> FieldSpec {
        let ty = self
            .types()
            .canonical_source(&column.data_type, column.nullable)
            .unwrap_or_else(|| column.data_type.clone());

        let mut field = FieldSpec::new(column.name.clone(), ty).column(column.name.clone());
        field.nullable = column.nullable;
        field.comment = column.comment.clone();
        field.unique = column.unique;
        field.primary_key = column.primary_key;
        field.auto_increment = column.auto_increment;
        field.default = column.default.clone();
        field.size = column.size;
        field.precision = column.precision;
        field.scale = column.scale;
        field.extra = column.extra.clone();

        if normalize_ddl(&self.type_of(&field)) != normalize_ddl(&column.data_type) {
            field.db_type = Some(column.data_type.clone());
        }
        field
    }
}

// ============================================================================
// Bound dialects
// ============================================================================

/// A generation dialect bound to a live database handle.
pub enum Dialect {
    /// MySQL or MariaDB through a sqlx pool.
    MySql {
        /// Generation dialect, configured for the detected server.
        dialect: MySqlDialect,
        /// Caller-owned pool.
        pool: MySqlPool,
    },
    /// Cloud Spanner through an admin client.
    Spanner {
        /// Generation dialect.
        dialect: SpannerDialect,
        /// Caller-owned admin client.
        admin: Arc<dyn SpannerAdmin>,
    },
}

impl Dialect {
    /// Binds a MySQL pool, detecting the server flavor and version once.
    pub async fn mysql(pool: MySqlPool) -> Result<Self> {
        let server = detect_server(&pool).await?;
        Ok(Self::mysql_with(MySqlDialect::new(server), pool))
    }

    /// Binds a MySQL pool to a preconfigured dialect.
    #[must_use]
    pub fn mysql_with(dialect: MySqlDialect, pool: MySqlPool) -> Self {
        Self::MySql { dialect, pool }
    }

    /// Binds a Spanner admin client.
    #[must_use]
    pub fn spanner(admin: Arc<dyn SpannerAdmin>) -> Self {
        Self::spanner_with(SpannerDialect::new(), admin)
    }

    /// Binds a Spanner admin client to a preconfigured dialect.
    #[must_use]
    pub fn spanner_with(dialect: SpannerDialect, admin: Arc<dyn SpannerAdmin>) -> Self {
        Self::Spanner { dialect, admin }
    }

    /// Returns the generation dialect.
    #[must_use]
    pub fn ddl(&self) -> &dyn DdlDialect {
        match self {
            Self::MySql { dialect, .. } => dialect as &dyn DdlDialect,
            Self::Spanner { dialect, .. } => dialect as &dyn DdlDialect,
        }
    }

    /// Reads the current schema of the given tables, or of every table
    /// when `tables` is empty.
    pub async fn introspect(&self, tables: &[&str]) -> Result<Vec<ColumnSchema>> {
        let columns = match self {
            Self::MySql { dialect, pool } => dialect.introspect(pool, tables).await?,
            Self::Spanner { dialect, admin } => dialect.introspect(admin.as_ref(), tables).await?,
        };
        Ok(columns)
    }

    /// Opens a DDL transaction (MySQL) or batch (Spanner).
    pub async fn begin_ddl(&self) -> Result<DdlTransaction<'_>> {
        match self {
            Self::MySql { pool, .. } => {
                let tx = pool.begin().await.map_err(|e| SyncError::Begin(e.into()))?;
                Ok(DdlTransaction::MySql(tx))
            }
            Self::Spanner { admin, .. } => {
                Ok(DdlTransaction::Spanner(SpannerBatch::new(admin.as_ref())))
            }
        }
    }
}
