//! Error types for schema reconciliation.

use crate::dialect::admin::SpannerAdminError;

/// Errors that can occur while validating, diffing or applying a schema.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The desired schema is malformed. Raised before any I/O.
    #[error("Invalid desired schema: {0}")]
    Input(#[from] InputError),

    /// Reading the current schema failed.
    #[error("Failed to introspect current schema: {0}")]
    Introspection(#[from] IntrospectionError),

    /// Opening the DDL transaction or batch failed.
    #[error("Failed to begin DDL application: {0}")]
    Begin(#[source] DriverError),

    /// A generated statement failed to apply.
    #[error("Statement #{index} on table `{table}` failed: {source} (statement: {statement})")]
    Apply {
        /// Zero-based position of the failing statement in the plan.
        index: usize,
        /// Table the statement belongs to.
        table: String,
        /// The failing DDL text.
        statement: String,
        /// Driver-level cause.
        #[source]
        source: DriverError,
    },

    /// The desired schema uses a construct the target backend cannot express.
    #[error("{feature} is not supported by {dialect} ({})", location(.table, .column.as_deref()))]
    UnsupportedFeature {
        /// Dialect name.
        dialect: &'static str,
        /// Table the construct was declared on.
        table: String,
        /// Column the construct was declared on, if column-level.
        column: Option<String>,
        /// Human-readable description of the construct.
        feature: String,
    },

    /// IO error (reading a schema document).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema document could not be deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Creates an unsupported-feature error.
    pub fn unsupported(
        dialect: &'static str,
        table: &str,
        column: Option<&str>,
        feature: impl Into<String>,
    ) -> Self {
        Self::UnsupportedFeature {
            dialect,
            table: table.to_string(),
            column: column.map(str::to_string),
            feature: feature.into(),
        }
    }
}

/// Malformed desired input.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The source type spelling has no DDL representation in this dialect.
    #[error("{table}.{column}: cannot resolve type `{ty}`")]
    UnresolvedType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// The offending type spelling.
        ty: String,
    },

    /// Two desired tables share a name.
    #[error("table `{table}` is declared more than once")]
    DuplicateTable {
        /// Table name.
        table: String,
    },

    /// Two fields of one table map to the same column.
    #[error("{table}.{column}: column is declared more than once")]
    DuplicateColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A desired table has no fields.
    #[error("table `{table}` declares no columns")]
    EmptyTable {
        /// Table name.
        table: String,
    },

    /// Field options that cannot be combined.
    #[error("{table}.{column}: {reason}")]
    InvalidTag {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// What is wrong with the combination.
        reason: String,
    },
}

impl InputError {
    pub(crate) fn invalid_tag(table: &str, column: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTag {
            table: table.to_string(),
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure reading the live catalog.
#[derive(Debug, thiserror::Error)]
pub enum IntrospectionError {
    /// MySQL catalog query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Spanner catalog query failed.
    #[error("Spanner admin error: {0}")]
    Spanner(#[from] SpannerAdminError),

    /// A catalog row could not be interpreted.
    #[error("malformed catalog row for {table}.{column}: {reason}")]
    MalformedRow {
        /// Table name, or `?` when unknown.
        table: String,
        /// Column name, or `?` when unknown.
        column: String,
        /// What could not be read.
        reason: String,
    },
}

impl IntrospectionError {
    pub(crate) fn malformed(table: &str, column: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            table: table.to_string(),
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

/// Driver-level failure while executing DDL.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// MySQL driver error.
    #[error("Database error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Spanner admin API error.
    #[error("Spanner admin error: {0}")]
    Spanner(#[from] SpannerAdminError),
}

impl DriverError {
    /// Number of statements of a batch that completed before the failure,
    /// when the backend reports it.
    #[must_use]
    pub fn completed_statements(&self) -> Option<usize> {
        match self {
            Self::Sql(_) => None,
            Self::Spanner(err) => err.completed_statements(),
        }
    }
}

fn location(table: &str, column: Option<&str>) -> String {
    match column {
        Some(column) => format!("column `{table}.{column}`"),
        None => format!("table `{table}`"),
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, SyncError>;
