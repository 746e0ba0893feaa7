//! Cloud Spanner admin client seam.
//!
//! The reconciler needs two things from Spanner: a read-only SQL query
//! against `INFORMATION_SCHEMA`, and a DDL batch submission that waits for
//! its long-running operation. Callers plug their own client in behind
//! [`SpannerAdmin`].

use async_trait::async_trait;

/// Errors reported by a [`SpannerAdmin`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpannerAdminError {
    /// The request could not be sent or was rejected.
    #[error("request failed: {0}")]
    Request(String),

    /// A DDL batch failed after `completed` statements were applied.
    #[error("DDL batch failed after {completed} statement(s): {message}")]
    Ddl {
        /// Statements of the batch that were applied before the failure.
        completed: usize,
        /// Error reported by the operation.
        message: String,
    },
}

impl SpannerAdminError {
    /// Statements of the batch that completed, when known.
    #[must_use]
    pub fn completed_statements(&self) -> Option<usize> {
        match self {
            Self::Request(_) => None,
            Self::Ddl { completed, .. } => Some(*completed),
        }
    }
}

/// Database admin operations used by the Spanner dialect.
///
/// Rows returned by [`execute_sql`](Self::execute_sql) use the REST/JSON
/// encoding: `INT64` values arrive as JSON strings, `BOOL` as JSON booleans
/// and `NULL` as JSON null.
#[async_trait]
pub trait SpannerAdmin: Send + Sync {
    /// Runs a read-only query and returns its rows.
    async fn execute_sql(&self, sql: &str) -> Result<Vec<Vec<serde_json::Value>>, SpannerAdminError>;

    /// Submits a DDL batch and waits for the operation to finish.
    async fn update_ddl(&self, statements: &[String]) -> Result<(), SpannerAdminError>;
}
