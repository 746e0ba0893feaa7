//! DDL application.
//!
//! MySQL statements run one by one inside a client transaction. MySQL
//! commits DDL implicitly, so a rollback after a failure only releases the
//! connection: statements that already ran stay applied. Spanner statements
//! are queued and submitted as one batch at commit; when the batch fails
//! part way, the statements that completed stay applied as well.

use sqlx::{MySql, Transaction};
use tracing::{debug, info, warn};

use crate::dialect::{Dialect, SpannerAdmin};
use crate::diff::{diff, Statement};
use crate::error::{DriverError, Result, SyncError};
use crate::model::TableSpec;

/// A queued Spanner DDL batch.
pub struct SpannerBatch<'a> {
    admin: &'a dyn SpannerAdmin,
    statements: Vec<String>,
}

impl<'a> SpannerBatch<'a> {
    /// Creates an empty batch.
    #[must_use]
    pub fn new(admin: &'a dyn SpannerAdmin) -> Self {
        Self {
            admin,
            statements: Vec::new(),
        }
    }

    /// Statements queued so far.
    #[must_use]
    pub fn queued(&self) -> &[String] {
        &self.statements
    }
}

/// An open DDL transaction.
pub enum DdlTransaction<'a> {
    /// MySQL client transaction.
    MySql(Transaction<'static, MySql>),
    /// Spanner batch, submitted at commit.
    Spanner(SpannerBatch<'a>),
}

impl DdlTransaction<'_> {
    /// Executes (MySQL) or queues (Spanner) one statement.
    pub async fn exec(&mut self, sql: &str) -> std::result::Result<(), DriverError> {
        match self {
            Self::MySql(tx) => {
                sqlx::query(sql).execute(&mut **tx).await?;
            }
            Self::Spanner(batch) => batch.statements.push(sql.to_string()),
        }
        Ok(())
    }

    /// Commits the transaction, or submits the batch and waits for it.
    pub async fn commit(self) -> std::result::Result<(), DriverError> {
        match self {
            Self::MySql(tx) => tx.commit().await?,
            Self::Spanner(batch) => {
                if !batch.statements.is_empty() {
                    batch.admin.update_ddl(&batch.statements).await?;
                }
            }
        }
        Ok(())
    }

    /// Rolls back the transaction, or discards the queued batch.
    pub async fn rollback(self) -> std::result::Result<(), DriverError> {
        match self {
            Self::MySql(tx) => tx.rollback().await?,
            Self::Spanner(batch) => {
                debug!(discarded = batch.statements.len(), "Discarding Spanner batch");
            }
        }
        Ok(())
    }
}

/// Computes the diff against the database and applies it.
pub async fn apply(dialect: &Dialect, desired: &[TableSpec]) -> Result<()> {
    let statements = diff(dialect, desired).await?;
    apply_statements(dialect, &statements).await
}

/// Applies a precomputed plan inside one DDL transaction.
///
/// Stops at the first failure. The error carries the zero-based index of
/// the failing statement.
pub async fn apply_statements(dialect: &Dialect, statements: &[Statement]) -> Result<()> {
    if statements.is_empty() {
        info!("Schema is up to date");
        return Ok(());
    }

    info!(
        dialect = dialect.ddl().name(),
        statements = statements.len(),
        "Applying schema changes"
    );

    let mut tx = dialect.begin_ddl().await?;
    for (index, statement) in statements.iter().enumerate() {
        debug!(index, table = %statement.table, sql = %statement.sql, "Executing statement");
        if let Err(source) = tx.exec(&statement.sql).await {
            warn!(index, table = %statement.table, error = %source, "Statement failed, rolling back");
            if let Err(err) = tx.rollback().await {
                warn!(error = %err, "Rollback failed");
            }
            return Err(apply_error(statements, index, source));
        }
    }

    if let Err(source) = tx.commit().await {
        let last = statements.len() - 1;
        let index = source.completed_statements().map_or(last, |n| n.min(last));
        if index > 0 {
            warn!(
                completed = index,
                "DDL batch partially applied; completed statements stay in place"
            );
        }
        return Err(apply_error(statements, index, source));
    }

    info!(statements = statements.len(), "Schema changes applied");
    Ok(())
}

fn apply_error(statements: &[Statement], index: usize, source: DriverError) -> SyncError {
    let statement = &statements[index];
    SyncError::Apply {
        index,
        table: statement.table.clone(),
        statement: statement.sql.clone(),
        source,
    }
}
