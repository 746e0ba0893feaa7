//! Declarative schema reconciliation for MySQL and Cloud Spanner.
//!
//! `oxide-reconcile` compares a desired schema, described as [`TableSpec`]s,
//! with what a live database reports, and produces the ordered DDL that turns
//! one into the other:
//! - Source types resolve through per-dialect equivalence sets, so `i64` and
//!   an existing `BIGINT` are not a change
//! - Statements are deterministic: tables in name order, and within a table
//!   key drops, index drops, column drops, column adds, key adds, column
//!   alters, then index creates
//! - Constructs a backend cannot represent fail before any I/O
//!
//! # Architecture
//!
//! - **Model** - Desired tables and fields, builders and a JSON document
//! - **Types** - Source type to DDL type resolution and equivalence sets
//! - **Dialect** - Introspection and DDL generation per backend
//! - **Diff** - The reconciliation engine over a current snapshot
//! - **Executor** - Runs a plan inside a DDL transaction
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_reconcile::prelude::*;
//!
//! let tables = vec![
//!     TableSpec::new("user")
//!         .field(FieldSpec::new("id", "u64").primary_key().auto_increment())
//!         .field(FieldSpec::new("email", "String").size(191).unique()),
//! ];
//!
//! let dialect = Dialect::mysql(pool).await?;
//! for statement in diff(&dialect, &tables).await? {
//!     println!("{statement};");
//! }
//! apply(&dialect, &tables).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Print the statements needed to reach schema.json
//! oxide-reconcile --schema schema.json diff
//!
//! # Apply them
//! oxide-reconcile --schema schema.json apply
//! ```

pub mod catalog;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod executor;
pub mod index;
pub mod model;
pub mod types;
pub mod validate;

pub use dialect::Dialect;
pub use diff::{diff, plan, Statement};
pub use error::{Result, SyncError};
pub use executor::{apply, apply_statements};
pub use model::{FieldSpec, IndexSpec, SchemaDocument, TableSpec};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::{ColumnSchema, IndexMembership};
    pub use crate::dialect::{
        DdlDialect, Dialect, MySqlDialect, SpannerAdmin, SpannerAdminError, SpannerDialect,
    };
    pub use crate::diff::{diff, plan, Statement};
    pub use crate::error::{DriverError, InputError, IntrospectionError, Result, SyncError};
    pub use crate::executor::{apply, apply_statements};
    pub use crate::model::{FieldSpec, IndexSpec, SchemaDocument, TableSpec};
    pub use crate::types::{TypeEquivalence, TypeRegistry};
}
