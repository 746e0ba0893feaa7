//! oxide-reconcile CLI
//!
//! Reconciles a MySQL database with a JSON schema document.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlx::mysql::MySqlPoolOptions;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_reconcile::prelude::*;

/// Declarative schema reconciliation.
#[derive(Parser)]
#[command(name = "oxide-reconcile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// MySQL connection string.
    #[arg(short, long, env = "DATABASE_URL")]
    database_url: String,

    /// Desired schema document (JSON).
    #[arg(short, long, env = "OXIDE_RECONCILE_SCHEMA", default_value = "schema.json")]
    schema: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the statements that would bring the database in line.
    Diff,

    /// Compute and apply the statements.
    Apply,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let document = SchemaDocument::from_path(&cli.schema)?;
    info!(
        schema = %cli.schema.display(),
        tables = document.tables.len(),
        "Loaded desired schema"
    );

    // Connect to database
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect(&cli.database_url)
        .await?;

    let dialect = Dialect::mysql(pool.clone()).await?;

    let outcome = match cli.command {
        Commands::Diff => diff(&dialect, &document.tables).await.map(|statements| {
            if statements.is_empty() {
                info!("Schema is up to date");
            }
            for statement in &statements {
                println!("{statement};");
            }
        }),
        Commands::Apply => apply(&dialect, &document.tables).await,
    };

    pool.close().await;
    outcome?;
    Ok(())
}
