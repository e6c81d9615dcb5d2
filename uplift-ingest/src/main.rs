//! uplift-ingest - CSV normalization pipeline
//!
//! Reads a CSV export, bulk-loads it into the raw staging table, and runs
//! the staging-to-normalized pipeline against the configured SQLite
//! database.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "uplift-ingest", version, about = "Normalize CSV survey/attendance/donation exports")]
struct Args {
    /// CSV file to ingest
    csv_file: PathBuf,

    /// SQLite database path (overrides UPLIFT_DATABASE and the config file)
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    info!("Starting uplift-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let db_path = uplift_common::config::resolve_database_path(args.database.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to resolve database path: {}", e))?;
    info!("Database: {}", db_path.display());

    let pool = uplift_common::db::init::init_database(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize database: {}", e))?;

    let rows = read_csv_rows(&args.csv_file)
        .with_context(|| format!("Failed to read {}", args.csv_file.display()))?;
    info!(row_count = rows.len(), file = %args.csv_file.display(), "Parsed CSV file");

    uplift_ingest::load_staging_rows(&pool, &rows).await?;

    let summary = uplift_ingest::run_normalization(&pool).await?;

    info!(run_id = %summary.run_id, "Ingest complete");

    // Machine-readable summary on stdout; logs stay on stderr
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Read a CSV file into raw row mappings (header name -> cell text).
///
/// Header cleanup (BOM, whitespace) happens later in the staging mapper;
/// here the file is taken as-is.
fn read_csv_rows(path: &Path) -> Result<Vec<HashMap<String, String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}
