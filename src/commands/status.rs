use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::{IngestRunManifest, JudgmentInventoryManifest};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let inventory_path = manifest_dir.join("judgment_inventory.json");
    let db_path = args
        .db_path
        .unwrap_or_else(|| args.cache_root.join("corteidh_index.sqlite"));

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: JudgmentInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            judgment_count = inventory.judgment_count,
            source = %inventory.listing_source,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    match latest_run_manifest(&manifest_dir)? {
        Some(path) => {
            let run: IngestRunManifest = read_json(&path)?;
            info!(
                run_id = %run.run_id,
                status = %run.status,
                started_at = %run.started_at,
                updated_at = %run.updated_at,
                processed = run.counts.processed_count,
                failed = run.counts.failed_count,
                records_inserted = run.counts.records_inserted,
                warnings = run.warnings.len(),
                "loaded latest ingest run manifest"
            );
        }
        None => {
            warn!(path = %manifest_dir.display(), "no ingest runs recorded");
        }
    }

    if db_path.exists() {
        report_database(&db_path)?;
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

fn latest_run_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    let mut run_paths = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();

        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("ingest_run_") && name.ends_with(".json"))
            .unwrap_or(false);

        if is_run_manifest {
            run_paths.push(path);
        }
    }

    // Run filenames embed a compact UTC timestamp, so the lexicographic
    // maximum is the most recent run.
    run_paths.sort();
    Ok(run_paths.pop())
}

fn report_database(db_path: &Path) -> Result<()> {
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let schema_version =
        metadata_value(&connection, "db_schema_version").unwrap_or_else(|| "unknown".to_string());
    let document_count = query_count(&connection, "SELECT COUNT(*) FROM documents").unwrap_or(0);
    let record_count = query_count(&connection, "SELECT COUNT(*) FROM records").unwrap_or(0);

    info!(
        path = %db_path.display(),
        schema_version = %schema_version,
        documents = document_count,
        records = record_count,
        "database status"
    );

    let mut statement = connection
        .prepare("SELECT kind, COUNT(*) FROM records GROUP BY kind ORDER BY kind")
        .context("failed to prepare record kind breakdown")?;
    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let kind: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        info!(kind = %kind, count, "record kind count");
    }

    Ok(())
}

fn metadata_value(connection: &Connection, key: &str) -> Option<String> {
    connection
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .ok()
}

fn query_count(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}
