use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::model::{
    IngestCounts, IngestPaths, IngestRunManifest, JudgmentEntry, JudgmentInventoryManifest,
    ToolVersions,
};
use crate::segment::{Record, RecordKind, Segmenter};
use crate::util::{
    ensure_directory, filename_from_url, now_utc_string, read_json, sha256_file,
    utc_compact_string, write_json_pretty,
};

pub(crate) const DB_SCHEMA_VERSION: &str = "0.1.0";

/// Provenance of the PDF a document's text was converted from.
pub(crate) struct SourcePdf<'a> {
    pub url: &'a str,
    pub filename: &'a str,
    pub sha256: &'a str,
}

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    let pdf_dir = cache_root.join("pdfs");
    let markdown_dir = cache_root.join("markdown");
    ensure_directory(&manifest_dir)?;
    ensure_directory(&pdf_dir)?;
    ensure_directory(&markdown_dir)?;

    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("judgment_inventory.json"));
    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| cache_root.join("corteidh_index.sqlite"));

    info!(cache_root = %cache_root.display(), run_id = %run_id, "starting ingest");

    let inventory: JudgmentInventoryManifest = read_json(&inventory_manifest_path)?;
    info!(
        path = %inventory_manifest_path.display(),
        judgment_count = inventory.judgment_count,
        "loaded judgment inventory"
    );

    let tool_versions = collect_tool_versions(&args.converter);

    let mut connection = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;

    let segmenter = Segmenter::new()?;
    let mut counts = IngestCounts {
        judgment_count: inventory.judgments.len(),
        ..IngestCounts::default()
    };
    let mut warnings: Vec<String> = Vec::new();

    let selected = select_entries(
        &inventory.judgments,
        args.min_document_id,
        args.document_id,
        args.limit,
    );
    counts.selected_count = selected.len();

    for entry in selected {
        match ingest_judgment(
            &mut connection,
            &segmenter,
            entry,
            &pdf_dir,
            &markdown_dir,
            &args,
            &mut counts,
        ) {
            Ok(()) => counts.processed_count += 1,
            Err(err) => {
                counts.failed_count += 1;
                warn!(document_id = entry.document_id, error = %err, "skipping judgment");
                warnings.push(format!("document {}: {err:#}", entry.document_id));
            }
        }
    }

    sync_fts_index(&connection)?;

    counts.documents_total = count_rows(&connection, "SELECT COUNT(*) FROM documents")?;
    counts.records_total = count_rows(&connection, "SELECT COUNT(*) FROM records")?;
    let updated_at = now_utc_string();

    let status = if counts.failed_count == 0 {
        "completed"
    } else {
        "completed_with_failures"
    };

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        started_at,
        updated_at,
        command: render_ingest_command(&args),
        tool_versions,
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            pdf_dir: pdf_dir.display().to_string(),
            markdown_dir: markdown_dir.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts: counts.clone(),
        warnings,
        notes: vec![
            "Records are replaced per document, so re-running ingest is idempotent.".to_string(),
            "Segmentation works on converted markdown; the PDF itself is only hashed.".to_string(),
        ],
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        processed = counts.processed_count,
        failed = counts.failed_count,
        documents = counts.documents_total,
        records = counts.records_total,
        "ingest completed"
    );

    Ok(())
}

/// Applies the id filters and limit to the inventory, oldest judgment first.
fn select_entries<'a>(
    judgments: &'a [JudgmentEntry],
    min_document_id: Option<i64>,
    document_id: Option<i64>,
    limit: Option<usize>,
) -> Vec<&'a JudgmentEntry> {
    let mut selected: Vec<&JudgmentEntry> = judgments
        .iter()
        .filter(|entry| min_document_id.is_none_or(|min| entry.document_id >= min))
        .filter(|entry| document_id.is_none_or(|target| entry.document_id == target))
        .collect();
    selected.sort_by_key(|entry| entry.document_id);
    if let Some(limit) = limit {
        selected.truncate(limit);
    }
    selected
}

fn ingest_judgment(
    connection: &mut Connection,
    segmenter: &Segmenter,
    entry: &JudgmentEntry,
    pdf_dir: &Path,
    markdown_dir: &Path,
    args: &IngestArgs,
    counts: &mut IngestCounts,
) -> Result<()> {
    let pdf_url = entry
        .links
        .pdf
        .as_deref()
        .context("inventory entry has no pdf link")?;

    let pdf_filename = filename_from_url(pdf_url);
    let pdf_path = pdf_dir.join(&pdf_filename);

    if args.force_download || !pdf_path.exists() {
        download_file(pdf_url, &pdf_path)?;
        counts.downloaded_pdf_count += 1;
        info!(document_id = entry.document_id, path = %pdf_path.display(), "downloaded pdf");
    } else {
        counts.reused_pdf_count += 1;
    }

    let markdown_path = markdown_dir.join(format!("{}.md", entry.document_id));
    if args.force_convert || !markdown_path.exists() {
        convert_pdf(&args.converter, &pdf_path, &markdown_path)?;
        counts.converted_count += 1;
    } else {
        counts.reused_markdown_count += 1;
    }

    let text = fs::read_to_string(&markdown_path)
        .with_context(|| format!("failed to read {}", markdown_path.display()))?;

    let records = segmenter.assemble(entry.document_id, &text)?;
    let page_count = segmenter.detect_pages(&text).page_count();
    let pdf_sha256 = sha256_file(&pdf_path)?;

    for record in &records {
        match record.kind {
            RecordKind::Preamble => counts.preamble_records += 1,
            RecordKind::Section => counts.section_records += 1,
            RecordKind::Parr => counts.parr_records += 1,
            RecordKind::Empty => counts.empty_records += 1,
            RecordKind::Last => counts.last_records += 1,
        }
    }

    let source = SourcePdf {
        url: pdf_url,
        filename: &pdf_filename,
        sha256: &pdf_sha256,
    };
    persist_document(connection, entry, &source, &text, &records, page_count)?;

    counts.documents_upserted += 1;
    counts.records_inserted += records.len();
    counts.original_records_inserted += 1;

    info!(
        document_id = entry.document_id,
        records = records.len(),
        pages = page_count,
        "segmented judgment"
    );

    Ok(())
}

fn download_file(url: &str, target: &Path) -> Result<()> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("failed to download {url}"))?;
    let mut reader = response.into_reader();
    let mut file = File::create(target)
        .with_context(|| format!("failed to create {}", target.display()))?;
    io::copy(&mut reader, &mut file)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(())
}

/// Runs the external PDF-to-text converter as `<converter> <pdf> <output>`.
///
/// `pdftotext` fits that signature out of the box; a wrapper script around a
/// markdown converter works the same way and preserves the bold heading
/// markers the segmenter also understands.
fn convert_pdf(converter: &str, pdf_path: &Path, output_path: &Path) -> Result<()> {
    let output = Command::new(converter)
        .arg(pdf_path)
        .arg(output_path)
        .output()
        .with_context(|| format!("failed to execute {converter} for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{converter} returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    if !output_path.exists() {
        bail!(
            "{converter} produced no output file at {}",
            output_path.display()
        );
    }

    Ok(())
}

pub(crate) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub(crate) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
          document_id INTEGER PRIMARY KEY,
          corte TEXT NOT NULL,
          caso TEXT NOT NULL,
          tipo TEXT NOT NULL,
          serie TEXT NOT NULL,
          fecha TEXT NOT NULL,
          date TEXT,
          pdf_url TEXT,
          pdf_filename TEXT,
          pdf_sha256 TEXT,
          full_text TEXT,
          record_count INTEGER DEFAULT 0,
          ingested_at TEXT
        );

        CREATE TABLE IF NOT EXISTS records (
          record_id TEXT PRIMARY KEY,
          document_id INTEGER NOT NULL,
          record_order INTEGER NOT NULL,
          kind TEXT NOT NULL,
          section TEXT NOT NULL,
          parr_num TEXT,
          text TEXT,
          start_offset INTEGER NOT NULL,
          end_offset INTEGER NOT NULL,
          pages TEXT NOT NULL,
          page_first INTEGER,
          page_last INTEGER,
          FOREIGN KEY(document_id) REFERENCES documents(document_id)
        );

        CREATE INDEX IF NOT EXISTS idx_records_document_order
          ON records(document_id, record_order);
        CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);
        CREATE INDEX IF NOT EXISTS idx_records_section ON records(document_id, section);
        ",
    )?;

    connection
        .execute(
            "
            CREATE VIRTUAL TABLE IF NOT EXISTS records_fts
            USING fts5(record_id, section, text, content='records', content_rowid='rowid')
            ",
            [],
        )
        .context("failed to initialize FTS5 table records_fts")?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

/// Writes one judgment and its records inside a single transaction.
///
/// Existing records for the document are deleted first, so ingesting the same
/// judgment again replaces its segmentation instead of accumulating rows. The
/// full converted text is stored twice on purpose: as a column on `documents`
/// and as an extra `original` record so full-document hits surface in search.
pub(crate) fn persist_document(
    connection: &mut Connection,
    entry: &JudgmentEntry,
    source: &SourcePdf<'_>,
    full_text: &str,
    records: &[Record],
    page_count: usize,
) -> Result<()> {
    let tx = connection.transaction()?;

    {
        tx.execute(
            "
            INSERT INTO documents(
              document_id, corte, caso, tipo, serie, fecha, date,
              pdf_url, pdf_filename, pdf_sha256, full_text, record_count, ingested_at
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(document_id) DO UPDATE SET
              corte=excluded.corte,
              caso=excluded.caso,
              tipo=excluded.tipo,
              serie=excluded.serie,
              fecha=excluded.fecha,
              date=excluded.date,
              pdf_url=excluded.pdf_url,
              pdf_filename=excluded.pdf_filename,
              pdf_sha256=excluded.pdf_sha256,
              full_text=excluded.full_text,
              record_count=excluded.record_count,
              ingested_at=excluded.ingested_at
            ",
            params![
                entry.document_id,
                &entry.corte,
                &entry.caso,
                &entry.tipo,
                &entry.serie,
                &entry.fecha,
                &entry.date,
                source.url,
                source.filename,
                source.sha256,
                full_text,
                records.len() as i64,
                now_utc_string(),
            ],
        )?;

        tx.execute(
            "DELETE FROM records WHERE document_id = ?1",
            params![entry.document_id],
        )?;

        let mut statement = tx.prepare(
            "
            INSERT INTO records(
              record_id, document_id, record_order, kind, section, parr_num,
              text, start_offset, end_offset, pages, page_first, page_last
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
        )?;

        for record in records {
            let record_id = format!("{}:{:04}", record.document_id, record.order);
            let pages_json = serde_json::to_string(&record.pages)
                .context("failed to serialize record pages")?;

            statement.execute(params![
                record_id,
                record.document_id,
                record.order,
                record.kind.as_str(),
                &record.section,
                &record.parr_num,
                &record.text,
                record.start as i64,
                record.end as i64,
                pages_json,
                record.pages.first().map(|page| *page as i64),
                record.pages.last().map(|page| *page as i64),
            ])?;
        }

        let all_pages: Vec<usize> = (0..page_count).collect();
        let pages_json =
            serde_json::to_string(&all_pages).context("failed to serialize document pages")?;
        statement.execute(params![
            format!("{}:original", entry.document_id),
            entry.document_id,
            -1_i64,
            "original",
            "",
            Option::<String>::None,
            full_text,
            0_i64,
            full_text.len() as i64,
            pages_json,
            0_i64,
            page_count.saturating_sub(1) as i64,
        ])?;
    }

    tx.commit()?;
    Ok(())
}

pub(crate) fn sync_fts_index(connection: &Connection) -> Result<()> {
    connection
        .execute("INSERT INTO records_fts(records_fts) VALUES('rebuild')", [])
        .context("failed to rebuild FTS index")?;
    Ok(())
}

pub(crate) fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

fn collect_tool_versions(converter: &str) -> ToolVersions {
    ToolVersions {
        rustc: command_version_optional("rustc", &["--version"]),
        cargo: command_version_optional("cargo", &["--version"]),
        converter: command_version_optional(converter, &["-v"]),
    }
}

fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        stdout.trim().to_string()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}

fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "corteidh".to_string(),
        "ingest".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(path) = &args.inventory_manifest_path {
        command.push("--inventory-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.ingest_manifest_path {
        command.push("--ingest-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(min) = args.min_document_id {
        command.push("--min-document-id".to_string());
        command.push(min.to_string());
    }
    if let Some(id) = args.document_id {
        command.push("--document-id".to_string());
        command.push(id.to_string());
    }
    if let Some(limit) = args.limit {
        command.push("--limit".to_string());
        command.push(limit.to_string());
    }
    if args.converter != "pdftotext" {
        command.push("--converter".to_string());
        command.push(args.converter.clone());
    }
    if args.force_download {
        command.push("--force-download".to_string());
    }
    if args.force_convert {
        command.push("--force-convert".to_string());
    }

    command.join(" ")
}
