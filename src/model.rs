use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Download links attached to one listing item.
///
/// `pdf` and `doc` come from the first table row (the judgment text itself),
/// `resumen` from the official-summary row. Anything else the listing offers
/// (hearing recordings, separate opinions, ...) lands in `other` keyed by the
/// row caption.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JudgmentLinks {
    pub pdf: Option<String>,
    pub doc: Option<String>,
    pub resumen: Option<String>,
    #[serde(default)]
    pub other: BTreeMap<String, String>,
}

/// One judgment as described by the court's case-law listing.
///
/// `fecha` keeps the Spanish date text exactly as published; `date` is its
/// ISO-8601 rendering when parseable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentEntry {
    pub document_id: i64,
    pub corte: String,
    pub caso: String,
    pub tipo: String,
    pub fecha: String,
    pub date: Option<String>,
    pub serie: String,
    pub links: JudgmentLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub listing_source: String,
    pub judgment_count: usize,
    pub judgments: Vec<JudgmentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub rustc: Option<String>,
    pub cargo: Option<String>,
    pub converter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPaths {
    pub cache_root: String,
    pub inventory_manifest_path: String,
    pub pdf_dir: String,
    pub markdown_dir: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestCounts {
    pub judgment_count: usize,
    pub selected_count: usize,
    pub processed_count: usize,
    pub failed_count: usize,
    pub downloaded_pdf_count: usize,
    pub reused_pdf_count: usize,
    pub converted_count: usize,
    pub reused_markdown_count: usize,
    pub documents_upserted: usize,
    pub records_inserted: usize,
    pub original_records_inserted: usize,
    pub preamble_records: usize,
    pub section_records: usize,
    pub parr_records: usize,
    pub empty_records: usize,
    pub last_records: usize,
    pub documents_total: i64,
    pub records_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
