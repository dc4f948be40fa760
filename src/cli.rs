use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "corteidh",
    version,
    about = "Local Inter-American Court judgment segmentation and query tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Ingest(IngestArgs),
    Query(QueryArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = ".cache/corteidh")]
    pub cache_root: PathBuf,

    #[arg(long, default_value = "https://www.corteidh.or.cr/casos_sentencias.cfm")]
    pub listing_url: String,

    #[arg(long, default_value = "https://www.corteidh.or.cr")]
    pub base_url: String,

    #[arg(long)]
    pub listing_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = ".cache/corteidh")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub inventory_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub min_document_id: Option<i64>,

    #[arg(long)]
    pub document_id: Option<i64>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value = "pdftotext")]
    pub converter: String,

    #[arg(long, default_value_t = false)]
    pub force_download: bool,

    #[arg(long, default_value_t = false)]
    pub force_convert: bool,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = ".cache/corteidh")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub query: String,

    #[arg(long)]
    pub document_id: Option<i64>,

    #[arg(long)]
    pub kind: Option<String>,

    #[arg(long)]
    pub section: Option<String>,

    #[arg(long)]
    pub page: Option<i64>,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/corteidh")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
