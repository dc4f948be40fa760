use std::fs;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::InventoryArgs;
use crate::listing::{ListingParser, absolutize_links};
use crate::model::JudgmentInventoryManifest;
use crate::util::{now_utc_string, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let (html, listing_source) = load_listing(&args)?;
    let manifest = build_manifest(&html, &listing_source, &args.base_url)?;

    if args.dry_run {
        info!(
            judgment_count = manifest.judgment_count,
            source = %manifest.listing_source,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.cache_root
            .join("manifests")
            .join("judgment_inventory.json")
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(judgment_count = manifest.judgment_count, "inventory completed");

    Ok(())
}

fn load_listing(args: &InventoryArgs) -> Result<(String, String)> {
    match &args.listing_path {
        Some(path) => {
            let html = fs::read_to_string(path)
                .with_context(|| format!("failed to read listing file: {}", path.display()))?;
            Ok((html, path.display().to_string()))
        }
        None => {
            let html = fetch_listing(&args.listing_url)?;
            Ok((html, args.listing_url.clone()))
        }
    }
}

pub fn build_manifest(
    html: &str,
    listing_source: &str,
    base_url: &str,
) -> Result<JudgmentInventoryManifest> {
    let parser = ListingParser::new()?;
    let extraction = parser.parse_listing(html);

    for warning in &extraction.warnings {
        warn!(warning = %warning, "listing item skipped");
    }
    if extraction.skipped_count > 0 {
        info!(
            skipped = extraction.skipped_count,
            "some listing items did not parse"
        );
    }

    let mut judgments = extraction.entries;
    if judgments.is_empty() {
        bail!("no judgments found in listing: {listing_source}");
    }

    for entry in &mut judgments {
        absolutize_links(&mut entry.links, base_url);
    }

    Ok(JudgmentInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        listing_source: listing_source.to_string(),
        judgment_count: judgments.len(),
        judgments,
    })
}

fn fetch_listing(url: &str) -> Result<String> {
    info!(url = %url, "fetching judgment listing");

    let response = ureq::get(url)
        .call()
        .with_context(|| format!("failed to fetch listing: {url}"))?;

    response
        .into_string()
        .with_context(|| format!("failed to read listing body: {url}"))
}
