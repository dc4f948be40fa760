//! Parsing of the court's case-law listing page into a judgment inventory.
//!
//! The listing is an HTML search-result page where each `li.search-result`
//! item carries a judgment title line plus a table of download links. The
//! title encodes court, case, judgment type, date and series designation in a
//! fixed sentence shape; the numeric tail of the series designation is the
//! document id used everywhere else in this crate.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::model::{JudgmentEntry, JudgmentLinks};
use crate::util::condense_whitespace;

const SPANISH_MONTHS: [(&str, u32); 13] = [
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

#[derive(Debug, Default)]
pub struct ListingExtraction {
    pub entries: Vec<JudgmentEntry>,
    pub skipped_count: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct ListingParser {
    title_pattern: Regex,
    result_selector: Selector,
    row_selector: Selector,
    cell_selector: Selector,
    link_selector: Selector,
}

impl ListingParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            title_pattern: Regex::new(
                r".*Corte (?P<corte>.*)\. Caso (?P<caso>.*)\. (?P<tipo>.*)\. (?:Resolución|Sentencia) +del? (?:la Corte de )?(?P<fecha>.*)\.? Serie (?P<serie>.*)\. ",
            )
            .context("failed to compile judgment title regex")?,
            result_selector: parse_selector("li.search-result")?,
            row_selector: parse_selector("tr")?,
            cell_selector: parse_selector("td")?,
            link_selector: parse_selector("a")?,
        })
    }

    /// Extracts judgment entries from listing HTML, sorted by document id.
    ///
    /// Items whose title does not fit the judgment sentence shape (press
    /// releases, advisory opinions, stray markup) are skipped with a warning
    /// rather than failing the whole listing.
    pub fn parse_listing(&self, html: &str) -> ListingExtraction {
        let document = Html::parse_document(html);
        let mut extraction = ListingExtraction::default();

        for item in document.select(&self.result_selector) {
            let full_text = item.text().collect::<String>();
            match self.parse_entry(&item, &full_text) {
                Ok(entry) => extraction.entries.push(entry),
                Err(err) => {
                    let preview: String = condense_whitespace(&full_text).chars().take(120).collect();
                    extraction.skipped_count += 1;
                    extraction.warnings.push(format!("skipped listing item ({err}): {preview}"));
                }
            }
        }

        extraction.entries.sort_by_key(|entry| entry.document_id);
        extraction
    }

    fn parse_entry(&self, item: &ElementRef<'_>, full_text: &str) -> Result<JudgmentEntry> {
        let captures = self
            .title_pattern
            .captures(full_text)
            .context("title does not match judgment pattern")?;

        let corte = capture_text(&captures, "corte");
        let caso = capture_text(&captures, "caso");
        let tipo = capture_text(&captures, "tipo");
        let fecha = capture_text(&captures, "fecha");
        let serie = capture_text(&captures, "serie");

        let serial_token = serie.rsplit(' ').next().unwrap_or_default();
        let document_id: i64 = serial_token
            .parse()
            .with_context(|| format!("series designation has no numeric tail: {serie:?}"))?;

        let date = parse_spanish_date(&fecha).map(|parsed| parsed.format("%Y-%m-%d").to_string());
        if date.is_none() {
            warn!(document_id, fecha = %fecha, "could not parse judgment date");
        }

        let links = self.collect_links(item);

        Ok(JudgmentEntry {
            document_id,
            corte,
            caso,
            tipo,
            fecha,
            date,
            serie,
            links,
        })
    }

    /// Classifies the download links of one listing item.
    ///
    /// The first table row carries the judgment text itself (PDF and Word
    /// links side by side). A row whose first cell starts with "Resumen" is
    /// the official summary. Rows marked "Inglés" duplicate the text in
    /// English and are dropped; any other two-cell row is kept under its
    /// first-cell caption.
    fn collect_links(&self, item: &ElementRef<'_>) -> JudgmentLinks {
        let mut links = JudgmentLinks::default();

        for (row_index, row) in item.select(&self.row_selector).enumerate() {
            let row_text = row.text().collect::<String>();
            let cells: Vec<ElementRef<'_>> = row.select(&self.cell_selector).collect();
            if cells.len() < 2 {
                continue;
            }

            let first_cell_text = cells[0].text().collect::<String>();
            let first_cell_text = first_cell_text.trim();

            if row_index == 0 {
                for link in row.select(&self.link_selector) {
                    let Some(href) = link.value().attr("href") else {
                        continue;
                    };
                    if href.ends_with(".pdf") {
                        links.pdf = Some(href.to_string());
                    }
                    if href.ends_with(".doc") || href.ends_with(".docx") {
                        links.doc = Some(href.to_string());
                    }
                }
            } else if first_cell_text.starts_with("Resumen") {
                if let Some(href) = self.first_link_href(&cells[1]) {
                    links.resumen = Some(href);
                }
            } else if !row_text.trim().starts_with("Inglés") {
                if let Some(href) = self.first_link_href(&cells[1]) {
                    links.other.insert(first_cell_text.to_string(), href);
                }
            }
        }

        links
    }

    fn first_link_href(&self, cell: &ElementRef<'_>) -> Option<String> {
        cell.select(&self.link_selector)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(|href| href.trim().to_string())
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|err| anyhow!("invalid selector {selector:?}: {err}"))
}

fn capture_text(captures: &Captures<'_>, name: &str) -> String {
    captures
        .name(name)
        .map(|group| group.as_str().to_string())
        .unwrap_or_default()
}

/// Parses a Spanish long date such as "29 de mayo de 2014".
///
/// Token order is free; the first month name, the first 1-31 number and the
/// first four-digit year win. Accepts the Costa Rican "setiembre" spelling.
pub fn parse_spanish_date(raw: &str) -> Option<NaiveDate> {
    let normalized = raw.to_lowercase();
    let tokens = normalized
        .split(|ch: char| ch.is_whitespace() || ch == ',' || ch == '.')
        .filter(|token| !token.is_empty());

    let mut day: Option<u32> = None;
    let mut month: Option<u32> = None;
    let mut year: Option<i32> = None;

    for token in tokens {
        if let Some(&(_, number)) = SPANISH_MONTHS.iter().find(|(name, _)| *name == token) {
            month.get_or_insert(number);
            continue;
        }
        if let Ok(value) = token.parse::<u32>() {
            if value >= 1900 {
                year.get_or_insert(value as i32);
            } else if (1..=31).contains(&value) {
                day.get_or_insert(value);
            }
        }
    }

    NaiveDate::from_ymd_opt(year?, month?, day?)
}

/// Rewrites relative link targets against the site base URL.
pub fn absolutize_links(links: &mut JudgmentLinks, base_url: &str) {
    let base = base_url.trim_end_matches('/');
    let targets = links
        .pdf
        .iter_mut()
        .chain(links.doc.iter_mut())
        .chain(links.resumen.iter_mut())
        .chain(links.other.values_mut());
    for href in targets {
        if !href.starts_with("http://") && !href.starts_with("https://") {
            *href = format!("{}/{}", base, href.trim_start_matches('/'));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_FIXTURE: &str = r#"
<html><body><ul>
  <li class="search-result">
    <p>Corte IDH. Caso Ejemplo Vs. Atlantis. Fondo, Reparaciones y Costas. Sentencia de 29 de mayo de 2014. Serie C No. 279. </p>
    <table>
      <tr><td>Texto</td><td><a href="/docs/casos/articulos/seriec_279_esp.pdf">Español</a> <a href="/docs/casos/articulos/seriec_279_esp.doc">Word</a></td></tr>
      <tr><td>Resumen oficial</td><td><a href="/docs/casos/articulos/resumen_279_esp.pdf"> Resumen </a></td></tr>
      <tr><td>Inglés</td><td><a href="/docs/casos/articulos/seriec_279_ing.pdf">English</a></td></tr>
      <tr><td>Audiencia</td><td><a href="https://vimeo.com/album/123">Video</a></td></tr>
    </table>
  </li>
  <li class="search-result">
    <p>Comunicado de prensa sin patron de titulo</p>
  </li>
</ul></body></html>
"#;

    #[test]
    fn parse_listing_extracts_title_fields() {
        let parser = ListingParser::new().expect("parser");
        let extraction = parser.parse_listing(LISTING_FIXTURE);

        assert_eq!(extraction.entries.len(), 1);
        let entry = &extraction.entries[0];
        assert_eq!(entry.document_id, 279);
        assert_eq!(entry.corte, "IDH");
        assert_eq!(entry.caso, "Ejemplo Vs. Atlantis");
        assert_eq!(entry.tipo, "Fondo, Reparaciones y Costas");
        assert_eq!(entry.fecha, "29 de mayo de 2014");
        assert_eq!(entry.serie, "C No. 279");
        assert_eq!(entry.date.as_deref(), Some("2014-05-29"));
    }

    #[test]
    fn parse_listing_classifies_links() {
        let parser = ListingParser::new().expect("parser");
        let extraction = parser.parse_listing(LISTING_FIXTURE);
        let links = &extraction.entries[0].links;

        assert_eq!(links.pdf.as_deref(), Some("/docs/casos/articulos/seriec_279_esp.pdf"));
        assert_eq!(links.doc.as_deref(), Some("/docs/casos/articulos/seriec_279_esp.doc"));
        assert_eq!(links.resumen.as_deref(), Some("/docs/casos/articulos/resumen_279_esp.pdf"));
        assert_eq!(
            links.other.get("Audiencia").map(String::as_str),
            Some("https://vimeo.com/album/123")
        );
        // The English duplicate row must not leak into the link map.
        assert!(links.other.keys().all(|key| !key.starts_with("Inglés")));
        assert_eq!(links.other.len(), 1);
    }

    #[test]
    fn parse_listing_skips_items_without_judgment_title() {
        let parser = ListingParser::new().expect("parser");
        let extraction = parser.parse_listing(LISTING_FIXTURE);

        assert_eq!(extraction.skipped_count, 1);
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].contains("Comunicado"));
    }

    #[test]
    fn parse_listing_sorts_entries_by_document_id() {
        let html = r#"
<ul>
  <li class="search-result"><p>Corte IDH. Caso Beta Vs. Atlantis. Fondo. Sentencia de 1 de marzo de 2020. Serie C No. 400. </p></li>
  <li class="search-result"><p>Corte IDH. Caso Alfa Vs. Atlantis. Fondo. Sentencia de 2 de marzo de 2019. Serie C No. 377. </p></li>
</ul>
"#;
        let parser = ListingParser::new().expect("parser");
        let extraction = parser.parse_listing(html);
        let ids: Vec<i64> = extraction.entries.iter().map(|entry| entry.document_id).collect();
        assert_eq!(ids, vec![377, 400]);
    }

    #[test]
    fn parse_spanish_date_handles_long_form() {
        assert_eq!(
            parse_spanish_date("29 de mayo de 2014"),
            NaiveDate::from_ymd_opt(2014, 5, 29)
        );
        assert_eq!(
            parse_spanish_date("3 de setiembre de 2004"),
            NaiveDate::from_ymd_opt(2004, 9, 3)
        );
        assert_eq!(
            parse_spanish_date("1 de febrero de 2006."),
            NaiveDate::from_ymd_opt(2006, 2, 1)
        );
    }

    #[test]
    fn parse_spanish_date_rejects_incomplete_dates() {
        assert_eq!(parse_spanish_date("mayo de 2014"), None);
        assert_eq!(parse_spanish_date("sin fecha"), None);
        assert_eq!(parse_spanish_date(""), None);
    }

    #[test]
    fn absolutize_links_rewrites_relative_targets() {
        let mut links = JudgmentLinks {
            pdf: Some("/docs/seriec_1_esp.pdf".to_string()),
            doc: None,
            resumen: Some("https://example.org/resumen.pdf".to_string()),
            other: Default::default(),
        };
        absolutize_links(&mut links, "https://www.corteidh.or.cr/");
        assert_eq!(
            links.pdf.as_deref(),
            Some("https://www.corteidh.or.cr/docs/seriec_1_esp.pdf")
        );
        assert_eq!(links.resumen.as_deref(), Some("https://example.org/resumen.pdf"));
    }
}
