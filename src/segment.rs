//! Structural segmentation of Inter-American Court judgment text.
//!
//! Judgments arrive as a single markdown-ish string converted from PDF. This
//! module decomposes that string into page intervals, top-level sections
//! (preamble, roman-numbered bodies, operative part) and numbered paragraphs,
//! and assembles the pieces into flat, ordered records suitable for indexing.
//! Everything here is pure string analysis; no I/O happens in this module.

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use regex::Regex;

/// Page boundaries expressed as end offsets into the document text.
///
/// Page `i` covers the half-open byte interval `[ends[i-1], ends[i])`, with
/// page 0 starting at offset 0. The final entry always equals the document
/// length, so every offset in the document falls on some page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBoundaries {
    ends: Vec<usize>,
}

impl PageBoundaries {
    pub fn page_count(&self) -> usize {
        self.ends.len()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.ends
    }

    /// Pages whose interval touches `[start, end]`, as sorted zero-based indices.
    ///
    /// Overlap is inclusive on both edges, so a span ending exactly on a page
    /// boundary reports both adjacent pages. Always non-empty for offsets
    /// within the document.
    pub fn resolve(&self, start: usize, end: usize) -> BTreeSet<usize> {
        let mut pages = BTreeSet::new();
        let mut page_start = 0usize;
        for (index, &page_end) in self.ends.iter().enumerate() {
            let starts_within = page_start <= start && start <= page_end;
            let ends_within = page_start <= end && end <= page_end;
            let covers_page = start <= page_start && page_end <= end;
            if starts_within || ends_within || covers_page {
                pages.insert(index);
            }
            page_start = page_end;
        }
        pages
    }
}

/// Label for a top-level span of the judgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionLabel {
    /// Text before the first structural cue.
    Preamble,
    /// Text between a numeric opener (procedural lead-in) and the first roman heading.
    Extra,
    /// Roman-numbered section; carries the roman token as written ("I", "VIII", ...).
    Heading(String),
    /// Whole pre-operative body when no roman headings were found.
    Unlabeled,
    /// Operative part, from the resolutive marker to the end of the document.
    Conclusion,
}

impl SectionLabel {
    pub fn as_str(&self) -> &str {
        match self {
            SectionLabel::Preamble => "preambule",
            SectionLabel::Extra => "extra",
            SectionLabel::Heading(token) => token,
            SectionLabel::Unlabeled => "",
            SectionLabel::Conclusion => "conclusion",
        }
    }
}

/// Half-open span `[start, end)` of one top-level section, in document offsets.
///
/// For `Heading` spans the offsets cover the section body only; the heading
/// marker itself sits just before `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub label: SectionLabel,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphKind {
    /// Body of a numbered paragraph, or unnumbered text before the first one.
    Parr,
    /// Section had no numbered paragraphs at all.
    Empty,
}

/// Half-open span of one paragraph, relative to the section text it was cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphSpan {
    pub parr_num: Option<String>,
    pub start: usize,
    pub end: usize,
    pub kind: ParagraphKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Preamble,
    Section,
    Parr,
    Empty,
    Last,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Preamble => "preamble",
            RecordKind::Section => "section",
            RecordKind::Parr => "parr",
            RecordKind::Empty => "empty",
            RecordKind::Last => "last",
        }
    }
}

/// One indexable unit of a segmented judgment.
///
/// `order` is contiguous from 0 in reading order. `start`/`end` are byte
/// offsets into the original document text (regex matches keep them on
/// character boundaries). `pages` holds zero-based page indices, sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub document_id: i64,
    pub order: i64,
    pub kind: RecordKind,
    pub section: String,
    pub parr_num: Option<String>,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub pages: Vec<usize>,
}

#[derive(Debug)]
struct HeadingMatch {
    token: String,
    start: usize,
    end: usize,
}

#[derive(Debug)]
struct OpenerMatch {
    number: Option<String>,
    start: usize,
    end: usize,
}

/// Compiled segmentation patterns for court judgment text.
///
/// The patterns target the layout produced by PDF-to-markdown conversion of
/// the court's judgments: page numbers standing alone between blank lines,
/// bold roman section headings, the resolutive "Por tanto," marker and its
/// observed variants, and `N.`-numbered paragraphs.
#[derive(Debug)]
pub struct Segmenter {
    page_marker: Regex,
    section_heading: Regex,
    operative_marker: Regex,
    paragraph_opener: Regex,
    roman_opening_cue: Regex,
    numeric_opening_cue: Regex,
}

impl Segmenter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            page_marker: Regex::new(r"\s*\n\n(\d+)\n\n\s*")
                .context("failed to compile page marker regex")?,
            section_heading: Regex::new(r"\s*\*\*([IVXLC]+)\.?\*\*\s*|\n([IVXLC]+)\.?\n")
                .context("failed to compile section heading regex")?,
            operative_marker: Regex::new(
                r"\s*\*\*Por tanto,\*\*\s*|POR TANTO,\*\*\s*|\s*Por tanto,\s*|\s*Por lo tanto,\s*|\*\*POR TANTO:?\*\*|Por las razones expuestas,|\*\*VOTO PARCIALMENTE DISIDENTE DEL\*\*",
            )
            .context("failed to compile operative part regex")?,
            paragraph_opener: Regex::new(r"(?m)\n\n(\d+)\.\s*|^(\d+)\.\s*")
                .context("failed to compile paragraph opener regex")?,
            roman_opening_cue: Regex::new(r"\*\*I\.?\*\*|\nI\n")
                .context("failed to compile roman opening cue regex")?,
            numeric_opening_cue: Regex::new(r"\n\n1\.")
                .context("failed to compile numeric opening cue regex")?,
        })
    }

    /// Locates standalone page-number markers and returns the page boundaries.
    ///
    /// Each marker contributes a boundary at the end of its match, so the
    /// marker text itself counts toward the page it closes. A marker at the
    /// very start of the document opens page 0 rather than closing an empty
    /// one. A document without markers is a single page.
    pub fn detect_pages(&self, text: &str) -> PageBoundaries {
        let matches: Vec<regex::Match<'_>> = self.page_marker.find_iter(text).collect();

        if matches.is_empty() {
            return PageBoundaries {
                ends: vec![text.len()],
            };
        }

        let mut ends = Vec::with_capacity(matches.len() + 1);
        for (index, found) in matches.iter().enumerate() {
            if index == 0 && found.start() == 0 {
                continue;
            }
            ends.push(found.end());
        }
        if ends.last().copied() != Some(text.len()) {
            ends.push(text.len());
        }
        PageBoundaries { ends }
    }

    /// Splits the document into top-level section spans.
    ///
    /// The last occurrence of an operative-part marker divides the document:
    /// everything from there to the end is the conclusion span, and section
    /// headings are only honored before it. Fails when no operative marker
    /// exists anywhere, since the text is then not recognizable as a judgment.
    pub fn detect_sections(&self, text: &str) -> Result<Vec<SectionSpan>> {
        let Some(operative) = self.operative_marker.find_iter(text).last() else {
            bail!("no operative-part marker (\"Por tanto\" or variant) found");
        };

        let restricted = &text[..operative.start()];
        let conclusion = SectionSpan {
            label: SectionLabel::Conclusion,
            start: operative.start(),
            end: text.len(),
        };

        let mut headings = Vec::new();
        for captures in self.section_heading.captures_iter(restricted) {
            let Some(full) = captures.get(0) else { continue };
            let token = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|group| group.as_str())
                .unwrap_or_default()
                .to_string();
            headings.push(HeadingMatch {
                token,
                start: full.start(),
                end: full.end(),
            });
        }

        if headings.is_empty() {
            return Ok(vec![
                SectionSpan {
                    label: SectionLabel::Unlabeled,
                    start: 0,
                    end: restricted.len(),
                },
                conclusion,
            ]);
        }

        let roman_cue = self.roman_opening_cue.find(restricted);
        let numeric_cue = self.numeric_opening_cue.find(restricted);

        let mut sections = Vec::with_capacity(headings.len() + 3);
        match (roman_cue, numeric_cue) {
            (Some(roman), Some(numeric)) if numeric.start() < roman.start() => {
                // Numbered procedural lead-in before the first roman heading:
                // keep it as its own "extra" span between preamble and body.
                sections.push(SectionSpan {
                    label: SectionLabel::Preamble,
                    start: 0,
                    end: numeric.start(),
                });
                sections.push(SectionSpan {
                    label: SectionLabel::Extra,
                    start: numeric.end(),
                    end: roman.start(),
                });
            }
            (Some(roman), _) => {
                sections.push(SectionSpan {
                    label: SectionLabel::Preamble,
                    start: 0,
                    end: roman.start(),
                });
            }
            (None, Some(numeric)) => {
                sections.push(SectionSpan {
                    label: SectionLabel::Preamble,
                    start: 0,
                    end: numeric.start(),
                });
            }
            (None, None) => {
                sections.push(SectionSpan {
                    label: SectionLabel::Preamble,
                    start: 0,
                    end: headings[0].start,
                });
            }
        }

        for (index, heading) in headings.iter().enumerate() {
            let body_end = headings
                .get(index + 1)
                .map(|next| next.start)
                .unwrap_or(restricted.len());
            sections.push(SectionSpan {
                label: SectionLabel::Heading(heading.token.clone()),
                start: heading.end,
                end: body_end,
            });
        }

        sections.push(conclusion);
        Ok(sections)
    }

    /// Splits one section body into paragraph spans with section-relative offsets.
    ///
    /// Paragraph openers are `N.` after a blank line or at a line start. Text
    /// before the first opener becomes an unnumbered paragraph; a body with no
    /// openers yields a single `Empty` span covering everything.
    pub fn detect_paragraphs(&self, section_text: &str) -> Vec<ParagraphSpan> {
        let mut openers = Vec::new();
        for captures in self.paragraph_opener.captures_iter(section_text) {
            let Some(full) = captures.get(0) else { continue };
            let number = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|group| group.as_str().to_string());
            openers.push(OpenerMatch {
                number,
                start: full.start(),
                end: full.end(),
            });
        }

        if openers.is_empty() {
            return vec![ParagraphSpan {
                parr_num: None,
                start: 0,
                end: section_text.len(),
                kind: ParagraphKind::Empty,
            }];
        }

        let mut paragraphs = Vec::with_capacity(openers.len() + 1);
        if openers[0].start > 0 {
            paragraphs.push(ParagraphSpan {
                parr_num: None,
                start: 0,
                end: openers[0].start,
                kind: ParagraphKind::Parr,
            });
        }

        for (index, opener) in openers.iter().enumerate() {
            let body_end = openers
                .get(index + 1)
                .map(|next| next.start)
                .unwrap_or(section_text.len());
            paragraphs.push(ParagraphSpan {
                parr_num: opener.number.clone(),
                start: opener.end,
                end: body_end,
                kind: ParagraphKind::Parr,
            });
        }

        paragraphs
    }

    /// Runs the full decomposition and emits records in reading order.
    ///
    /// The first section span becomes one `Preamble` record and the last one
    /// the `Last` record. Every span in between contributes a `Section` header
    /// record (anchored on a synthetic span just before the body, covering the
    /// label width) followed by its paragraph records. Paragraph offsets are
    /// translated to document offsets before page resolution.
    pub fn assemble(&self, document_id: i64, text: &str) -> Result<Vec<Record>> {
        let boundaries = self.detect_pages(text);
        let sections = self.detect_sections(text)?;

        let Some((first, rest)) = sections.split_first() else {
            bail!("segmentation produced no sections");
        };
        let Some((conclusion, middle)) = rest.split_last() else {
            bail!("segmentation produced no conclusion span");
        };

        let mut records = Vec::new();
        records.push(Record {
            document_id,
            order: 0,
            kind: RecordKind::Preamble,
            section: "preamble".to_string(),
            parr_num: None,
            text: text[first.start..first.end].to_string(),
            start: first.start,
            end: first.end,
            pages: boundaries
                .resolve(first.start, first.end)
                .into_iter()
                .collect(),
        });

        for span in middle {
            let label = span.label.as_str().to_string();
            let header_start = span.start.saturating_sub(label.len());
            records.push(Record {
                document_id,
                order: records.len() as i64,
                kind: RecordKind::Section,
                section: label.clone(),
                parr_num: None,
                text: label.clone(),
                start: header_start,
                end: span.start,
                pages: boundaries
                    .resolve(header_start, span.start)
                    .into_iter()
                    .collect(),
            });

            for paragraph in self.detect_paragraphs(&text[span.start..span.end]) {
                let start = span.start + paragraph.start;
                let end = span.start + paragraph.end;
                records.push(Record {
                    document_id,
                    order: records.len() as i64,
                    kind: match paragraph.kind {
                        ParagraphKind::Parr => RecordKind::Parr,
                        ParagraphKind::Empty => RecordKind::Empty,
                    },
                    section: label.clone(),
                    parr_num: paragraph.parr_num,
                    text: text[start..end].to_string(),
                    start,
                    end,
                    pages: boundaries.resolve(start, end).into_iter().collect(),
                });
            }
        }

        records.push(Record {
            document_id,
            order: records.len() as i64,
            kind: RecordKind::Last,
            section: "last".to_string(),
            parr_num: None,
            text: text[conclusion.start..conclusion.end].to_string(),
            start: conclusion.start,
            end: conclusion.end,
            pages: boundaries
                .resolve(conclusion.start, conclusion.end)
                .into_iter()
                .collect(),
        });

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> Segmenter {
        Segmenter::new().expect("segmentation patterns compile")
    }

    fn pages(boundaries: &PageBoundaries, start: usize, end: usize) -> Vec<usize> {
        boundaries.resolve(start, end).into_iter().collect()
    }

    #[test]
    fn detect_pages_without_markers_is_single_page() {
        let boundaries = segmenter().detect_pages("Hola mundo.");
        assert_eq!(boundaries.as_slice(), &[11]);
        assert_eq!(boundaries.page_count(), 1);
        assert_eq!(pages(&boundaries, 0, 11), vec![0]);
    }

    #[test]
    fn detect_pages_cuts_at_marker_end() {
        let text = "alpha\n\n5\n\nbeta";
        let boundaries = segmenter().detect_pages(text);
        assert_eq!(boundaries.as_slice(), &[10, 14]);
        assert_eq!(pages(&boundaries, 0, 3), vec![0]);
        assert_eq!(pages(&boundaries, 12, 13), vec![1]);
    }

    #[test]
    fn detect_pages_skips_boundary_for_leading_marker() {
        let text = "\n\n3\n\nbody\n\n4\n\ntail";
        let boundaries = segmenter().detect_pages(text);
        assert_eq!(boundaries.as_slice(), &[14, text.len()]);
        assert_eq!(boundaries.page_count(), 2);
    }

    #[test]
    fn resolve_reports_every_touched_page() {
        let boundaries = PageBoundaries {
            ends: vec![10, 20, 30],
        };
        assert_eq!(pages(&boundaries, 5, 15), vec![0, 1]);
        assert_eq!(pages(&boundaries, 0, 30), vec![0, 1, 2]);
        // A span ending exactly on a boundary touches both pages.
        assert_eq!(pages(&boundaries, 10, 10), vec![0, 1]);
        assert_eq!(pages(&boundaries, 25, 27), vec![2]);
    }

    #[test]
    fn detect_sections_requires_operative_marker() {
        let result = segmenter().detect_sections("Texto sin parte resolutiva alguna");
        assert!(result.is_err());
    }

    #[test]
    fn detect_sections_uses_last_operative_occurrence() {
        let text = "intro Por tanto, quoted early\n\nmore\n\nPor tanto,\n\nfinal ruling";
        let sections = segmenter().detect_sections(text).expect("sections");
        let conclusion = sections.last().expect("conclusion span");
        assert_eq!(conclusion.label, SectionLabel::Conclusion);
        assert_eq!(conclusion.end, text.len());
        assert!(text[conclusion.start..].contains("final ruling"));
        assert!(conclusion.start > text.find("quoted early").unwrap());
    }

    #[test]
    fn detect_sections_builds_preamble_extra_and_heading_spans() {
        let text = "CORTE INTERAMERICANA\n\n1. Vistos antecedentes\n\n**I.**\nIntroduccion del caso\n\n**II.**\nCompetencia plena\n\n**Por tanto,**\nLA CORTE RESUELVE aprobar\n";
        let sections = segmenter().detect_sections(text).expect("sections");

        assert_eq!(sections.len(), 5);

        let numeric_cue = text.find("\n\n1.").unwrap();
        assert_eq!(sections[0].label, SectionLabel::Preamble);
        assert_eq!((sections[0].start, sections[0].end), (0, numeric_cue));

        assert_eq!(sections[1].label, SectionLabel::Extra);
        assert_eq!(sections[1].start, numeric_cue + 4);
        assert_eq!(sections[1].end, text.find("**I.**").unwrap());

        assert_eq!(sections[2].label, SectionLabel::Heading("I".to_string()));
        assert_eq!(sections[2].start, text.find("Introduccion").unwrap());
        assert_eq!(sections[2].end, text.find("\n\n**II.**").unwrap());

        assert_eq!(sections[3].label, SectionLabel::Heading("II".to_string()));
        assert_eq!(sections[3].start, text.find("Competencia").unwrap());
        assert_eq!(sections[3].end, text.find("\n\n**Por tanto,**").unwrap());

        assert_eq!(sections[4].label, SectionLabel::Conclusion);
        assert_eq!(sections[4].start, text.find("\n\n**Por tanto,**").unwrap());
        assert_eq!(sections[4].end, text.len());
    }

    #[test]
    fn detect_sections_without_headings_keeps_conclusion() {
        let text = "Resumen oficial del fallo\n\nPor tanto,\n\nSe aprueba.";
        let sections = segmenter().detect_sections(text).expect("sections");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].label, SectionLabel::Unlabeled);
        assert_eq!(sections[0].start, 0);
        assert_eq!(sections[1].label, SectionLabel::Conclusion);
        assert_eq!(sections[0].end, sections[1].start);
        assert_eq!(sections[1].end, text.len());
    }

    #[test]
    fn detect_sections_with_only_roman_cue_anchors_preamble_there() {
        let text = "Encabezado\n\n**I.**\nHechos probados\n\n**Por tanto,**\nResuelve.";
        let sections = segmenter().detect_sections(text).expect("sections");
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].label, SectionLabel::Preamble);
        assert_eq!(sections[0].end, text.find("**I.**").unwrap());
        assert_eq!(sections[1].label, SectionLabel::Heading("I".to_string()));
        assert_eq!(sections[1].start, text.find("Hechos").unwrap());
        assert_eq!(sections[2].label, SectionLabel::Conclusion);
    }

    #[test]
    fn detect_paragraphs_splits_on_numbered_openers() {
        let text = "Consideraciones previas\n\n12. Primera cuestion analizada\n\n13. Segunda cuestion";
        let paragraphs = segmenter().detect_paragraphs(text);

        assert_eq!(paragraphs.len(), 3);

        assert_eq!(paragraphs[0].parr_num, None);
        assert_eq!(paragraphs[0].kind, ParagraphKind::Parr);
        assert_eq!(paragraphs[0].start, 0);
        assert_eq!(paragraphs[0].end, text.find("\n\n12.").unwrap());

        assert_eq!(paragraphs[1].parr_num.as_deref(), Some("12"));
        assert_eq!(paragraphs[1].start, text.find("Primera").unwrap());
        assert_eq!(paragraphs[1].end, text.find("\n\n13.").unwrap());

        assert_eq!(paragraphs[2].parr_num.as_deref(), Some("13"));
        assert_eq!(paragraphs[2].start, text.find("Segunda").unwrap());
        assert_eq!(paragraphs[2].end, text.len());
    }

    #[test]
    fn detect_paragraphs_numbers_opener_at_text_start() {
        let paragraphs = segmenter().detect_paragraphs("1. Unica cuestion");
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].parr_num.as_deref(), Some("1"));
        assert_eq!(paragraphs[0].start, 3);
        assert_eq!(paragraphs[0].end, 17);
    }

    #[test]
    fn detect_paragraphs_accepts_opener_at_line_start() {
        let text = "Vistos\n2. Punto primero";
        let paragraphs = segmenter().detect_paragraphs(text);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].parr_num, None);
        assert_eq!((paragraphs[0].start, paragraphs[0].end), (0, 7));
        assert_eq!(paragraphs[1].parr_num.as_deref(), Some("2"));
        assert_eq!(paragraphs[1].start, text.find("Punto").unwrap());
    }

    #[test]
    fn detect_paragraphs_without_openers_is_one_empty_span() {
        let text = "Sin numeracion alguna";
        let paragraphs = segmenter().detect_paragraphs(text);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].kind, ParagraphKind::Empty);
        assert_eq!(paragraphs[0].parr_num, None);
        assert_eq!((paragraphs[0].start, paragraphs[0].end), (0, text.len()));
    }

    fn sample_judgment() -> String {
        concat!(
            "CORTE INTERAMERICANA DE DERECHOS HUMANOS",
            "\n\n1. Visto el expediente inicial",
            "\n\n**I.**\nINTRODUCCION",
            "\n\n1. La Corte examina el caso presentado",
            "\n\n2. El tramite continuo su curso",
            "\n\n14\n\n",
            "**II.**\nCOMPETENCIA\n\nLa Corte es competente segun la Convencion",
            "\n\n**Por tanto,**\nLA CORTE RESUELVE, por unanimidad, aprobar el informe\n",
        )
        .to_string()
    }

    #[test]
    fn assemble_emits_ordered_records() {
        let text = sample_judgment();
        let records = segmenter().assemble(279, &text).expect("records");

        assert_eq!(records.len(), 10);
        for (index, record) in records.iter().enumerate() {
            assert_eq!(record.order, index as i64);
            assert_eq!(record.document_id, 279);
        }

        let kinds: Vec<RecordKind> = records.iter().map(|record| record.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::Preamble,
                RecordKind::Section,
                RecordKind::Empty,
                RecordKind::Section,
                RecordKind::Parr,
                RecordKind::Parr,
                RecordKind::Parr,
                RecordKind::Section,
                RecordKind::Empty,
                RecordKind::Last,
            ]
        );

        let sections: Vec<&str> = records.iter().map(|record| record.section.as_str()).collect();
        assert_eq!(
            sections,
            vec!["preamble", "extra", "extra", "I", "I", "I", "I", "II", "II", "last"]
        );

        assert_eq!(records[0].text, "CORTE INTERAMERICANA DE DERECHOS HUMANOS");
        assert_eq!(records[1].text, "extra");
        assert_eq!(records[4].parr_num, None);
        assert_eq!(records[4].text, "INTRODUCCION");
        assert_eq!(records[5].parr_num.as_deref(), Some("1"));
        assert_eq!(records[5].text, "La Corte examina el caso presentado");
        assert_eq!(records[6].parr_num.as_deref(), Some("2"));
        // The page-number noise between sections stays inside the last paragraph.
        assert_eq!(records[6].text, "El tramite continuo su curso\n\n14");
        assert_eq!(records[9].kind, RecordKind::Last);
        assert!(records[9].text.contains("LA CORTE RESUELVE"));
    }

    #[test]
    fn assemble_resolves_pages_from_record_offsets() {
        let text = sample_judgment();
        let segmenter = segmenter();
        let boundaries = segmenter.detect_pages(&text);
        assert_eq!(boundaries.page_count(), 2);

        let records = segmenter.assemble(279, &text).expect("records");
        assert_eq!(records[0].pages, vec![0]);
        // The "II" header record sits past the page break, so it reports page 1
        // even though nothing else distinguishes it from its body.
        assert_eq!(records[7].pages, vec![1]);
        assert_eq!(records[8].pages, vec![1]);
        assert_eq!(records[9].pages, vec![1]);

        for record in &records {
            assert!(!record.pages.is_empty());
            for &page in &record.pages {
                assert!(page < boundaries.page_count());
            }
        }
    }

    #[test]
    fn assemble_is_deterministic() {
        let text = sample_judgment();
        let segmenter = segmenter();
        let first = segmenter.assemble(279, &text).expect("records");
        let second = segmenter.assemble(279, &text).expect("records");
        assert_eq!(first, second);
    }

    #[test]
    fn assemble_fails_without_operative_marker() {
        let result = segmenter().assemble(1, "Documento sin cierre reconocible");
        assert!(result.is_err());
    }

    #[test]
    fn assemble_covers_document_without_headings() {
        let text = "Informe breve\n\nPor tanto,\n\nSe resuelve archivar.";
        let records = segmenter().assemble(7, text).expect("records");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, RecordKind::Preamble);
        assert_eq!(records[0].section, "preamble");
        assert_eq!(records[1].kind, RecordKind::Last);
        assert_eq!(records[1].section, "last");
        assert_eq!(records[0].end, records[1].start);
        assert_eq!(format!("{}{}", records[0].text, records[1].text), text);
        assert_eq!(records[0].pages, vec![0]);
        assert_eq!(records[1].pages, vec![0]);
    }
}
