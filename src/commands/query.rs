use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, params};
use serde::Serialize;

use crate::cli::QueryArgs;
use crate::util::condense_whitespace;

#[derive(Debug, Serialize)]
struct QueryResult {
    rank: usize,
    record_id: String,
    document_id: i64,
    record_order: i64,
    kind: String,
    section: String,
    parr_num: Option<String>,
    caso: String,
    date: Option<String>,
    pages: Vec<i64>,
    page_first: Option<i64>,
    page_last: Option<i64>,
    snippet: String,
    citation: String,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    query: String,
    limit: usize,
    returned: usize,
    document_id_filter: Option<i64>,
    kind_filter: Option<String>,
    section_filter: Option<String>,
    page_filter: Option<i64>,
    results: Vec<QueryResult>,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let query_text = args.query.trim();
    if query_text.is_empty() {
        bail!("query must not be empty");
    }

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("corteidh_index.sqlite"));

    let connection = Connection::open_with_flags(
        &db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", db_path.display()))?;

    let kind_filter = normalize_filter(args.kind.as_deref()).map(|value| value.to_lowercase());
    let section_filter = normalize_filter(args.section.as_deref());

    let mut results = query_records(
        &connection,
        query_text,
        args.document_id,
        kind_filter.as_deref(),
        section_filter.as_deref(),
        args.page,
        args.limit,
    )?;

    for (index, result) in results.iter_mut().enumerate() {
        result.rank = index + 1;
    }

    if args.json {
        write_json_response(
            query_text,
            args.limit,
            args.document_id,
            kind_filter,
            section_filter,
            args.page,
            results,
        )
    } else {
        write_text_response(query_text, &results)
    }
}

fn normalize_filter(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn query_records(
    connection: &Connection,
    query_text: &str,
    document_id_filter: Option<i64>,
    kind_filter: Option<&str>,
    section_filter: Option<&str>,
    page_filter: Option<i64>,
    limit: usize,
) -> Result<Vec<QueryResult>> {
    let fts_query = to_fts_query(query_text);

    let mut statement = connection.prepare(
        "
        SELECT
          r.record_id,
          r.document_id,
          r.record_order,
          r.kind,
          r.section,
          r.parr_num,
          d.caso,
          d.date,
          r.pages,
          r.page_first,
          r.page_last,
          snippet(records_fts, 2, '[', ']', ' ... ', 18)
        FROM records_fts
        JOIN records r ON r.rowid = records_fts.rowid
        JOIN documents d ON d.document_id = r.document_id
        WHERE
          records_fts MATCH ?1
          AND (?2 IS NULL OR r.document_id = ?2)
          AND (?3 IS NULL OR r.kind = ?3)
          AND (?4 IS NULL OR r.section = ?4)
          AND (?5 IS NULL OR (r.page_first <= ?5 AND r.page_last >= ?5))
        ORDER BY bm25(records_fts) ASC
        LIMIT ?6
        ",
    )?;

    let mut rows = statement.query(params![
        fts_query,
        document_id_filter,
        kind_filter,
        section_filter,
        page_filter,
        limit as i64,
    ])?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let pages_json: String = row.get(8)?;
        let pages: Vec<i64> = serde_json::from_str(&pages_json).unwrap_or_default();

        let mut result = QueryResult {
            rank: 0,
            record_id: row.get(0)?,
            document_id: row.get(1)?,
            record_order: row.get(2)?,
            kind: row.get(3)?,
            section: row.get(4)?,
            parr_num: row.get(5)?,
            caso: row.get(6)?,
            date: row.get(7)?,
            pages,
            page_first: row.get(9)?,
            page_last: row.get(10)?,
            snippet: row.get(11)?,
            citation: String::new(),
        };
        result.citation = render_citation(&result);
        out.push(result);
    }

    Ok(out)
}

fn write_json_response(
    query_text: &str,
    limit: usize,
    document_id_filter: Option<i64>,
    kind_filter: Option<String>,
    section_filter: Option<String>,
    page_filter: Option<i64>,
    results: Vec<QueryResult>,
) -> Result<()> {
    let response = QueryResponse {
        query: query_text.to_string(),
        limit,
        returned: results.len(),
        document_id_filter,
        kind_filter,
        section_filter,
        page_filter,
        results,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &response)
        .context("failed to serialize query json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(query_text: &str, results: &[QueryResult]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {query_text}")?;
    writeln!(output, "Results: {}", results.len())?;

    for result in results {
        writeln!(
            output,
            "{}.\t{}\t{}\tpages {}",
            result.rank,
            result.record_id,
            result.kind,
            format_page_range(result.page_first, result.page_last)
        )?;
        writeln!(output, "\tcitation: {}", result.citation)?;
        writeln!(output, "\tsnippet: {}", condense_whitespace(&result.snippet))?;
    }

    output.flush()?;
    Ok(())
}

fn to_fts_query(query_text: &str) -> String {
    query_text
        .split_whitespace()
        .filter(|token| !token.trim().is_empty())
        .map(|token| format!("\"{}\"", token.replace('"', "")))
        .collect::<Vec<String>>()
        .join(" ")
}

fn format_page_range(start: Option<i64>, end: Option<i64>) -> String {
    match (start, end) {
        (Some(start), Some(end)) if start == end => start.to_string(),
        (Some(start), Some(end)) => format!("{start}-{end}"),
        (Some(start), None) => start.to_string(),
        (None, Some(end)) => end.to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Human-readable pinpoint for a hit, e.g.
/// `Caso Ejemplo Vs. Atlantis, parr. 3 (section II), pages 1`.
fn render_citation(result: &QueryResult) -> String {
    let location = match result.kind.as_str() {
        "parr" => match result.parr_num.as_deref() {
            Some(number) => format!("parr. {number} ({})", section_label(&result.section)),
            None => format!("unnumbered text ({})", section_label(&result.section)),
        },
        "section" => format!("heading of {}", section_label(&result.section)),
        "preamble" => "preamble".to_string(),
        "last" => "operative part".to_string(),
        "original" => "full text".to_string(),
        _ => section_label(&result.section),
    };

    format!(
        "Caso {}, {}, pages {}",
        result.caso,
        location,
        format_page_range(result.page_first, result.page_last)
    )
}

fn section_label(section: &str) -> String {
    if section.is_empty() {
        "unlabeled section".to_string()
    } else {
        format!("section {section}")
    }
}
