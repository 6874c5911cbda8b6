//! CSV upload ingestion.
//!
//! Uploads come from spreadsheets exported by hand, so the parser is
//! lenient: rows may have any number of cells, a header row is optional,
//! and URLs may be missing their scheme. Problems with individual rows are
//! collected as diagnostics and never abort the parse. Only a failure of
//! the CSV reader itself short-circuits, with a single top-level error.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;
use xpulse_core::{
    classify, mentions_known_domain, ClassifiedReference, ReferenceKind,
};

use crate::validate::{validate_batch_size, BatchValidation};

/// Header names that mark the URL column, matched case-insensitively as
/// substrings.
const URL_HEADER_HINTS: [&str; 3] = ["url", "link", "tweet"];

/// References extracted from one upload plus per-row diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSource {
    pub profiles: Vec<ClassifiedReference>,
    pub posts: Vec<ClassifiedReference>,
    pub invalid: Vec<ClassifiedReference>,
    /// `Row N: ...` messages, N being the 1-based line the row starts on.
    pub errors: Vec<String>,
    /// Blank lines and rows whose URL cell was missing or blank.
    pub skipped_rows: usize,
}

impl ParsedSource {
    /// Profiles and posts; invalid references are not counted.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.profiles.len() + self.posts.len()
    }

    #[must_use]
    pub fn is_mixed(&self) -> bool {
        !self.profiles.is_empty() && !self.posts.is_empty()
    }

    #[must_use]
    pub fn validate(&self, max_batch_size: usize) -> BatchValidation {
        validate_batch_size(&self.profiles, &self.posts, &self.invalid, max_batch_size)
    }

    fn failed(message: String) -> Self {
        Self {
            errors: vec![message],
            ..Self::default()
        }
    }
}

/// Parses CSV text into classified references.
#[must_use]
pub fn parse_source(raw_text: &str) -> ParsedSource {
    parse_source_bytes(raw_text.as_bytes())
}

/// Parses raw upload bytes. Non-UTF-8 content is reported as a CSV failure.
#[must_use]
pub fn parse_source_bytes(raw: &[u8]) -> ParsedSource {
    let rows = match read_rows(raw) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "CSV reader failed; discarding upload");
            return ParsedSource::failed(format!("failed to parse CSV: {e}"));
        }
    };

    let Some(first) = rows.first() else {
        return ParsedSource::default();
    };
    let (column, has_header) = select_column(&first.record);

    let mut errors = Vec::new();
    let mut skipped_rows = 0usize;
    let mut urls: Vec<String> = Vec::new();

    // First physical line not covered by a record seen so far.
    let mut next_line = 1u64;
    for (index, row) in rows.iter().enumerate() {
        skipped_rows += blank_lines_between(next_line, row.line);
        next_line = row
            .line
            .saturating_add(1)
            .saturating_add(embedded_newlines(&row.record));
        if index == 0 && has_header {
            continue;
        }

        let row_number = row.line;
        let cell = row.record.get(column).map_or("", |c| c.trim());

        if cell.is_empty() {
            skipped_rows += 1;
            continue;
        }

        if !mentions_known_domain(cell) {
            errors.push(format!(
                "Row {row_number}: not an x.com or twitter.com URL: {cell}"
            ));
            continue;
        }

        if parses_with_scheme_retry(cell) {
            urls.push(cell.to_owned());
        } else {
            errors.push(format!("Row {row_number}: invalid URL format: {cell}"));
        }
    }

    let mut parsed = ParsedSource {
        errors,
        skipped_rows,
        ..ParsedSource::default()
    };

    let mut seen_raw: HashSet<&str> = HashSet::new();
    let mut seen_normalized: HashSet<String> = HashSet::new();
    for url in &urls {
        if !seen_raw.insert(url.as_str()) {
            continue;
        }
        let reference = classify(url);
        if !seen_normalized.insert(reference.normalized.clone()) {
            continue;
        }
        match reference.kind {
            ReferenceKind::Profile { .. } => parsed.profiles.push(reference),
            ReferenceKind::Post { .. } => parsed.posts.push(reference),
            ReferenceKind::Invalid => parsed.invalid.push(reference),
        }
    }

    tracing::debug!(
        profiles = parsed.profiles.len(),
        posts = parsed.posts.len(),
        invalid = parsed.invalid.len(),
        errors = parsed.errors.len(),
        skipped_rows = parsed.skipped_rows,
        "parsed CSV source"
    );

    parsed
}

/// A record and the physical line it starts on.
struct Row {
    line: u64,
    record: csv::StringRecord,
}

/// Reads every record. The reader drops fully blank lines, so each record
/// keeps its starting line to recover them.
fn read_rows(raw: &[u8]) -> Result<Vec<Row>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw);
    reader
        .records()
        .enumerate()
        .map(|(index, record)| {
            record.map(|record| {
                let line = record.position().map_or_else(
                    || u64::try_from(index).unwrap_or(u64::MAX).saturating_add(1),
                    csv::Position::line,
                );
                Row { line, record }
            })
        })
        .collect()
}

fn blank_lines_between(next_line: u64, record_line: u64) -> usize {
    usize::try_from(record_line.saturating_sub(next_line)).unwrap_or(usize::MAX)
}

/// Line breaks inside quoted fields; the next record starts that many lines
/// further down.
fn embedded_newlines(record: &csv::StringRecord) -> u64 {
    let count: usize = record.iter().map(|field| field.matches('\n').count()).sum();
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Picks the URL column from the first row.
///
/// If any cell of the first row mentions a known domain, that row is data
/// and the first such cell's column is used. Otherwise the first row is a
/// header only if it looks like one (no cell contains `.` or `/`); the
/// column is then the first header matching [`URL_HEADER_HINTS`], falling
/// back to column 0.
fn select_column(first: &csv::StringRecord) -> (usize, bool) {
    if let Some(column) = first.iter().position(mentions_known_domain) {
        return (column, false);
    }

    let looks_like_header = first
        .iter()
        .all(|cell| !cell.contains('.') && !cell.contains('/'));
    if !looks_like_header {
        return (0, false);
    }

    let column = first
        .iter()
        .position(|cell| {
            let lower = cell.trim().to_ascii_lowercase();
            URL_HEADER_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .unwrap_or(0);
    (column, true)
}

fn parses_with_scheme_retry(cell: &str) -> bool {
    Url::parse(cell).is_ok() || Url::parse(&format!("https://{cell}")).is_ok()
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
