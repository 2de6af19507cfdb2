//! Recognises pipe tables inside document text and converts them into [`Table`]s.
//!
//! A table block is a header line, an alignment line, any number of data
//! lines, and an optional `^anchor` line. Every line of the block must start
//! and end with `|`.

use crate::core::table::{is_valid_anchor_id, Alignment, Cell, Header, Table, TablePosition};
use crate::{Result, TablesmithError};
use once_cell::sync::Lazy;
use regex::Regex;

static ALIGNMENT_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:?-+:?$").unwrap());


/// True when the trimmed line starts and ends with an unescaped `|`.
fn is_row_line(trimmed: &str) -> bool {
    trimmed.len() >= 2
        && trimmed.starts_with('|')
        && trimmed.ends_with('|')
        && !trimmed.ends_with("\\|")
}

/// Splits a row line into trimmed cell contents.
///
/// `\|` is an escaped delimiter and becomes a literal `|` in the content.
/// Returns `None` if the line is not a row line.
pub(crate) fn split_row(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if !is_row_line(trimmed) {
        return None;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    Some(cells)
}

fn is_header_line(line: &str) -> bool {
    split_row(line).is_some_and(|cells| cells.iter().any(|c| !c.is_empty()))
}

fn alignment_cells(line: &str) -> Option<Vec<Alignment>> {
    let cells = split_row(line)?;
    cells
        .iter()
        .map(|cell| {
            if !ALIGNMENT_CELL.is_match(cell) {
                return None;
            }
            Some(match (cell.starts_with(':'), cell.ends_with(':')) {
                (true, true) => Alignment::Center,
                (_, true) => Alignment::Right,
                _ => Alignment::Left,
            })
        })
        .collect()
}

fn anchor_of(line: &str) -> Option<String> {
    line.trim()
        .strip_prefix('^')
        .filter(|id| is_valid_anchor_id(id))
        .map(str::to_string)
}

/// `"\r"` when `text` uses CRLF line endings, otherwise `""`.
///
/// Text is split on `'\n'` throughout, so CRLF lines keep their `'\r'`;
/// lines written into such text need the same suffix.
pub(crate) fn carriage_return(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r"
    } else {
        ""
    }
}

/// Returns true when every row has exactly one cell per header.
pub fn validate_table(table: &Table) -> bool {
    !table.headers.is_empty()
        && table
            .cells
            .iter()
            .all(|row| row.len() == table.headers.len())
}

/// Parses a single table block.
///
/// `block` must contain only the table's lines: header, alignment, data rows
/// and an optional trailing anchor line.
///
/// # Errors
///
/// Returns [`TablesmithError::InvalidTableStructure`] if the header or
/// alignment line is missing or malformed, a line is not a table row, or a
/// row's cell count differs from the header count.
pub fn parse_table(block: &str, position: TablePosition) -> Result<Table> {
    let mut lines: Vec<&str> = block.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let anchor_id = match lines.last() {
        Some(last) if last.trim_start().starts_with('^') => {
            let id = anchor_of(last).ok_or_else(|| {
                TablesmithError::InvalidTableStructure(format!("malformed anchor line '{}'", last.trim()))
            })?;
            lines.pop();
            Some(id)
        }
        _ => None,
    };

    let header_line = lines
        .first()
        .filter(|l| is_header_line(l))
        .ok_or_else(|| TablesmithError::InvalidTableStructure("missing header line".to_string()))?;
    let header_cells = split_row(header_line).unwrap_or_default();

    let alignments = lines
        .get(1)
        .and_then(|l| alignment_cells(l))
        .ok_or_else(|| TablesmithError::InvalidTableStructure("missing alignment line".to_string()))?;
    if alignments.len() != header_cells.len() {
        return Err(TablesmithError::InvalidTableStructure(format!(
            "alignment line has {} cells but header has {}",
            alignments.len(),
            header_cells.len()
        )));
    }

    let headers: Vec<Header> = header_cells
        .into_iter()
        .zip(alignments)
        .enumerate()
        .map(|(i, (content, alignment))| Header {
            field: format!("col{}", i + 1),
            content,
            alignment,
        })
        .collect();

    let mut cells = Vec::with_capacity(lines.len().saturating_sub(2));
    for (offset, line) in lines.iter().enumerate().skip(2) {
        let row = split_row(line).ok_or_else(|| {
            TablesmithError::InvalidTableStructure(format!(
                "line {} is not a table row",
                position.start_line + offset
            ))
        })?;
        cells.push(row.into_iter().map(Cell::new).collect::<Vec<_>>());
    }

    let table = Table {
        headers,
        cells,
        position,
        anchor_id,
    };
    if !validate_table(&table) {
        return Err(TablesmithError::InvalidTableStructure(format!(
            "rows in the table at line {} do not all have {} cells",
            table.position.start_line,
            table.headers.len()
        )));
    }
    Ok(table)
}

/// Finds every well-formed table in `text`.
///
/// Blocks that look like tables but fail validation are skipped with a
/// warning rather than repaired.
pub fn parse_tables(text: &str, file_path: &str) -> Vec<Table> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut tables = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let starts_table = is_header_line(lines[i])
            && lines.get(i + 1).is_some_and(|l| alignment_cells(l).is_some());
        if !starts_table {
            i += 1;
            continue;
        }

        let mut end = i + 2;
        while end < lines.len() {
            let line = lines[end].trim();
            if line.is_empty() {
                break;
            }
            if line.starts_with('^') {
                if anchor_of(line).is_some() {
                    end += 1;
                }
                break;
            }
            if !is_row_line(line) {
                break;
            }
            end += 1;
        }

        let position = TablePosition {
            file_path: file_path.to_string(),
            start_line: i,
            end_line: end - 1,
            selection: None,
        };
        match parse_table(&lines[i..end].join("\n"), position) {
            Ok(table) => tables.push(table),
            Err(e) => log::warn!("Skipping table at {file_path}:{}: {e}", i + 1),
        }
        i = end;
    }

    log::debug!("Parsed {} table(s) from {file_path}", tables.len());
    tables
}
