//! The table model: headers, cells, position and anchor.

use crate::core::dates;
use crate::{Result, TablesmithError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Horizontal alignment of a column, taken from the alignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Advisory type inferred from a cell's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    String,
    Number,
    Boolean,
    Date,
}

impl CellType {
    /// Infers the type of `content`: number, then boolean, then date, else string.
    ///
    /// Inference is advisory; the content itself is never rewritten.
    #[must_use]
    pub fn infer(content: &str) -> Self {
        let trimmed = content.trim();
        if trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
            Self::Number
        } else if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
            Self::Boolean
        } else if !trimmed.is_empty() && dates::parse_date(trimmed, None).is_some() {
            Self::Date
        } else {
            Self::String
        }
    }
}

/// One column header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Stable machine identifier (`col1`, `col2`, …), independent of `content`.
    pub field: String,
    /// Display text.
    pub content: String,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub cell_type: Option<CellType>,
}

impl Cell {
    /// Creates a cell from `content` with its type inferred.
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let cell_type = Some(CellType::infer(&content));
        Self {
            content,
            alignment: None,
            cell_type,
        }
    }

    /// True when the content is blank after trimming.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// An editor selection inside the table region, if the host reported one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

/// Where a table sits in its host document.
///
/// Lines are zero-based and both `start_line` and `end_line` are inclusive;
/// `end_line` is the anchor line when the table carries one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePosition {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
}

impl TablePosition {
    /// Number of document lines the table occupies, or `None` when
    /// `end_line` precedes `start_line`.
    #[must_use]
    pub fn line_count(&self) -> Option<usize> {
        self.end_line.checked_sub(self.start_line).map(|span| span + 1)
    }
}

/// A pipe table parsed out of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub headers: Vec<Header>,
    pub cells: Vec<Vec<Cell>>,
    pub position: TablePosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<String>,
}

static ANCHOR_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*$").unwrap());

/// True when `id` can be written as a `^id` anchor line and read back.
///
/// Ids start with an ASCII letter or digit and continue with letters, digits
/// or `-`. A valid id is also a valid anchor prefix.
#[must_use]
pub fn is_valid_anchor_id(id: &str) -> bool {
    ANCHOR_ID.is_match(id)
}

/// Returns a fresh opaque anchor identifier such as `table-1a2b3c4d`.
///
/// `prefix` must satisfy [`is_valid_anchor_id`] for the result to parse back.
pub fn new_anchor_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &hex[..8])
}

impl Table {
    /// Number of data rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    /// Finds a column by its display text.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h.content.trim() == name)
    }

    /// True when headers and cell contents match `other`, ignoring
    /// position, anchor and inferred metadata.
    #[must_use]
    pub fn same_content(&self, other: &Table) -> bool {
        self.headers.len() == other.headers.len()
            && self
                .headers
                .iter()
                .zip(&other.headers)
                .all(|(a, b)| a.content == b.content && a.alignment == b.alignment)
            && self.cells.len() == other.cells.len()
            && self.cells.iter().zip(&other.cells).all(|(a, b)| {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.content == y.content)
            })
    }

    /// True when `other` would render to the same text.
    #[must_use]
    pub fn same_rendering(&self, other: &Table) -> bool {
        self.same_content(other) && self.anchor_id == other.anchor_id
    }

    // ── Mutators ────────────────────────────────────────────────────

    /// Replaces the content of one cell and re-infers its type.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::InvalidTableStructure`] if `row` or `column`
    /// is out of range.
    pub fn set_cell(&mut self, row: usize, column: usize, content: impl Into<String>) -> Result<()> {
        let width = self.headers.len();
        let rows = self.cells.len();
        let cell = self
            .cells
            .get_mut(row)
            .and_then(|r| r.get_mut(column))
            .ok_or_else(|| {
                TablesmithError::InvalidTableStructure(format!(
                    "no cell at row {row}, column {column} (table has {rows} rows, {width} columns)"
                ))
            })?;
        let alignment = cell.alignment;
        *cell = Cell::new(content);
        cell.alignment = alignment;
        Ok(())
    }

    /// Appends a row of empty cells.
    pub fn add_row(&mut self) {
        self.cells.push(self.empty_row());
    }

    /// Inserts `values` as a new row at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::InvalidTableStructure`] if `index` is past the
    /// end or `values` does not have one entry per header.
    pub fn insert_row(&mut self, index: usize, values: Vec<String>) -> Result<()> {
        if index > self.cells.len() {
            return Err(TablesmithError::InvalidTableStructure(format!(
                "row index {index} out of range"
            )));
        }
        if values.len() != self.headers.len() {
            return Err(TablesmithError::InvalidTableStructure(format!(
                "row has {} cells but table has {} columns",
                values.len(),
                self.headers.len()
            )));
        }
        self.cells.insert(index, values.into_iter().map(Cell::new).collect());
        Ok(())
    }

    /// Removes and returns the row at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::InvalidTableStructure`] if `index` is out of range.
    pub fn remove_row(&mut self, index: usize) -> Result<Vec<Cell>> {
        if index >= self.cells.len() {
            return Err(TablesmithError::InvalidTableStructure(format!(
                "row index {index} out of range"
            )));
        }
        Ok(self.cells.remove(index))
    }

    /// Appends a column named `name`, filling every row with an empty cell.
    ///
    /// The new header gets the next unused `colN` field id.
    pub fn add_column(&mut self, name: impl Into<String>) {
        let next = self
            .headers
            .iter()
            .filter_map(|h| h.field.strip_prefix("col")?.parse::<usize>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        self.headers.push(Header {
            field: format!("col{next}"),
            content: name.into(),
            alignment: Alignment::Left,
        });
        for row in &mut self.cells {
            row.push(Cell::new(""));
        }
    }

    /// Removes the column at `index` from the headers and every row.
    ///
    /// Remaining field ids are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::InvalidTableStructure`] if `index` is out of
    /// range or the table would be left without columns.
    pub fn remove_column(&mut self, index: usize) -> Result<()> {
        if index >= self.headers.len() {
            return Err(TablesmithError::InvalidTableStructure(format!(
                "column index {index} out of range"
            )));
        }
        if self.headers.len() == 1 {
            return Err(TablesmithError::InvalidTableStructure(
                "a table needs at least one column".to_string(),
            ));
        }
        self.headers.remove(index);
        for row in &mut self.cells {
            if index < row.len() {
                row.remove(index);
            }
        }
        Ok(())
    }

    /// Changes a column's display text.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::InvalidTableStructure`] if `index` is out of range.
    pub fn rename_header(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        let header = self.headers.get_mut(index).ok_or_else(|| {
            TablesmithError::InvalidTableStructure(format!("column index {index} out of range"))
        })?;
        header.content = name.into();
        Ok(())
    }

    /// Changes a column's alignment.
    ///
    /// # Errors
    ///
    /// Returns [`TablesmithError::InvalidTableStructure`] if `index` is out of range.
    pub fn set_alignment(&mut self, index: usize, alignment: Alignment) -> Result<()> {
        let header = self.headers.get_mut(index).ok_or_else(|| {
            TablesmithError::InvalidTableStructure(format!("column index {index} out of range"))
        })?;
        header.alignment = alignment;
        Ok(())
    }

    fn empty_row(&self) -> Vec<Cell> {
        self.headers.iter().map(|_| Cell::new("")).collect()
    }
}
