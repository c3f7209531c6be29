use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::config::OverwritePolicy;
use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Cells + tables
// ---------------------------------------------------------------------------

/// A single spreadsheet cell as loaded from CSV or Excel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Build a cell from a raw delimited-text field. Empty fields stay empty.
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(raw.to_string())
        }
    }

    /// Textual rendering used for comparisons and CSV export.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Empty => Cow::Borrowed(""),
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => Cow::Owned(n.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            Cell::Number(_) => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::from_raw(s)
    }
}

/// A rectangular table: one header row plus data rows.
///
/// Header names are trimmed on construction and every row is padded (or cut)
/// to the header width, so `cell(row, col)` never goes out of bounds for a
/// valid column index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Cell::Empty);
                r
            })
            .collect();
        Self { headers, rows }
    }

    /// Convenience constructor from string slices (tests, fixtures).
    pub fn from_strings(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| Cell::from_raw(c)).collect())
                .collect(),
        )
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h == name)
    }

    /// Resolve a column by name or fail with `MissingColumn` tagged with `table`.
    pub fn require_column(&self, table: &str, name: &str) -> Result<usize, ReconError> {
        if self.headers.is_empty() {
            return Err(ReconError::EmptyTable { table: table.into() });
        }
        self.column_index(name).ok_or_else(|| ReconError::MissingColumn {
            table: table.into(),
            column: name.trim().into(),
        })
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: Cell) {
        self.rows[row][col] = value;
    }

    /// Text values of one column, in row order.
    pub fn column_text(&self, col: usize) -> impl Iterator<Item = Cow<'_, str>> + '_ {
        self.rows.iter().map(move |r| r[col].as_text())
    }

    /// New table containing only the rows at `indexes`, in the given order.
    pub fn select_rows(&self, indexes: &[usize]) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: indexes.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// One record from the authoritative enrollment roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct RosterEntry {
    pub email: String,
    pub student_id: String,
}

impl RosterEntry {
    pub fn new(email: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            student_id: student_id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Per grade-book row join outcome. Kept beside the table rather than as
/// extra columns, so the emitted table never carries helper columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowMatch {
    pub email: String,
    pub student_id: Option<String>,
    pub new_score: Option<f64>,
    pub overwritten: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub total_rows: usize,
    /// Rows whose derived student id matched a live score.
    pub updated_count: usize,
    /// Rows with no matching live score.
    pub not_found_count: usize,
    /// Rows whose target cell was actually rewritten under the policy.
    pub overwritten_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub profile: String,
    pub policy: OverwritePolicy,
    pub target_column: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    #[serde(skip)]
    pub updated: Table,
    /// Matched rows only, after the update. Present for `OverwriteAlways`.
    #[serde(skip)]
    pub matched_only: Option<Table>,
    pub matches: Vec<RowMatch>,
}
