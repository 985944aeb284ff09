//! The displayable grid produced by workbook decoding.
//!
//! Values pass through from the decoding library without coercion: numbers
//! stay numbers, text stays text, and absent cells are [`CellValue::Empty`].
//! Rows may be ragged — trailing empty cells are absent, not padded.

use std::fmt;

// ---------------------------------------------------------------------------
// CellValue
// ---------------------------------------------------------------------------

/// Raw content of one worksheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Int(i64),
    Bool(bool),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Empty => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// One cell record: `{ value }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self { value }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self {
            value: CellValue::Text(s.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// SheetGrid
// ---------------------------------------------------------------------------

/// An ordered sequence of rows, each an ordered sequence of cells.
///
/// Immutable after construction; a new fetch replaces the grid wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetGrid {
    rows: Vec<Vec<Cell>>,
}

impl SheetGrid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.  Rows may be ragged.
    pub fn col_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
