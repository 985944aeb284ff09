//! Workbook bytes → [`SheetGrid`].
//!
//! Only the first worksheet in document order is read.  Cell values pass
//! through with whatever conversion the decoding library applies natively —
//! no type coercion, number formatting, or formula evaluation happens here.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use thiserror::Error;

use crate::sheet::grid::{Cell, CellValue, SheetGrid};

// ---------------------------------------------------------------------------
// SheetError
// ---------------------------------------------------------------------------

/// Errors produced by workbook decoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SheetError {
    /// The payload is not a recognizable workbook format.
    #[error("not a recognizable workbook: {0}")]
    Decode(String),

    /// The workbook contains zero worksheets, or its first worksheet has no
    /// cells.
    #[error("workbook contains no data")]
    EmptyWorkbook,
}

// ---------------------------------------------------------------------------
// decode_workbook
// ---------------------------------------------------------------------------

/// Parse workbook bytes into a grid of `{ value }` cells.
///
/// Rows are emitted in document order; trailing empty cells are trimmed
/// from each row (the grid is ragged, never padded).
///
/// # Errors
///
/// - [`SheetError::Decode`] — the bytes are not a workbook the library can
///   open.
/// - [`SheetError::EmptyWorkbook`] — no worksheets, or the first worksheet
///   has no cells.
///
/// # Example
///
/// ```rust,no_run
/// use budgetvoice::sheet::decode_workbook;
///
/// let bytes: Vec<u8> = std::fs::read("budget.xlsx").unwrap();
/// let grid = decode_workbook(&bytes).unwrap();
/// println!("{} rows", grid.row_count());
/// ```
pub fn decode_workbook(bytes: &[u8]) -> Result<SheetGrid, SheetError> {
    let cursor = Cursor::new(bytes);
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|e| SheetError::Decode(e.to_string()))?;

    // Only the first worksheet in document order is consumed.
    let range = match workbook.worksheet_range_at(0) {
        None => return Err(SheetError::EmptyWorkbook),
        Some(result) => result.map_err(|e| SheetError::Decode(e.to_string()))?,
    };

    grid_from_range(&range)
}

fn grid_from_range(range: &Range<Data>) -> Result<SheetGrid, SheetError> {
    if range.is_empty() {
        return Err(SheetError::EmptyWorkbook);
    }

    let mut rows = Vec::with_capacity(range.height());
    for row in range.rows() {
        let mut cells: Vec<Cell> = row.iter().map(|d| Cell::new(cell_value(d))).collect();

        // Trailing empties are absent, not padded.
        while cells.last().is_some_and(|c| c.value.is_empty()) {
            cells.pop();
        }

        rows.push(cells);
    }

    Ok(SheetGrid::new(rows))
}

/// Map a library cell to the raw pass-through value model.
///
/// Date/duration cells keep the library's native representation (serial
/// number or ISO string); error cells surface the error text.
fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
