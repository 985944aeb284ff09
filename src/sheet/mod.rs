//! Spreadsheet decoding and display model.
//!
//! A fetched workbook arrives as opaque bytes.  [`decode_workbook`] parses
//! the first worksheet into a [`SheetGrid`] for tabular rendering, and
//! [`DownloadHandle`] keeps the original bytes retrievable as a file until
//! it is released.

pub mod decoder;
pub mod download;
pub mod grid;

pub use decoder::{decode_workbook, SheetError};
pub use download::DownloadHandle;
pub use grid::{Cell, CellValue, SheetGrid};
