//! Results held for display: advice, grid, and the download handle.
//!
//! [`BudgetSession`] enforces the resource discipline around the download
//! handle: the old handle is always released before a new one becomes
//! active, and grid + handle are cleared together (never one without the
//! other) before every decode attempt.

use crate::services::FinancialAdvice;
use crate::sheet::{DownloadHandle, SheetGrid};

// ---------------------------------------------------------------------------
// BudgetSession
// ---------------------------------------------------------------------------

/// Advice and spreadsheet state owned by the controller.
#[derive(Debug, Default)]
pub struct BudgetSession {
    advice: Option<FinancialAdvice>,
    grid: Option<SheetGrid>,
    download: Option<DownloadHandle>,
}

impl BudgetSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advice(&self) -> Option<&FinancialAdvice> {
        self.advice.as_ref()
    }

    pub fn grid(&self) -> Option<&SheetGrid> {
        self.grid.as_ref()
    }

    pub fn download(&self) -> Option<&DownloadHandle> {
        self.download.as_ref()
    }

    /// Store a fresh advice result.
    pub fn set_advice(&mut self, advice: FinancialAdvice) {
        self.advice = Some(advice);
    }

    /// Clear grid and download handle together, releasing the handle.
    ///
    /// Called before every decode attempt so a failure can never leave a
    /// stale grid or handle from an earlier success.
    pub fn clear_sheet(&mut self) {
        self.grid = None;
        if let Some(old) = self.download.take() {
            old.release();
        }
    }

    /// Install a fresh grid + handle pair, releasing any previous handle
    /// first so no two live handles exist simultaneously.
    pub fn install_sheet(&mut self, grid: SheetGrid, download: DownloadHandle) {
        if let Some(old) = self.download.take() {
            old.release();
        }
        self.grid = Some(grid);
        self.download = Some(download);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
