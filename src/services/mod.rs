//! HTTP collaborators — the advice and spreadsheet services.
//!
//! Both clients share one failure contract ([`ServiceError`]) and the same
//! connection settings ([`crate::config::ServiceConfig`]).  Responses are
//! validated against explicit serde schemas at this boundary; a shape
//! mismatch fails with [`ServiceError::Schema`] instead of letting an
//! unexpected value reach the UI.

pub mod advice;
pub mod spreadsheet;

pub use advice::{AdviceService, FinancialAdvice, HttpAdviceService};
pub use spreadsheet::{HttpSpreadsheetService, SpreadsheetService};

#[cfg(test)]
pub use advice::MockAdviceService;
#[cfg(test)]
pub use spreadsheet::MockSpreadsheetService;

use thiserror::Error;

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Failure contract shared by the advice and spreadsheet services.
///
/// All variants carry a human-readable description so the UI can display
/// them without knowing the internal cause.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// HTTP transport or connection error.
    #[error("request failed: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not match the declared schema.
    #[error("unexpected response shape: {0}")]
    Schema(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display_is_human_readable() {
        let e = ServiceError::Status {
            status: 503,
            message: "service unavailable".into(),
        };
        let text = e.to_string();
        assert!(text.contains("503"));
        assert!(text.contains("service unavailable"));
    }

    #[test]
    fn schema_error_display_names_the_field() {
        let e = ServiceError::Schema("missing field `advice`".into());
        assert!(e.to_string().contains("advice"));
    }
}
