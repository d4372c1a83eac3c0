//! Error types for sheetfolio
//!
//! This module defines domain-specific error types that provide clear,
//! actionable error messages to users.

use thiserror::Error;

/// Errors raised while loading a sheet from the published spreadsheet.
///
/// Numeric parse failures and missing columns are not errors anywhere in
/// this crate; they degrade to zero. Everything here aborts the build.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("request for sheet '{name}' failed: {source}")]
    Http {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("sheet '{name}' returned HTTP status {status}")]
    Status { name: String, status: u16 },

    #[error("sheet '{name}' is not valid CSV: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    #[error("sheet '{0}' has no header row")]
    EmptySheet(String),
}
