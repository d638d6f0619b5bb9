//! Error types for the recall feed pipeline.
//!
//! This module provides structured error handling with:
//! - `AppError`: errors that abort a run (or describe a local failure)
//! - `FailureScope`: how far a failure reaches (run, row, record, item)
//! - `RowError`: a listing row that could not be mapped to a record
//! - `Result<T>`: Type alias for Results using AppError

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// FAILURE SCOPE
// ============================================================================

/// How much work a failure invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureScope {
    /// The whole run is aborted and nothing is persisted.
    RunFatal,
    /// A single listing row is skipped.
    RowLocal,
    /// A single record loses its enrichment (proceeds with zero images).
    RecordLocal,
    /// A single image is skipped.
    ItemLocal,
}

impl FailureScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureScope::RunFatal => "run-fatal",
            FailureScope::RowLocal => "row-local",
            FailureScope::RecordLocal => "record-local",
            FailureScope::ItemLocal => "item-local",
        }
    }
}

// ============================================================================
// DOMAIN ERROR TYPE
// ============================================================================

#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Listing page could not be fetched
    #[error("Listing page unavailable ({url}): {message}")]
    ListingUnavailable { url: String, message: String },

    /// Listing page has no data table
    #[error("No listing table matched selector `{selector}`")]
    TableNotFound { selector: String },

    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration (selectors, settings file, mode)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Record store could not be read or written
    #[error("Record store error: {0}")]
    StoreError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

}

impl AppError {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Scope of this error when it escapes to the pipeline.
    ///
    /// Network failures are only ever raised for detail pages and images;
    /// the listing fetch is wrapped in `ListingUnavailable`. `InvalidUrl`
    /// escapes only from settings resolution and stays run-fatal.
    pub fn scope(&self) -> FailureScope {
        match self {
            AppError::NetworkError(_) => FailureScope::RecordLocal,
            _ => FailureScope::RunFatal,
        }
    }
}

/// A listing row that was skipped during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("row {row} has {found} columns, expected at least {expected}")]
    TooFewColumns {
        row: usize,
        found: usize,
        expected: usize,
    },
}

impl RowError {
    pub fn scope(&self) -> FailureScope {
        FailureScope::RowLocal
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;
