use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single page request. Never fatal for the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("could not build search url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("page numbers start at 1, got {0}")]
    InvalidPage(usize),
}

impl FetchError {
    /// Whether the opt-in transport retry may try the request again.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect(),
            FetchError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            FetchError::Malformed(_) | FetchError::InvalidUrl(_) | FetchError::InvalidPage(_) => false,
        }
    }
}

/// Output store could not be read or written.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("csv error in {path:?}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("query ledger {path:?} is unreadable: {source}")]
    Ledger { path: PathBuf, source: serde_json::Error },
}

/// Query list could not be loaded. Raised before any fetching begins.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file {0:?} does not exist")]
    NotFound(PathBuf),
    #[error("could not open workbook {path:?}: {source}")]
    Workbook { path: PathBuf, source: calamine::Error },
    #[error("workbook {0:?} has no worksheets")]
    NoWorksheet(PathBuf),
    #[error("could not read csv {path:?}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("column '{column}' not found in {path:?}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("no queries found in {0:?}")]
    Empty(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Fatal error that stops a run after the current query.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to persist records: {0}")]
    Store(#[from] StoreError),
}
