//! Definitions of errors that the row tracking kernel can encounter

use std::num::TryFromIntError;

use url::Url;

/// A [`std::result::Result`] that has the kernel [`Error`] as the error variant
pub type DeltaResult<T, E = Error> = std::result::Result<T, E>;

/// All the types of errors that the kernel can run into
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error that doesn't fit any of the other variants
    #[error("Generic delta kernel error: {0}")]
    Generic(String),

    /// An error enforcing an internal invariant. These indicate a bug in the kernel or in the
    /// caller, not a problem with the table.
    #[error("Internal error {0}. This is a kernel bug, please report.")]
    InternalError(String),

    /// An error encountered while (de)serializing JSON, including malformed domain metadata
    /// configurations and file statistics.
    #[error("Invalid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// An error performing an IO operation against the table's log directory
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Parsing of a url failed
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    /// A file in the log directory does not follow the expected naming scheme
    #[error("Invalid log path: {0}")]
    InvalidLogPath(String),

    /// The kernel does not support the requested operation on this table
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The protocol action is malformed or violates a feature dependency
    #[error("Invalid protocol action: {0}")]
    InvalidProtocol(String),

    /// Data required to build a snapshot was not found in the log
    #[error("Missing data: {0}")]
    MissingData(String),

    /// An add action needs a base row id but carries no `numRecords` statistic, so the row id
    /// range it occupies cannot be sized.
    #[error(
        "numRecords must be present in Add actions when row tracking is enabled (path: {path})"
    )]
    RowIdAssignmentWithoutStats { path: String },

    /// A version or row id computation overflowed its integer type
    #[error("Integer overflow: {0}")]
    Overflow(String),
}

// Convenience constructors for Error types that take a String argument
impl Error {
    pub fn generic(msg: impl ToString) -> Self {
        Self::Generic(msg.to_string())
    }

    pub fn internal_error(msg: impl ToString) -> Self {
        Self::InternalError(msg.to_string())
    }

    pub fn unsupported(msg: impl ToString) -> Self {
        Self::Unsupported(msg.to_string())
    }

    pub fn invalid_protocol(msg: impl ToString) -> Self {
        Self::InvalidProtocol(msg.to_string())
    }

    pub fn missing_data(msg: impl ToString) -> Self {
        Self::MissingData(msg.to_string())
    }

    pub fn invalid_log_path(location: &Url) -> Self {
        Self::InvalidLogPath(location.to_string())
    }

    pub fn row_id_assignment_without_stats(path: impl ToString) -> Self {
        Self::RowIdAssignmentWithoutStats {
            path: path.to_string(),
        }
    }

    pub fn overflow(msg: impl ToString) -> Self {
        Self::Overflow(msg.to_string())
    }
}

impl From<TryFromIntError> for Error {
    fn from(err: TryFromIntError) -> Self {
        Self::overflow(err)
    }
}
