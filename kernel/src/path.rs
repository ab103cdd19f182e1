//! Utilities to make working with directory and file paths easier

use std::str::FromStr;

use url::Url;

use crate::{DeltaResult, Error, Version};

/// How many characters a version tag has
const VERSION_LEN: usize = 20;

/// The subdirectory name within the table root where the delta log resides
const DELTA_LOG_DIR: &str = "_delta_log/";

/// A parsed commit file in the `_delta_log` directory. Other log files (checkpoints, CRC files,
/// compactions) are not commits and parse to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedLogPath {
    pub location: Url,
    pub filename: String,
    pub version: Version,
}

// Parses a fixed-length string into the numeric type expected by the caller. A wrong length
// produces an error, even if the parse succeeded.
fn parse_path_part<T: FromStr>(value: &str, expect_len: usize, location: &Url) -> DeltaResult<T> {
    match value.parse() {
        Ok(result) if value.len() == expect_len => Ok(result),
        _ => Err(Error::invalid_log_path(location)),
    }
}

impl ParsedLogPath {
    /// Parse `location` as a published commit file (`<version:020>.json`). Returns `Ok(None)` for
    /// files that are not commits.
    pub(crate) fn try_from(location: Url) -> DeltaResult<Option<ParsedLogPath>> {
        let filename = location
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::invalid_log_path(&location))?
            .to_string();

        let Some((version, extension)) = filename.split_once('.') else {
            return Ok(None);
        };
        if extension != "json" || !version.chars().all(|c| c.is_ascii_digit()) {
            return Ok(None);
        }
        let version = parse_path_part(version, VERSION_LEN, &location)?;
        Ok(Some(ParsedLogPath {
            location,
            filename,
            version,
        }))
    }
}

/// The `_delta_log` directory of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogRoot(Url);

impl LogRoot {
    /// Create a new LogRoot from the table root URL (e.g. file:///tmp/table ->
    /// file:///tmp/table/_delta_log/)
    pub(crate) fn new(table_root: &Url) -> DeltaResult<Self> {
        let mut table_root = table_root.clone();
        if !table_root.path().ends_with('/') {
            let path = format!("{}/", table_root.path());
            table_root.set_path(&path);
        }
        Ok(Self(table_root.join(DELTA_LOG_DIR)?))
    }

    /// The log directory itself.
    pub(crate) fn location(&self) -> &Url {
        &self.0
    }

    /// Create a new commit path (absolute path) for the given version.
    pub(crate) fn new_commit_path(&self, version: Version) -> DeltaResult<ParsedLogPath> {
        let filename = format!("{version:020}.json");
        let path = self.0.join(&filename)?;
        ParsedLogPath::try_from(path)?.ok_or_else(|| {
            Error::internal_error(format!("Attempted to create an invalid path: {filename}"))
        })
    }
}
