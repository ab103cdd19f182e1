//! Builder for creating [`Snapshot`] instances.
use std::fs;

use tracing::{debug, info};
use url::Url;

use crate::action_source::{ActionSource as _, ChainedActionSource, JsonActionSource};
use crate::path::{LogRoot, ParsedLogPath};
use crate::snapshot::SnapshotRef;
use crate::{DeltaResult, Error, Snapshot, Version};

/// Builder for creating [`Snapshot`] instances.
///
/// # Example
///
/// ```no_run
/// # use rowid_kernel::Snapshot;
/// # use url::Url;
/// # fn example() -> rowid_kernel::DeltaResult<()> {
/// let table_root = Url::parse("file:///path/to/table/")?;
///
/// // Build a snapshot
/// let snapshot = Snapshot::builder_for(table_root.clone())
///     .at_version(5) // Optional: specify a time-travel version (default is latest version)
///     .build()?;
///
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SnapshotBuilder {
    table_root: Url,
    version: Option<Version>,
}

impl SnapshotBuilder {
    pub(crate) fn new_for(table_root: Url) -> Self {
        Self {
            table_root,
            version: None,
        }
    }

    /// Set the target version of the [`Snapshot`]. When omitted, the Snapshot is created at the
    /// latest version of the table.
    pub fn at_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Create a new [`Snapshot`] by listing the table's `_delta_log` directory and replaying every
    /// commit up to the requested version.
    pub fn build(self) -> DeltaResult<SnapshotRef> {
        let log_root = LogRoot::new(&self.table_root)?;
        let commits = list_commits(&log_root, self.version)?;

        let Some(latest) = commits.last() else {
            return Err(Error::missing_data(format!(
                "No commit files found in {}",
                log_root.location()
            )));
        };
        let version = latest.version;
        if let Some(requested) = self.version {
            if requested != version {
                return Err(Error::generic(format!(
                    "Requested snapshot version {requested} does not exist, latest version is {version}"
                )));
            }
        }

        // one commit file is open at a time during replay
        let mut log = ChainedActionSource::new();
        for commit in &commits {
            let path = commit
                .location
                .to_file_path()
                .map_err(|_| Error::invalid_log_path(&commit.location))?;
            log.push(Box::new(JsonActionSource::new(path)));
        }

        info!(version, num_commits = commits.len(), "Building snapshot");
        let snapshot = Snapshot::try_new_from_replay(self.table_root, version, log.actions()?)?;
        Ok(snapshot.into())
    }
}

/// List the commit files of the log in version order, stopping at `end_version` if given. Commit
/// versions must be contiguous starting at zero.
fn list_commits(
    log_root: &LogRoot,
    end_version: Option<Version>,
) -> DeltaResult<Vec<ParsedLogPath>> {
    let log_dir = log_root.location().to_file_path().map_err(|_| {
        Error::unsupported(format!(
            "Only local file system tables are supported: {}",
            log_root.location()
        ))
    })?;

    let mut commits = Vec::new();
    for entry in fs::read_dir(&log_dir)? {
        let path = entry?.path();
        let location = Url::from_file_path(&path)
            .map_err(|_| Error::generic(format!("Invalid log file path {}", path.display())))?;
        match ParsedLogPath::try_from(location)? {
            Some(commit) if end_version.is_none_or(|end| commit.version <= end) => {
                commits.push(commit)
            }
            Some(commit) => debug!("Skipping commit {} after end version", commit.version),
            None => debug!("Skipping non-commit log file {}", path.display()),
        }
    }
    commits.sort_by_key(|commit| commit.version);

    for (expected, commit) in (0..).zip(&commits) {
        if commit.version != expected {
            return Err(Error::InvalidLogPath(format!(
                "Expected commit version {expected} but found {}",
                commit.location
            )));
        }
    }
    Ok(commits)
}
