//! Commit metadata types for the committer module.

use url::Url;

use crate::path::LogRoot;
use crate::{DeltaResult, Version};

/// `CommitMetadata` bundles the metadata about a commit operation: where the table's log lives,
/// the version being committed and the commit timestamp.
///
/// Note that this struct cannot be constructed outside the kernel. It is handed to the
/// [`Committer`] (in the [`commit`] method) when a transaction is being committed.
///
/// [`Committer`]: super::Committer
/// [`commit`]: super::Committer::commit
#[derive(Debug)]
pub struct CommitMetadata {
    pub(crate) log_root: LogRoot,
    pub(crate) version: Version,
    pub(crate) timestamp: i64,
}

impl CommitMetadata {
    pub(crate) fn new(log_root: LogRoot, version: Version, timestamp: i64) -> Self {
        Self {
            log_root,
            version,
            timestamp,
        }
    }

    /// The commit path is the absolute path (e.g. file:///table/_delta_log/{version}.json) to
    /// the published delta file for this commit.
    pub fn published_commit_path(&self) -> DeltaResult<Url> {
        self.log_root
            .new_commit_path(self.version)
            .map(|p| p.location)
    }

    /// The version to which the transaction is being committed.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The timestamp recorded in the commit's `commitInfo`, in milliseconds since the epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// `CommitResponse` is the result of handing a transaction's actions to a [`Committer`]. The
/// kernel transforms the associated [`Transaction`] into the appropriate state.
///
/// If the commit was successful, the committer returns `CommitResponse::Committed` with the commit
/// version set. If the commit conflicted (another writer committed the same version), the
/// Committer returns `CommitResponse::Conflict` with the version that was attempted.
///
/// [`Committer`]: super::Committer
/// [`Transaction`]: crate::transaction::Transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResponse {
    Committed { version: Version },
    Conflict { version: Version },
}
