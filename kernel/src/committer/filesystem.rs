//! File system committer for tables on the local file system.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter};
use std::path::Path;

use tracing::{debug, warn};

use super::commit_types::{CommitMetadata, CommitResponse};
use super::Committer;
use crate::action_source::ActionIterator;
use crate::{DeltaResult, Error};

/// The `FileSystemCommitter` is an implementation of the `Committer` trait which writes the commit
/// file straight into the table's `_delta_log` directory. The file is created exclusively, so an
/// existing commit file for the version is reported as a conflict rather than overwritten.
///
/// If producing or writing any action fails, the partially written commit file is removed before
/// the error is returned.
#[derive(Debug, Default)]
pub struct FileSystemCommitter;

impl FileSystemCommitter {
    pub fn new() -> Self {
        Self {}
    }
}

impl Committer for FileSystemCommitter {
    fn commit(
        &self,
        actions: ActionIterator<'_>,
        commit_metadata: CommitMetadata,
    ) -> DeltaResult<CommitResponse> {
        let published_commit_path = commit_metadata.published_commit_path()?;
        let path = published_commit_path.to_file_path().map_err(|_| {
            Error::unsupported(format!(
                "FileSystemCommitter can only write to local paths: {published_commit_path}"
            ))
        })?;
        if let Some(log_dir) = path.parent() {
            fs::create_dir_all(log_dir)?;
        }

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                debug!(
                    version = commit_metadata.version(),
                    "Commit file already exists"
                );
                return Ok(CommitResponse::Conflict {
                    version: commit_metadata.version(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        if let Err(err) = write_actions(BufWriter::new(file), actions) {
            remove_partial_commit(&path);
            return Err(err);
        }
        Ok(CommitResponse::Committed {
            version: commit_metadata.version(),
        })
    }
}

fn write_actions(mut writer: impl io::Write, actions: ActionIterator<'_>) -> DeltaResult<()> {
    for action in actions {
        writeln!(writer, "{}", action?.to_json_line()?)?;
    }
    writer.flush()?;
    Ok(())
}

fn remove_partial_commit(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(
            "Failed to remove partial commit file {}: {err}",
            path.display()
        );
    }
}
