//! The `committer` module provides a [`Committer`] trait which allows different implementations to
//! define how a transaction's actions become a new version of the table. For tables stored on the
//! local file system the [`FileSystemCommitter`] writes the commit file directly, using an
//! exclusive create (put-if-absent) so that only one writer can ever claim a version.
//!
//! The [`Committer`] trait exposes a single method, [`commit`], which takes a lazy iterator of
//! [`Action`]s and the [`CommitMetadata`] (which includes the version to commit). The actions are
//! produced on demand while the committer consumes them: row ids are assigned to added files during
//! this traversal, so a committer must consume the iterator in order and stop at the first error.
//!
//! The implementation of [`commit`] must ensure that the actions are committed atomically at the
//! given version, and report [`CommitResponse::Conflict`] if another writer already committed that
//! version. Retrying against a fresh snapshot is left to the caller.
//!
//! [`commit`]: crate::committer::Committer::commit
//! [`Action`]: crate::actions::Action

mod commit_types;
mod filesystem;

pub use commit_types::{CommitMetadata, CommitResponse};
pub use filesystem::FileSystemCommitter;

use crate::action_source::ActionIterator;
use crate::DeltaResult;

/// A Committer is the system by which transactions are committed to a table. Transactions are
/// effectively a collection of actions performed on the table at a specific version.
///
/// Critically, a Committer must implement [`commit`] which takes an iterator of actions to commit
/// to the table at the given version ([`CommitMetadata::version`]).
///
/// [`commit`]: Committer::commit
//
// Note: While we could omit the Send bound, we keep it here for simplicity - so usage can be
// Box<dyn Committer> (instead of Box<dyn Committer + Send>).
pub trait Committer: Send {
    fn commit(
        &self,
        actions: ActionIterator<'_>,
        commit_metadata: CommitMetadata,
    ) -> DeltaResult<CommitResponse>;
}
