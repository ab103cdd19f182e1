//! Row tracking for Delta tables.
//!
//! Every row added to a table with the `rowTracking` writer feature receives a stable row id.
//! Ids are handed out per file: each new [`Add`] gets a `baseRowId` and the rows of the file take
//! the contiguous range `baseRowId..baseRowId + numRecords`. The table remembers the highest id
//! ever handed out (its *row id high water mark*) in the `delta.rowTracking` domain metadata so
//! that later commits continue the sequence without collision.
//!
//! The typical flow:
//! 1. Build a [`Snapshot`] of the table with [`Snapshot::builder_for`].
//! 2. Start a [`Transaction`] from the snapshot with a [`Committer`] (e.g. the
//!    [`FileSystemCommitter`] for tables on the local file system).
//! 3. Stage files with [`Transaction::add_files`], where each add carries its `numRecords`
//!    statistic, and call [`Transaction::commit`].
//!
//! During the commit the staged actions are wrapped by [`row_tracking::RowTrackingActions`],
//! which assigns row ids lazily while the committer streams the actions out, and the new high
//! water mark is computed by [`row_tracking::update_row_id_high_water_mark`].
//!
//! [`Add`]: actions::Add
//! [`Transaction`]: transaction::Transaction
//! [`Transaction::add_files`]: transaction::Transaction::add_files
//! [`Transaction::commit`]: transaction::Transaction::commit
//! [`Committer`]: committer::Committer
//! [`FileSystemCommitter`]: committer::FileSystemCommitter

#![warn(
    unused_extern_crates,
    rust_2018_idioms,
    rust_2021_compatibility,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod action_source;
pub mod actions;
pub mod committer;
pub mod error;
pub mod row_tracking;
pub mod snapshot;
pub mod table_configuration;
pub mod table_features;
pub mod table_properties;
pub mod transaction;

pub(crate) mod path;
pub(crate) mod utils;

pub use action_source::{ActionIterator, ActionSource};
pub use error::{DeltaResult, Error};
pub use snapshot::{Snapshot, SnapshotRef};

/// Delta table version is 8 byte unsigned int
pub type Version = u64;
