//! In-memory representation of snapshots of tables (snapshot is a table at given point in time, it
//! has protocol, metadata and domain metadata as of that version)

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::actions::domain_metadata::apply_domain_metadata;
use crate::actions::{Action, DomainMetadata, Metadata, Protocol, INTERNAL_DOMAIN_PREFIX};
use crate::committer::Committer;
use crate::table_configuration::TableConfiguration;
use crate::table_properties::TableProperties;
use crate::transaction::Transaction;
use crate::{DeltaResult, Error, Version};

mod builder;
pub use builder::SnapshotBuilder;

pub type SnapshotRef = Arc<Snapshot>;

/// In-memory representation of a specific snapshot of a Delta table. While a table exists
/// throughout time, `Snapshot`s represent a view of a table at a specific point in time; they
/// have a specific version, protocol, metadata, and the latest configuration of every domain.
#[derive(PartialEq, Eq)]
pub struct Snapshot {
    table_configuration: TableConfiguration,
    domain_metadatas: HashMap<String, DomainMetadata>,
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        debug!("Dropping snapshot");
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("path", &self.table_root().as_str())
            .field("version", &self.version())
            .field("metadata", &self.table_configuration().metadata())
            .finish()
    }
}

/// Accumulates the table state while replaying actions in commit order.
#[derive(Default)]
struct LogReplayState {
    protocol: Option<Protocol>,
    metadata: Option<Metadata>,
    domain_metadatas: HashMap<String, DomainMetadata>,
}

impl LogReplayState {
    fn apply(&mut self, action: Action) {
        match action {
            Action::Protocol(protocol) => self.protocol = Some(protocol),
            Action::Metadata(metadata) => self.metadata = Some(metadata),
            Action::DomainMetadata(domain_metadata) => {
                apply_domain_metadata(&mut self.domain_metadatas, domain_metadata)
            }
            Action::Add(_)
            | Action::Remove(_)
            | Action::CommitInfo(_)
            | Action::SetTransaction(_) => {}
        }
    }
}

impl Snapshot {
    /// Create a new [`SnapshotBuilder`] to build a [`Snapshot`] for a given table root.
    pub fn builder_for(table_root: Url) -> SnapshotBuilder {
        SnapshotBuilder::new_for(table_root)
    }

    /// Build a snapshot at `version` by replaying `actions`, which must be all the actions of
    /// commits `0..=version` in commit order.
    pub fn try_new_from_actions(
        table_root: Url,
        version: Version,
        actions: impl IntoIterator<Item = Action>,
    ) -> DeltaResult<Self> {
        Self::try_new_from_replay(table_root, version, actions.into_iter().map(Ok))
    }

    pub(crate) fn try_new_from_replay(
        table_root: Url,
        version: Version,
        actions: impl IntoIterator<Item = DeltaResult<Action>>,
    ) -> DeltaResult<Self> {
        let mut state = LogReplayState::default();
        for action in actions {
            state.apply(action?);
        }
        let protocol = state
            .protocol
            .ok_or_else(|| Error::missing_data("No protocol found in the log"))?;
        let metadata = state
            .metadata
            .ok_or_else(|| Error::missing_data("No metadata found in the log"))?;
        let table_configuration =
            TableConfiguration::try_new(metadata, protocol, table_root, version)?;
        debug!(
            version,
            num_domains = state.domain_metadatas.len(),
            "Replayed snapshot"
        );
        Ok(Self {
            table_configuration,
            domain_metadatas: state.domain_metadatas,
        })
    }

    /// Version of this `Snapshot` in the table.
    pub fn version(&self) -> Version {
        self.table_configuration.version()
    }

    /// Table [`Url`] of this snapshot.
    pub fn table_root(&self) -> &Url {
        self.table_configuration.table_root()
    }

    /// Get the [`TableProperties`] for this [`Snapshot`].
    pub fn table_properties(&self) -> &TableProperties {
        self.table_configuration.table_properties()
    }

    /// Get the [`TableConfiguration`] for this [`Snapshot`].
    pub fn table_configuration(&self) -> &TableConfiguration {
        &self.table_configuration
    }

    /// Fetch the domainMetadata for a specific domain in this snapshot. This returns the latest
    /// configuration for the domain, or None if the domain does not exist.
    ///
    /// System-controlled `delta.*` domains cannot be read through this method.
    pub fn get_domain_metadata(&self, domain: &str) -> DeltaResult<Option<String>> {
        if domain.starts_with(INTERNAL_DOMAIN_PREFIX) {
            return Err(Error::generic(
                "User DomainMetadata are not allowed to use system-controlled 'delta.*' domain",
            ));
        }
        Ok(self.domain_metadata_configuration(domain).map(str::to_owned))
    }

    /// The raw configuration of `domain` (system or user) as of this snapshot.
    pub(crate) fn domain_metadata_configuration(&self, domain: &str) -> Option<&str> {
        self.domain_metadatas
            .get(domain)
            .map(DomainMetadata::configuration)
    }

    /// Create a [`Transaction`] for this `SnapshotRef`. With the specified [`Committer`].
    pub fn transaction(self: Arc<Self>, committer: Box<dyn Committer>) -> DeltaResult<Transaction> {
        Transaction::try_new(self, committer)
    }
}
