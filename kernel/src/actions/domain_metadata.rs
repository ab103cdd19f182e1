//! Typed access to domain metadata.
//!
//! Table features that keep state in the log do so through their own named domain. Each such
//! feature owns exactly one [`MetadataDomain`] implementation, which knows its domain name and how
//! to encode/decode its JSON configuration. The set of implementations is closed: only the kernel
//! defines system domains.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::actions::DomainMetadata;
use crate::snapshot::Snapshot;
use crate::DeltaResult;

pub(crate) mod private {
    pub trait Sealed {}
}

/// A system-controlled metadata domain with a typed, JSON-encoded configuration.
pub trait MetadataDomain: Serialize + DeserializeOwned + private::Sealed {
    /// The reserved name of this domain.
    const DOMAIN_NAME: &'static str;

    /// Encode this value as a [`DomainMetadata`] action for this domain.
    fn to_domain_metadata(&self) -> DeltaResult<DomainMetadata> {
        Ok(DomainMetadata::new(
            Self::DOMAIN_NAME.to_string(),
            serde_json::to_string(self)?,
        ))
    }

    /// Decode a raw domain configuration. Malformed payloads are an error; there is no fallback.
    fn from_configuration(configuration: &str) -> DeltaResult<Self> {
        Ok(serde_json::from_str(configuration)?)
    }

    /// Read this domain from `snapshot`. Returns `Ok(None)` if the domain was never written or has
    /// been removed.
    fn from_snapshot(snapshot: &Snapshot) -> DeltaResult<Option<Self>> {
        snapshot
            .domain_metadata_configuration(Self::DOMAIN_NAME)
            .map(Self::from_configuration)
            .transpose()
    }
}

/// The clustering columns of a clustered table, kept in the `delta.clustering` domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringDomainMetadata {
    /// Physical column paths, one `Vec` of path segments per clustering column.
    clustering_columns: Vec<Vec<String>>,
}

impl ClusteringDomainMetadata {
    pub fn new(clustering_columns: Vec<Vec<String>>) -> Self {
        Self { clustering_columns }
    }

    pub fn clustering_columns(&self) -> &[Vec<String>] {
        &self.clustering_columns
    }
}

impl private::Sealed for ClusteringDomainMetadata {}

impl MetadataDomain for ClusteringDomainMetadata {
    const DOMAIN_NAME: &'static str = "delta.clustering";
}

/// Apply one domain metadata action to the replayed state of all domains: later actions replace
/// earlier ones and tombstones remove the domain.
pub(crate) fn apply_domain_metadata(
    domains: &mut HashMap<String, DomainMetadata>,
    domain_metadata: DomainMetadata,
) {
    if domain_metadata.is_removed() {
        domains.remove(domain_metadata.domain());
    } else {
        domains.insert(domain_metadata.domain().to_string(), domain_metadata);
    }
}
