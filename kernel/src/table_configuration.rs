//! This module defines [`TableConfiguration`], a high level api to check feature support and
//! feature enablement for a table at a given version. This encapsulates [`Protocol`], [`Metadata`]
//! and [`TableProperties`]. These structs in isolation should be considered raw and unvalidated if
//! they are not a part of [`TableConfiguration`]. We unify these fields because they are deeply
//! intertwined when dealing with table features. For example: to check that row ids should be
//! assigned, you must check both the protocol's writer features and the row tracking suspension
//! table property.
use url::Url;

use crate::actions::{Metadata, Protocol};
use crate::table_features::TableFeature;
use crate::table_properties::TableProperties;
use crate::{DeltaResult, Version};

/// Holds all the configuration for a table at a specific version. This includes the supported
/// writer features, table properties, version, and table root. This can be used to check whether
/// a table supports a feature or has it enabled. For example, row tracking support can be checked
/// with [`TableConfiguration::is_row_tracking_supported`] and enablement with
/// [`TableConfiguration::is_row_tracking_enabled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfiguration {
    metadata: Metadata,
    protocol: Protocol,
    table_properties: TableProperties,
    table_root: Url,
    version: Version,
}

impl TableConfiguration {
    /// Constructs a [`TableConfiguration`] for a table located in `table_root` at `version`.
    /// This validates that the [`Protocol`] is well formed. Whether the table can be written is
    /// checked separately by [`TableConfiguration::ensure_write_supported`].
    pub fn try_new(
        metadata: Metadata,
        protocol: Protocol,
        table_root: Url,
        version: Version,
    ) -> DeltaResult<Self> {
        protocol.validate()?;
        let table_properties = metadata.parse_table_properties();
        Ok(Self {
            metadata,
            protocol,
            table_properties,
            table_root,
            version,
        })
    }

    /// The [`Metadata`] for this table at this version.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The [`Protocol`] of this table at this version.
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// The [`TableProperties`] of this table at this version.
    pub fn table_properties(&self) -> &TableProperties {
        &self.table_properties
    }

    /// The [`Version`] which this [`TableConfiguration`] belongs to.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The [`Url`] of the table this [`TableConfiguration`] belongs to
    pub fn table_root(&self) -> &Url {
        &self.table_root
    }

    /// Returns `Ok` if the kernel supports writing to this table.
    pub fn ensure_write_supported(&self) -> DeltaResult<()> {
        self.protocol.ensure_write_supported()
    }

    /// Returns `true` if the protocol lists the given feature.
    pub fn is_feature_supported(&self, feature: &TableFeature) -> bool {
        self.protocol.has_table_feature(feature)
    }

    /// Returns `true` if the table supports writing domain metadata.
    ///
    /// To support this feature the table must:
    /// - Have a min_writer_version of 7.
    /// - Have the [`TableFeature::DomainMetadata`] writer feature.
    pub fn is_domain_metadata_supported(&self) -> bool {
        self.protocol().min_writer_version() == 7
            && self
                .protocol()
                .has_table_feature(&TableFeature::DomainMetadata)
    }

    /// Returns `true` if the table supports writing row tracking metadata.
    ///
    /// To support this feature the table must:
    /// - Have a min_writer_version of 7.
    /// - Have the [`TableFeature::RowTracking`] writer feature.
    pub fn is_row_tracking_supported(&self) -> bool {
        self.protocol().is_row_tracking_supported()
    }

    /// Returns `true` if row tracking is enabled for this table.
    ///
    /// In order to enable row tracking the table must:
    /// - Support row tracking (see [`Self::is_row_tracking_supported`]).
    /// - Have the `delta.enableRowTracking` table property set to `true`.
    pub fn is_row_tracking_enabled(&self) -> bool {
        self.is_row_tracking_supported()
            && self.table_properties().enable_row_tracking.unwrap_or(false)
    }

    /// Returns `true` if row tracking is suspended for this table.
    ///
    /// Row tracking is suspended when the `delta.rowTrackingSuspended` table property is set to `true`.
    /// Note that:
    /// - Row tracking can be _supported_ and _suspended_ at the same time.
    /// - Row tracking cannot be _enabled_ while _suspended_.
    pub fn is_row_tracking_suspended(&self) -> bool {
        self.table_properties()
            .row_tracking_suspended
            .unwrap_or(false)
    }

    /// Returns `true` if row tracking information should be written for this table.
    ///
    /// Row tracking information should be written when:
    /// - Row tracking is supported
    /// - Row tracking is not suspended
    ///
    /// Note: We ignore [`Self::is_row_tracking_enabled`] here. Ids are assigned whenever the
    /// feature is supported so that enabling it later does not leave gaps in the id space.
    pub fn should_write_row_tracking(&self) -> bool {
        self.is_row_tracking_supported() && !self.is_row_tracking_suspended()
    }

    /// Returns `true` if files may not be removed from this table.
    pub fn is_append_only(&self) -> bool {
        let supported = match self.protocol().min_writer_version() {
            7 => self.protocol().has_table_feature(&TableFeature::AppendOnly),
            version => version >= 2,
        };
        supported && self.table_properties().append_only.unwrap_or(false)
    }
}
