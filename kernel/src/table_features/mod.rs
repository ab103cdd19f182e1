use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumCount, EnumString};

/// Table features represent protocol capabilities required to correctly write a given table.
/// Writers must implement all writer features listed in a table's protocol, and refuse to write
/// when they encounter one they do not know.
///
/// Each variant corresponds to one such feature. A feature is either:
/// - **ReaderWriter** (must be supported by both readers and writers), or
/// - **Writer only** (applies only to writers).
///
/// See [`TableFeature::feature_type`] for the category of each.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Eq,
    PartialEq,
    EnumString,
    StrumDisplay,
    AsRefStr,
    EnumCount,
    Hash,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum TableFeature {
    //////////////////////////
    // Writer-only features //
    //////////////////////////
    /// Append Only Tables
    AppendOnly,
    /// Table invariants
    Invariants,
    /// CDF on a table
    ChangeDataFeed,
    /// Monotonically increasing timestamps in the CommitInfo
    InCommitTimestamp,
    /// Row tracking on tables
    RowTracking,
    /// domain specific metadata
    DomainMetadata,
    /// The Clustered Table feature facilitates the physical clustering of rows
    /// that share similar values on a predefined set of clustering columns.
    #[strum(serialize = "clustering")]
    #[serde(rename = "clustering")]
    ClusteredTable,

    ///////////////////////////
    // ReaderWriter features //
    ///////////////////////////
    /// Mapping of one column to another
    ColumnMapping,
    /// Deletion vectors for merge, update, delete
    DeletionVectors,
    /// version 2 of checkpointing
    V2Checkpoint,

    #[serde(untagged)]
    #[strum(default)]
    Unknown(String),
}

/// Classifies table features by their type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    /// Feature only affects write operations
    Writer,
    /// Feature affects both read and write operations (must appear in both feature lists)
    ReaderWriter,
    /// Unknown feature type (for forward compatibility)
    Unknown,
}

impl TableFeature {
    pub fn feature_type(&self) -> FeatureType {
        match self {
            TableFeature::ColumnMapping
            | TableFeature::DeletionVectors
            | TableFeature::V2Checkpoint => FeatureType::ReaderWriter,
            TableFeature::AppendOnly
            | TableFeature::DomainMetadata
            | TableFeature::Invariants
            | TableFeature::RowTracking
            | TableFeature::ChangeDataFeed
            | TableFeature::InCommitTimestamp
            | TableFeature::ClusteredTable => FeatureType::Writer,
            TableFeature::Unknown(_) => FeatureType::Unknown,
        }
    }

    pub fn unknown(s: impl ToString) -> Self {
        TableFeature::Unknown(s.to_string())
    }
}

/// The writer features have the following limitations:
/// - We only support DeletionVectors in that we never write them (no DML).
/// - We support ChangeDataFeed only for commits that do not both add and remove data.
/// - We never write in-commit timestamps, so tables requiring them are not writable.
pub(crate) static SUPPORTED_WRITER_FEATURES: LazyLock<Vec<TableFeature>> = LazyLock::new(|| {
    vec![
        TableFeature::AppendOnly,
        TableFeature::ChangeDataFeed,
        TableFeature::ClusteredTable,
        TableFeature::ColumnMapping,
        TableFeature::DeletionVectors,
        TableFeature::DomainMetadata,
        TableFeature::RowTracking,
        TableFeature::V2Checkpoint,
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_features() {
        let mixed_writer = &[
            TableFeature::RowTracking,
            TableFeature::unknown("cool_feature"),
            TableFeature::AppendOnly,
        ];

        let writer_string = serde_json::to_string(mixed_writer).unwrap();
        assert_eq!(
            &writer_string,
            "[\"rowTracking\",\"cool_feature\",\"appendOnly\"]"
        );

        let typed_writer: Vec<TableFeature> = serde_json::from_str(&writer_string).unwrap();
        assert_eq!(&typed_writer, mixed_writer);
        assert_eq!(typed_writer[1].feature_type(), FeatureType::Unknown);
    }

    #[test]
    fn test_roundtrip_features() {
        let cases = [
            (TableFeature::AppendOnly, "appendOnly"),
            (TableFeature::Invariants, "invariants"),
            (TableFeature::ChangeDataFeed, "changeDataFeed"),
            (TableFeature::InCommitTimestamp, "inCommitTimestamp"),
            (TableFeature::RowTracking, "rowTracking"),
            (TableFeature::DomainMetadata, "domainMetadata"),
            (TableFeature::ClusteredTable, "clustering"),
            (TableFeature::ColumnMapping, "columnMapping"),
            (TableFeature::DeletionVectors, "deletionVectors"),
            (TableFeature::V2Checkpoint, "v2Checkpoint"),
            (TableFeature::unknown("something"), "something"),
        ];

        assert_eq!(TableFeature::COUNT, cases.len());

        for (feature, expected) in cases {
            assert_eq!(feature.to_string(), expected);
            let serialized = serde_json::to_string(&feature).unwrap();
            assert_eq!(serialized, format!("\"{expected}\""));

            let deserialized: TableFeature = serde_json::from_str(&serialized).unwrap();
            assert_eq!(deserialized, feature);

            let from_str: TableFeature = expected.parse().unwrap();
            assert_eq!(from_str, feature);
        }
    }
}
