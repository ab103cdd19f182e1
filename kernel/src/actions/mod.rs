//! Provides parsing and manipulation of the various actions defined in the [Delta
//! specification](https://github.com/delta-io/delta/blob/master/PROTOCOL.md)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::table_features::{TableFeature, SUPPORTED_WRITER_FEATURES};
use crate::table_properties::TableProperties;
use crate::utils::require;
use crate::{DeltaResult, Error};

pub mod domain_metadata;

/// Domains with this prefix are reserved for system-controlled metadata (e.g. row tracking).
pub(crate) const INTERNAL_DOMAIN_PREFIX: &str = "delta.";

/// A single line of a commit file. Each action serializes as a single-key JSON object named after
/// the action, e.g. `{"add": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Add(Add),
    Remove(Remove),
    #[serde(rename = "metaData")]
    Metadata(Metadata),
    Protocol(Protocol),
    DomainMetadata(DomainMetadata),
    CommitInfo(CommitInfo),
    #[serde(rename = "txn")]
    SetTransaction(SetTransaction),
}

impl Action {
    /// The add action wrapped by this action, if any.
    pub fn as_add(&self) -> Option<&Add> {
        match self {
            Action::Add(add) => Some(add),
            _ => None,
        }
    }

    /// The name of this action in a commit file, e.g. `add` or `metaData`.
    pub fn action_type(&self) -> &'static str {
        match self {
            Action::Add(_) => "add",
            Action::Remove(_) => "remove",
            Action::Metadata(_) => "metaData",
            Action::Protocol(_) => "protocol",
            Action::DomainMetadata(_) => "domainMetadata",
            Action::CommitInfo(_) => "commitInfo",
            Action::SetTransaction(_) => "txn",
        }
    }

    /// Serialize this action as one line of a commit file (without the trailing newline).
    pub fn to_json_line(&self) -> DeltaResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<Add> for Action {
    fn from(add: Add) -> Self {
        Action::Add(add)
    }
}

impl From<Remove> for Action {
    fn from(remove: Remove) -> Self {
        Action::Remove(remove)
    }
}

impl From<DomainMetadata> for Action {
    fn from(domain_metadata: DomainMetadata) -> Self {
        Action::DomainMetadata(domain_metadata)
    }
}

/// The subset of per-file statistics the kernel reads. Other statistics in the JSON payload are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileStatistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) num_records: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Add {
    /// A relative path to a data file from the root of the table or an absolute path to a file
    /// that should be added to the table. The path is a URI as specified by
    /// [RFC 2396 URI Generic Syntax], which needs to be decoded to get the data file path.
    ///
    /// [RFC 2396 URI Generic Syntax]: https://www.ietf.org/rfc/rfc2396.txt
    pub path: String,

    /// A map from partition column to value for this logical file.
    #[serde(default)]
    pub partition_values: HashMap<String, String>,

    /// The size of this data file in bytes
    pub size: i64,

    /// The time this logical file was created, as milliseconds since the epoch.
    pub modification_time: i64,

    /// When `false` the logical file must already be present in the table or the records
    /// in the added file must be contained in one or more remove actions in the same version.
    pub data_change: bool,

    /// Contains [statistics] (e.g., count, min/max values for columns) about the data in this
    /// logical file encoded as a JSON string.
    ///
    /// [statistics]: https://github.com/delta-io/delta/blob/master/PROTOCOL.md#Per-file-Statistics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,

    /// Map containing metadata about this logical file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,

    /// Default generated Row ID of the first row in the file. The default generated Row IDs
    /// of the other rows in the file can be reconstructed by adding the physical index of the
    /// row within the file to the base Row ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_row_id: Option<i64>,

    /// First commit version in which an add action with the same path was committed to the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_row_commit_version: Option<i64>,

    /// The name of the clustering implementation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clustering_provider: Option<String>,
}

impl Add {
    pub fn new(
        path: impl Into<String>,
        size: i64,
        modification_time: i64,
        data_change: bool,
    ) -> Self {
        Self {
            path: path.into(),
            partition_values: HashMap::new(),
            size,
            modification_time,
            data_change,
            stats: None,
            tags: None,
            base_row_id: None,
            default_row_commit_version: None,
            clustering_provider: None,
        }
    }

    /// Returns a copy of this add with the `numRecords` statistic set, replacing any existing
    /// statistics payload.
    pub fn with_num_records(self, num_records: i64) -> DeltaResult<Self> {
        let stats = FileStatistics {
            num_records: Some(num_records),
        };
        Ok(Self {
            stats: Some(serde_json::to_string(&stats)?),
            ..self
        })
    }

    pub fn with_partition_values(self, partition_values: HashMap<String, String>) -> Self {
        Self {
            partition_values,
            ..self
        }
    }

    pub fn with_base_row_id(self, base_row_id: i64) -> Self {
        Self {
            base_row_id: Some(base_row_id),
            ..self
        }
    }

    pub fn with_default_row_commit_version(self, default_row_commit_version: i64) -> Self {
        Self {
            default_row_commit_version: Some(default_row_commit_version),
            ..self
        }
    }

    /// The `numRecords` statistic of this file. Returns `Ok(None)` when the file carries no
    /// statistics or its statistics omit `numRecords`, and an error if the statistics are not
    /// valid JSON.
    pub fn num_records(&self) -> DeltaResult<Option<i64>> {
        let Some(stats) = self.stats.as_deref() else {
            return Ok(None);
        };
        let stats: FileStatistics = serde_json::from_str(stats)?;
        Ok(stats.num_records)
    }

    /// The `numRecords` statistic, required for sizing this file's row id range. Must not be
    /// negative.
    pub(crate) fn required_num_records(&self) -> DeltaResult<i64> {
        let num_records = self
            .num_records()?
            .ok_or_else(|| Error::row_id_assignment_without_stats(&self.path))?;
        require!(
            num_records >= 0,
            Error::generic(format!(
                "numRecords must not be negative (path: {}, numRecords: {num_records})",
                self.path
            ))
        );
        Ok(num_records)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remove {
    /// A relative path to a data file from the root of the table or an absolute path to a file
    /// that should be removed from the table.
    pub path: String,

    /// The time this logical file was removed, as milliseconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<i64>,

    /// When `false` the records in the removed file must be contained in one or more add file
    /// actions in the same version.
    pub data_change: bool,

    /// When true the fields `partition_values`, `size`, and `tags` are present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_file_metadata: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_values: Option<HashMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,

    /// Default generated Row ID of the first row in the file, copied from the removed add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_row_id: Option<i64>,

    /// First commit version in which an add action with the same path was committed to the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_row_commit_version: Option<i64>,
}

impl Remove {
    /// Builds the remove action that logically deletes `add`. Row tracking fields are carried
    /// over so the removed rows keep their identity in the log.
    pub fn from_add(add: &Add, deletion_timestamp: i64, data_change: bool) -> Self {
        Self {
            path: add.path.clone(),
            deletion_timestamp: Some(deletion_timestamp),
            data_change,
            extended_file_metadata: Some(true),
            partition_values: Some(add.partition_values.clone()),
            size: Some(add.size),
            stats: add.stats.clone(),
            tags: add.tags.clone(),
            base_row_id: add.base_row_id,
            default_row_commit_version: add.default_row_commit_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    /// Name of the encoding for files in this table
    pub provider: String,
    /// A map containing configuration options for the format
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl Default for Format {
    fn default() -> Self {
        Self {
            provider: String::from("parquet"),
            options: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Unique identifier for this table
    pub id: String,
    /// User-provided identifier for this table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// User-provided description for this table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Specification of the encoding for the files stored in the table
    #[serde(default)]
    pub format: Format,
    /// Schema of the table, kept in its serialized form
    pub schema_string: String,
    /// Column names by which the data should be partitioned
    #[serde(default)]
    pub partition_columns: Vec<String>,
    /// The time when this metadata action is created, in milliseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    /// Configuration options for the metadata action. These are parsed into [`TableProperties`].
    #[serde(default)]
    pub configuration: HashMap<String, String>,
}

impl Metadata {
    pub fn new(
        schema_string: impl Into<String>,
        partition_columns: Vec<String>,
        configuration: HashMap<String, String>,
        created_time: Option<i64>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: None,
            description: None,
            format: Format::default(),
            schema_string: schema_string.into(),
            partition_columns,
            created_time,
            configuration,
        }
    }

    /// Parse the metadata configuration HashMap<String, String> into a TableProperties struct.
    /// Note that parsing is infallible -- any items that fail to parse are simply propagated
    /// through to the `TableProperties.unknown_properties` field.
    pub fn parse_table_properties(&self) -> TableProperties {
        TableProperties::from(self.configuration.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    /// The minimum version of the Delta read protocol that a client must implement
    /// in order to correctly read this table
    min_reader_version: i32,
    /// The minimum version of the Delta write protocol that a client must implement
    /// in order to correctly write this table
    min_writer_version: i32,
    /// A collection of features that a client must implement in order to correctly
    /// read this table (exist only when minReaderVersion is set to 3)
    #[serde(skip_serializing_if = "Option::is_none")]
    reader_features: Option<Vec<TableFeature>>,
    /// A collection of features that a client must implement in order to correctly
    /// write this table (exist only when minWriterVersion is set to 7)
    #[serde(skip_serializing_if = "Option::is_none")]
    writer_features: Option<Vec<TableFeature>>,
}

impl Protocol {
    /// Try to create a new Protocol instance from reader/writer versions and table features. This
    /// can fail if the protocol is invalid.
    pub fn try_new(
        min_reader_version: i32,
        min_writer_version: i32,
        reader_features: Option<impl IntoIterator<Item = impl Into<TableFeature>>>,
        writer_features: Option<impl IntoIterator<Item = impl Into<TableFeature>>>,
    ) -> DeltaResult<Self> {
        let reader_features: Option<Vec<TableFeature>> =
            reader_features.map(|f| f.into_iter().map(Into::into).collect());
        let writer_features: Option<Vec<TableFeature>> =
            writer_features.map(|f| f.into_iter().map(Into::into).collect());
        let protocol = Protocol {
            min_reader_version,
            min_writer_version,
            reader_features,
            writer_features,
        };
        protocol.validate()?;
        Ok(protocol)
    }

    /// Checks the feature lists are present exactly when the versions call for them.
    pub(crate) fn validate(&self) -> DeltaResult<()> {
        require!(
            (self.min_reader_version == 3) == self.reader_features.is_some(),
            Error::invalid_protocol(
                "Reader features must be present iff minReaderVersion is 3"
            )
        );
        require!(
            (self.min_writer_version == 7) == self.writer_features.is_some(),
            Error::invalid_protocol(
                "Writer features must be present iff minWriterVersion is 7"
            )
        );
        Ok(())
    }

    pub fn min_reader_version(&self) -> i32 {
        self.min_reader_version
    }

    pub fn min_writer_version(&self) -> i32 {
        self.min_writer_version
    }

    pub fn reader_features(&self) -> Option<&[TableFeature]> {
        self.reader_features.as_deref()
    }

    pub fn writer_features(&self) -> Option<&[TableFeature]> {
        self.writer_features.as_deref()
    }

    /// True if this protocol lists `feature` as a reader or writer feature.
    pub fn has_table_feature(&self, feature: &TableFeature) -> bool {
        self.reader_features()
            .is_some_and(|features| features.contains(feature))
            || self
                .writer_features()
                .is_some_and(|features| features.contains(feature))
    }

    /// Row ids may be assigned only on tables with writer version 7 that list the
    /// [`TableFeature::RowTracking`] writer feature.
    pub fn is_row_tracking_supported(&self) -> bool {
        self.min_writer_version == 7
            && self
                .writer_features()
                .is_some_and(|features| features.contains(&TableFeature::RowTracking))
    }

    /// Check if writing to a table with this protocol is supported.
    pub fn ensure_write_supported(&self) -> DeltaResult<()> {
        match self.min_writer_version {
            1 | 2 => Ok(()),
            7 => {
                let writer_features = self.writer_features().unwrap_or_default();
                if let Some(unsupported) = writer_features
                    .iter()
                    .find(|f| !SUPPORTED_WRITER_FEATURES.contains(f))
                {
                    debug!("Refusing to write table with writer feature {unsupported}");
                    return Err(Error::unsupported(format!(
                        "Unknown or unsupported writer feature: {unsupported}"
                    )));
                }
                // row tracking persists its high water mark as domain metadata
                require!(
                    !writer_features.contains(&TableFeature::RowTracking)
                        || writer_features.contains(&TableFeature::DomainMetadata),
                    Error::invalid_protocol(
                        "The rowTracking writer feature requires the domainMetadata writer feature"
                    )
                );
                Ok(())
            }
            version => Err(Error::unsupported(format!(
                "Unsupported minimum writer version {version}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainMetadata {
    domain: String,
    configuration: String,
    removed: bool,
}

impl DomainMetadata {
    /// Create a new DomainMetadata action.
    pub fn new(domain: String, configuration: String) -> Self {
        Self {
            domain,
            configuration,
            removed: false,
        }
    }

    /// Create a tombstone for `domain`. The previous configuration is preserved in the
    /// tombstone.
    pub fn remove(domain: String, configuration: String) -> Self {
        Self {
            domain,
            configuration,
            removed: true,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// System-controlled domains are those whose name starts with `delta.`.
    pub fn is_internal(&self) -> bool {
        self.domain.starts_with(INTERNAL_DOMAIN_PREFIX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    /// The time this logical file was created, as milliseconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// The time this logical file was created, as milliseconds since the epoch. Only written when
    /// in-commit timestamps are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_commit_timestamp: Option<i64>,
    /// An arbitrary string that identifies the operation associated with this commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Map of arbitrary string key-value pairs that provide additional information about the
    /// operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_parameters: Option<HashMap<String, String>>,
    /// The version of the kernel that wrote this commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
    /// A place for the engine to record its own information about the commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_info: Option<String>,
    /// A unique transaction identifier for this commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_id: Option<String>,
}

impl CommitInfo {
    pub(crate) fn new(
        timestamp: i64,
        operation: Option<String>,
        engine_info: Option<String>,
    ) -> Self {
        Self {
            timestamp: Some(timestamp),
            in_commit_timestamp: None,
            operation: Some(operation.unwrap_or_else(|| "UNKNOWN".to_string())),
            operation_parameters: Some(HashMap::new()),
            kernel_version: Some(format!("v{}", env!("CARGO_PKG_VERSION"))),
            engine_info,
            txn_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTransaction {
    /// A unique identifier for the application performing the transaction.
    pub app_id: String,
    /// An application-specific numeric identifier for this transaction.
    pub version: i64,
    /// The time when this transaction action was created in milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

impl SetTransaction {
    pub fn new(app_id: String, version: i64, last_updated: Option<i64>) -> Self {
        Self {
            app_id,
            version,
            last_updated,
        }
    }
}
