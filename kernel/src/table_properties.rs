//! Delta Table properties. Note this module implements per-table configuration which governs how
//! table-level capabilities/properties are configured (turned on/off/etc.). This is orthogonal to
//! protocol-level 'table features' which enable or disable reader/writer features (which then
//! usually must be enabled/configured by table properties).
//!
//! For example (from delta's protocol.md): A feature being supported does not imply that it is
//! active. For example, a table may have the `rowTracking` writer feature supported in its protocol
//! but not have `delta.enableRowTracking` set to `true` in its table properties.

use std::collections::HashMap;

use tracing::warn;

/// Table property key for enabling row tracking.
pub(crate) const ENABLE_ROW_TRACKING: &str = "delta.enableRowTracking";
/// Table property key for suspending row id assignment.
pub(crate) const ROW_TRACKING_SUSPENDED: &str = "delta.rowTrackingSuspended";
pub(crate) const MATERIALIZED_ROW_ID_COLUMN_NAME: &str =
    "delta.rowTracking.materializedRowIdColumnName";
pub(crate) const MATERIALIZED_ROW_COMMIT_VERSION_COLUMN_NAME: &str =
    "delta.rowTracking.materializedRowCommitVersionColumnName";
pub(crate) const APPEND_ONLY: &str = "delta.appendOnly";
pub(crate) const ENABLE_CHANGE_DATA_FEED: &str = "delta.enableChangeDataFeed";

/// Delta table properties. These are parsed from the 'configuration' map in the most recent
/// 'Metadata' action of a table.
///
/// Reference: <https://github.com/delta-io/delta/blob/master/PROTOCOL.md#table-properties>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableProperties {
    /// true for this Delta table to be append-only. If append-only, existing records cannot be
    /// deleted, and existing values cannot be updated.
    pub append_only: Option<bool>,

    /// true to enable change data feed. Writers must then not add and remove data in the same
    /// commit, since that would require `cdc` files.
    pub enable_change_data_feed: Option<bool>,

    /// Whether this table has row tracking enabled, i.e. every row is guaranteed to have a
    /// stable row id and row commit version.
    pub enable_row_tracking: Option<bool>,

    /// When true, writers stop assigning row ids and commit versions to new files.
    pub row_tracking_suspended: Option<bool>,

    /// Name of the hidden column holding materialized row ids.
    pub materialized_row_id_column_name: Option<String>,

    /// Name of the hidden column holding materialized row commit versions.
    pub materialized_row_commit_version_column_name: Option<String>,

    /// any unrecognized properties are passed through and ignored by the parser
    pub unknown_properties: HashMap<String, String>,
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl<K, V, I> From<I> for TableProperties
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str> + Into<String>,
    V: AsRef<str> + Into<String>,
{
    fn from(unparsed: I) -> Self {
        let mut props = TableProperties::default();
        for (k, v) in unparsed {
            let parsed = match k.as_ref() {
                APPEND_ONLY => parse_bool(v.as_ref()).map(|b| props.append_only = Some(b)),
                ENABLE_CHANGE_DATA_FEED => {
                    parse_bool(v.as_ref()).map(|b| props.enable_change_data_feed = Some(b))
                }
                ENABLE_ROW_TRACKING => {
                    parse_bool(v.as_ref()).map(|b| props.enable_row_tracking = Some(b))
                }
                ROW_TRACKING_SUSPENDED => {
                    parse_bool(v.as_ref()).map(|b| props.row_tracking_suspended = Some(b))
                }
                MATERIALIZED_ROW_ID_COLUMN_NAME => {
                    props.materialized_row_id_column_name = Some(v.as_ref().to_string());
                    Some(())
                }
                MATERIALIZED_ROW_COMMIT_VERSION_COLUMN_NAME => {
                    props.materialized_row_commit_version_column_name =
                        Some(v.as_ref().to_string());
                    Some(())
                }
                _ => None,
            };
            if parsed.is_none() {
                if is_known_key(k.as_ref()) {
                    warn!(
                        "Failed to parse table property {}={}, keeping it as unknown",
                        k.as_ref(),
                        v.as_ref()
                    );
                }
                props.unknown_properties.insert(k.into(), v.into());
            }
        }
        props
    }
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        APPEND_ONLY | ENABLE_CHANGE_DATA_FEED | ENABLE_ROW_TRACKING | ROW_TRACKING_SUSPENDED
    )
}
