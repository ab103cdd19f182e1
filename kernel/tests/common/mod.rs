//! Shared helpers for the integration tests: creating tables on disk and inspecting commits.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;

use itertools::Itertools;
use serde_json::{json, Deserializer, Value};
use tempfile::TempDir;
use url::Url;

use rowid_kernel::actions::Add;
use rowid_kernel::committer::FileSystemCommitter;
use rowid_kernel::transaction::CommitResult;
use rowid_kernel::{DeltaResult, Error, Snapshot, Version};

/// Write version 0 of a table named `table_name` under `tmp_dir` with the given writer features
/// (protocol 1/7) and table properties, and return the table's url.
pub fn create_table(
    tmp_dir: &TempDir,
    table_name: &str,
    writer_features: &[&str],
    configuration: HashMap<&str, &str>,
) -> DeltaResult<Url> {
    let table_dir = tmp_dir.path().join(table_name);
    let log_dir = table_dir.join("_delta_log");
    fs::create_dir_all(&log_dir)?;

    let protocol = json!({
        "protocol": {
            "minReaderVersion": 1,
            "minWriterVersion": 7,
            "writerFeatures": writer_features,
        }
    });
    let metadata = json!({
        "metaData": {
            "id": "5fba94ed-9794-4965-ba6e-6ee3c0d22af9",
            "format": { "provider": "parquet", "options": {} },
            "schemaString": r#"{"type":"struct","fields":[{"name":"number","type":"integer","nullable":true,"metadata":{}}]}"#,
            "partitionColumns": [],
            "configuration": configuration,
            "createdTime": 1677811175819u64,
        }
    });
    let mut commit = fs::File::create(log_dir.join(format!("{:020}.json", 0)))?;
    writeln!(commit, "{protocol}")?;
    writeln!(commit, "{metadata}")?;

    Url::from_directory_path(&table_dir)
        .map_err(|_| Error::generic("Failed to convert directory path to URL"))
}

/// Create a table with the `rowTracking` and `domainMetadata` writer features.
pub fn create_row_tracking_table(tmp_dir: &TempDir, table_name: &str) -> DeltaResult<Url> {
    create_table(
        tmp_dir,
        table_name,
        &["domainMetadata", "rowTracking"],
        HashMap::from([("delta.enableRowTracking", "true")]),
    )
}

/// An add action for a file with `num_records` rows.
pub fn add_file(path: &str, num_records: i64) -> Add {
    Add::new(path, 1024, 1677811178336, true)
        .with_num_records(num_records)
        .unwrap()
}

/// Commit one transaction against the latest snapshot that adds one file per entry of
/// `num_records`.
pub fn write_files(table_url: &Url, num_records: &[i64]) -> DeltaResult<CommitResult> {
    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut txn = snapshot
        .transaction(Box::new(FileSystemCommitter::new()))?
        .with_engine_info("row tracking test");
    let adds = num_records
        .iter()
        .enumerate()
        .map(|(i, n)| add_file(&format!("part-{i:05}-{}.parquet", uuid::Uuid::new_v4()), *n))
        .collect_vec();
    txn.add_files(adds);
    txn.commit()
}

/// All actions of commit `version`, as raw JSON.
pub fn read_commit(table_url: &Url, version: Version) -> DeltaResult<Vec<Value>> {
    let commit_url = table_url.join(&format!("_delta_log/{version:020}.json"))?;
    let path = commit_url
        .to_file_path()
        .map_err(|_| Error::generic("Commit url is not a file path"))?;
    let bytes = fs::read(path)?;
    Ok(Deserializer::from_slice(&bytes)
        .into_iter::<Value>()
        .try_collect()?)
}

/// The `add` objects of a commit, in commit order.
pub fn adds_in_commit(actions: &[Value]) -> Vec<&Value> {
    actions.iter().filter_map(|action| action.get("add")).collect()
}

/// The row id high water marks written by a commit.
pub fn high_water_marks_in_commit(actions: &[Value]) -> DeltaResult<Vec<i64>> {
    actions
        .iter()
        .filter_map(|action| action.get("domainMetadata"))
        .filter(|dm| dm["domain"] == "delta.rowTracking")
        .map(|dm| {
            let configuration = dm["configuration"]
                .as_str()
                .ok_or_else(|| Error::generic("Configuration should be a string"))?;
            let configuration: Value = serde_json::from_str(configuration)?;
            configuration["rowIdHighWaterMark"]
                .as_i64()
                .ok_or_else(|| Error::generic("rowIdHighWaterMark should be an i64"))
        })
        .collect()
}

/// Check the base row ids and default row commit versions of the adds in commit `version`, and
/// that the commit persisted `expected_high_water_mark` exactly once.
pub fn verify_row_tracking_in_commit(
    table_url: &Url,
    version: Version,
    expected_base_row_ids: Vec<i64>,
    expected_high_water_mark: i64,
) -> DeltaResult<()> {
    let actions = read_commit(table_url, version)?;

    let (base_row_ids, default_commit_versions): (Vec<_>, Vec<_>) = adds_in_commit(&actions)
        .into_iter()
        .map(|add| {
            let base_row_id = add["baseRowId"]
                .as_i64()
                .expect("Add action should have an i64 baseRowId");
            let default_commit_version = add["defaultRowCommitVersion"]
                .as_i64()
                .expect("Add action should have an i64 defaultRowCommitVersion");
            (base_row_id, default_commit_version)
        })
        .unzip();

    assert_eq!(base_row_ids, expected_base_row_ids);
    assert_eq!(
        default_commit_versions,
        vec![version as i64; default_commit_versions.len()]
    );
    assert_eq!(
        high_water_marks_in_commit(&actions)?,
        vec![expected_high_water_mark],
        "There must be exactly one row tracking domain metadata action"
    );
    Ok(())
}
