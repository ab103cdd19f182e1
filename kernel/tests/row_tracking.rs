use std::collections::HashMap;
use std::fs;
use std::io::Write as _;

use tempfile::tempdir;

use rowid_kernel::action_source::JsonActionSource;
use rowid_kernel::actions::{Action, Add, DomainMetadata, Remove};
use rowid_kernel::committer::FileSystemCommitter;
use rowid_kernel::row_tracking::RowTrackingDomainMetadata;
use rowid_kernel::transaction::CommitResult;
use rowid_kernel::{DeltaResult, Error, Snapshot};

mod common;
use common::{
    add_file, adds_in_commit, create_row_tracking_table, create_table,
    high_water_marks_in_commit, read_commit, verify_row_tracking_in_commit, write_files,
};

#[test_log::test]
fn test_row_tracking_append() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_append")?;

    assert!(write_files(&table_url, &[3, 3])?.is_committed());

    verify_row_tracking_in_commit(&table_url, 1, vec![0, 3], 5)?;

    let snapshot = Snapshot::builder_for(table_url).build()?;
    assert_eq!(snapshot.version(), 1);
    assert_eq!(
        RowTrackingDomainMetadata::get_high_water_mark(&snapshot)?,
        Some(5)
    );
    Ok(())
}

#[test_log::test]
fn test_row_tracking_single_record_files() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_single_records")?;

    assert!(write_files(&table_url, &[1; 5])?.is_committed());

    verify_row_tracking_in_commit(&table_url, 1, vec![0, 1, 2, 3, 4], 4)
}

#[test_log::test]
fn test_row_tracking_consecutive_transactions() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_consecutive")?;

    assert!(write_files(&table_url, &[3, 2])?.is_committed());
    assert!(write_files(&table_url, &[4])?.is_committed());
    assert!(write_files(&table_url, &[10, 1, 1])?.is_committed());

    verify_row_tracking_in_commit(&table_url, 1, vec![0, 3], 4)?;
    verify_row_tracking_in_commit(&table_url, 2, vec![5], 8)?;
    verify_row_tracking_in_commit(&table_url, 3, vec![9, 19, 20], 20)?;

    // time travel sees the high water mark as of each version
    let v2 = Snapshot::builder_for(table_url).at_version(2).build()?;
    assert_eq!(RowTrackingDomainMetadata::get_high_water_mark(&v2)?, Some(8));
    Ok(())
}

#[test_log::test]
fn test_row_tracking_with_empty_adds() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_empty_adds")?;

    assert!(write_files(&table_url, &[2, 0, 3])?.is_committed());
    verify_row_tracking_in_commit(&table_url, 1, vec![0, 2, 2], 4)?;

    // only empty files: ids are assigned but the high water mark does not move
    assert!(write_files(&table_url, &[0, 0])?.is_committed());
    let actions = read_commit(&table_url, 2)?;
    let base_row_ids: Vec<_> = adds_in_commit(&actions)
        .iter()
        .map(|add| add["baseRowId"].as_i64())
        .collect();
    assert_eq!(base_row_ids, vec![Some(5), Some(5)]);
    assert!(high_water_marks_in_commit(&actions)?.is_empty());
    Ok(())
}

#[test_log::test]
fn test_row_tracking_without_adds() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_without_adds")?;

    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let txn = snapshot
        .transaction(Box::new(FileSystemCommitter::new()))?
        .with_domain_metadata("app.settings".to_string(), "{}".to_string());
    assert!(txn.commit()?.is_committed());

    let actions = read_commit(&table_url, 1)?;
    assert!(actions[0].get("commitInfo").is_some());
    assert!(adds_in_commit(&actions).is_empty());
    assert!(high_water_marks_in_commit(&actions)?.is_empty());
    Ok(())
}

#[test_log::test]
fn test_row_tracking_parallel_transactions_conflict() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_parallel")?;

    // Create two transactions from the same snapshot (simulating parallel writers)
    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut txn1 = snapshot
        .clone()
        .transaction(Box::new(FileSystemCommitter::new()))?
        .with_engine_info("transaction 1");
    let mut txn2 = snapshot
        .transaction(Box::new(FileSystemCommitter::new()))?
        .with_engine_info("transaction 2");
    txn1.add_files(vec![add_file("txn1.parquet", 3)]);
    txn2.add_files(vec![add_file("txn2.parquet", 2)]);

    match txn1.commit()? {
        CommitResult::CommittedTransaction(committed) => {
            assert_eq!(committed.commit_version(), 1)
        }
        CommitResult::ConflictedTransaction(conflicted) => panic!(
            "First transaction should not conflict, got conflict at version {}",
            conflicted.conflict_version()
        ),
    }
    match txn2.commit()? {
        CommitResult::CommittedTransaction(committed) => panic!(
            "Second transaction should conflict, but got committed at version {}",
            committed.commit_version()
        ),
        CommitResult::ConflictedTransaction(conflicted) => {
            assert_eq!(conflicted.conflict_version(), 1)
        }
    }

    // the losing transaction left the winning commit untouched
    verify_row_tracking_in_commit(&table_url, 1, vec![0], 2)?;

    // retrying from a fresh snapshot continues after the winner's ids
    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut retry = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
    retry.add_files(vec![add_file("txn2.parquet", 2)]);
    assert!(retry.commit()?.is_committed());
    verify_row_tracking_in_commit(&table_url, 2, vec![3], 4)
}

#[test_log::test]
fn test_no_row_tracking_fields_without_feature() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_table(&tmp_dir, "test_no_feature", &[], HashMap::new())?;

    // no numRecords needed either
    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut txn = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
    txn.add_files(vec![Add::new("no-stats.parquet", 10, 0, true)]);
    assert!(txn.commit()?.is_committed());

    let actions = read_commit(&table_url, 1)?;
    let adds = adds_in_commit(&actions);
    assert_eq!(adds.len(), 1);
    assert!(adds[0].get("baseRowId").is_none());
    assert!(adds[0].get("defaultRowCommitVersion").is_none());
    assert!(high_water_marks_in_commit(&actions)?.is_empty());
    Ok(())
}

#[test_log::test]
fn test_suspended_row_tracking() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_table(
        &tmp_dir,
        "test_suspended",
        &["domainMetadata", "rowTracking"],
        HashMap::from([("delta.rowTrackingSuspended", "true")]),
    )?;

    assert!(write_files(&table_url, &[5])?.is_committed());
    let actions = read_commit(&table_url, 1)?;
    assert!(adds_in_commit(&actions)[0].get("baseRowId").is_none());
    assert!(high_water_marks_in_commit(&actions)?.is_empty());
    Ok(())
}

#[test_log::test]
fn test_preassigned_row_ids_are_kept_and_counted() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_preassigned")?;
    assert!(write_files(&table_url, &[10])?.is_committed());

    // e.g. a file copied from another table together with its row ids
    let copied = add_file("copied.parquet", 4)
        .with_base_row_id(100)
        .with_default_row_commit_version(7);
    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut txn = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
    txn.add_files(vec![copied, add_file("new.parquet", 2)]);
    assert!(txn.commit()?.is_committed());

    let actions = read_commit(&table_url, 2)?;
    let adds = adds_in_commit(&actions);
    assert_eq!(adds[0]["baseRowId"], 100);
    assert_eq!(adds[0]["defaultRowCommitVersion"], 7);
    assert_eq!(adds[1]["baseRowId"], 10);
    assert_eq!(adds[1]["defaultRowCommitVersion"], 2);
    // every add counts towards the high water mark: 9 + 4 + 2
    assert_eq!(high_water_marks_in_commit(&actions)?, vec![15]);
    Ok(())
}

#[test_log::test]
fn test_missing_stats_aborts_commit() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_missing_stats")?;

    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut txn = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
    txn.add_files(vec![
        add_file("ok.parquet", 1),
        Add::new("no-stats.parquet", 10, 0, true),
    ]);
    let result = txn.commit();
    assert!(matches!(
        result,
        Err(Error::RowIdAssignmentWithoutStats { ref path }) if path == "no-stats.parquet"
    ));

    // nothing was written
    assert_eq!(Snapshot::builder_for(table_url).build()?.version(), 0);
    Ok(())
}

#[test_log::test]
fn test_add_files_from_json_source() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_json_source")?;

    // staged adds that live on disk rather than in memory
    let staged = tmp_dir.path().join("staged_adds.json");
    let mut file = fs::File::create(&staged)?;
    for i in 0..100 {
        let add = Action::Add(add_file(&format!("part-{i:05}.parquet"), 10));
        writeln!(file, "{}", add.to_json_line()?)?;
    }
    drop(file);

    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut txn = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
    txn.add_files(JsonActionSource::new(&staged));
    assert!(txn.commit()?.is_committed());

    let expected: Vec<i64> = (0..100).map(|i| i * 10).collect();
    verify_row_tracking_in_commit(&table_url, 1, expected, 999)
}

#[test_log::test]
fn test_row_tracking_fields_in_remove_actions() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_remove")?;
    assert!(write_files(&table_url, &[5])?.is_committed());

    // read back the committed add and remove it
    let actions = read_commit(&table_url, 1)?;
    let add: Add = serde_json::from_value(adds_in_commit(&actions)[0].clone())?;
    assert_eq!(add.base_row_id, Some(0));

    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut txn = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
    txn.remove_files(vec![Remove::from_add(&add, 1677811180000, true)]);
    assert!(txn.commit()?.is_committed());

    let actions = read_commit(&table_url, 2)?;
    let remove = actions
        .iter()
        .find_map(|action| action.get("remove"))
        .expect("commit should contain a remove action");
    assert_eq!(remove["path"], add.path.as_str());
    assert_eq!(remove["baseRowId"], 0);
    assert_eq!(remove["defaultRowCommitVersion"], 1);
    // removing rows never moves the high water mark
    assert!(high_water_marks_in_commit(&actions)?.is_empty());
    Ok(())
}

#[test_log::test]
fn test_malformed_high_water_mark() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_malformed")?;

    // a historical writer spelled the field differently
    let commit = tmp_dir
        .path()
        .join("test_malformed/_delta_log/00000000000000000001.json");
    fs::write(
        commit,
        r#"{"domainMetadata":{"domain":"delta.rowTracking","configuration":"{\"rowIDHighWaterMark\":5}","removed":false}}"#,
    )?;

    let snapshot = Snapshot::builder_for(table_url).build()?;
    let mut txn = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
    txn.add_files(vec![add_file("a.parquet", 1)]);
    assert!(matches!(txn.commit(), Err(Error::MalformedJson(_))));
    Ok(())
}

#[test_log::test]
fn test_preassigned_negative_num_records_aborts_commit() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_negative_num_records")?;
    assert!(write_files(&table_url, &[10])?.is_committed());

    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut txn = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
    txn.add_files(vec![add_file("neg.parquet", -5).with_base_row_id(0)]);
    let result = txn.commit();
    assert!(
        matches!(&result, Err(e) if e.to_string().contains("numRecords must not be negative")),
        "{result:?}"
    );

    // the high water mark stays where it was
    let snapshot = Snapshot::builder_for(table_url).build()?;
    assert_eq!(snapshot.version(), 1);
    assert_eq!(
        RowTrackingDomainMetadata::get_high_water_mark(&snapshot)?,
        Some(9)
    );
    Ok(())
}

#[test_log::test]
fn test_staged_system_domain_metadata_rejected() -> DeltaResult<()> {
    let tmp_dir = tempdir()?;
    let table_url = create_row_tracking_table(&tmp_dir, "test_staged_domain_metadata")?;

    let snapshot = Snapshot::builder_for(table_url.clone()).build()?;
    let mut txn = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
    txn.add_files(vec![
        Action::Add(add_file("a.parquet", 3)),
        Action::DomainMetadata(DomainMetadata::new(
            "delta.rowTracking".to_string(),
            r#"{"rowIdHighWaterMark":-1}"#.to_string(),
        )),
    ]);
    let result = txn.commit();
    assert!(
        matches!(&result, Err(e) if e.to_string().contains("found a domainMetadata action")),
        "{result:?}"
    );
    assert_eq!(Snapshot::builder_for(table_url).build()?.version(), 0);
    Ok(())
}
