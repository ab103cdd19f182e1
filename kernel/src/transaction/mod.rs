//! Transactions stage changes to a table (new files, removed files, application transaction ids
//! and domain metadata) and commit them as the next version of the table.

use std::collections::HashSet;
use std::iter;

use tracing::{debug, info};

use crate::action_source::{ActionIterator, ActionSource, ChainedActionSource};
use crate::actions::{
    Action, CommitInfo, DomainMetadata, Remove, SetTransaction, INTERNAL_DOMAIN_PREFIX,
};
use crate::committer::{CommitMetadata, CommitResponse, Committer};
use crate::path::LogRoot;
use crate::row_tracking::{update_row_id_high_water_mark, RowTrackingActions};
use crate::snapshot::SnapshotRef;
use crate::utils::{current_time_ms, require};
use crate::{DeltaResult, Error, Version};

/// A transaction represents an in-progress write to a table. After creating a transaction, changes
/// to the table may be staged via the transaction methods before calling `commit` to commit the
/// changes to the table.
///
/// # Examples
///
/// ```rust,ignore
/// // create a transaction
/// let mut txn = snapshot.transaction(Box::new(FileSystemCommitter::new()))?;
/// // stage new files, each carrying its numRecords statistic
/// txn.add_files(vec![Add::new("part-0.parquet", 1024, 0, true).with_num_records(5)?]);
/// // commit! (consume the transaction)
/// txn.commit()?;
/// ```
pub struct Transaction {
    read_snapshot: SnapshotRef,
    committer: Box<dyn Committer>,
    operation: Option<String>,
    engine_info: Option<String>,
    // Sources staged by `add_files`, in call order. Only `add` actions are accepted from them.
    add_files: ChainedActionSource,
    remove_files: Vec<Remove>,
    // NB: we keep a Vec here and deduplicate in the commit method so the error can name the
    // offending app_id.
    set_transactions: Vec<SetTransaction>,
    // commit-wide timestamp (in milliseconds since epoch) used by `commitInfo` and `txn` actions
    commit_timestamp: i64,
    domain_metadata_additions: Vec<DomainMetadata>,
    // Domain names to remove in this transaction. The previous configuration is taken from the
    // read snapshot to fill in the tombstone.
    domain_removals: Vec<String>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!(
            "Transaction {{ read_snapshot version: {}, engine_info: {} }}",
            self.read_snapshot.version(),
            self.engine_info.is_some()
        ))
    }
}

impl Transaction {
    /// Create a new transaction from a snapshot. The snapshot will be used to read the current
    /// state of the table (e.g. to read the current version and row id high water mark).
    ///
    /// Instead of using this API, the more typical (user-facing) API is
    /// [Snapshot::transaction](crate::snapshot::Snapshot::transaction) to create a transaction from
    /// a snapshot.
    pub(crate) fn try_new(
        snapshot: impl Into<SnapshotRef>,
        committer: Box<dyn Committer>,
    ) -> DeltaResult<Self> {
        let read_snapshot = snapshot.into();

        // important! before writing to the table we must check it is supported
        read_snapshot
            .table_configuration()
            .ensure_write_supported()?;

        let commit_timestamp = current_time_ms()?;

        Ok(Transaction {
            read_snapshot,
            committer,
            operation: None,
            engine_info: None,
            add_files: ChainedActionSource::new(),
            remove_files: vec![],
            set_transactions: vec![],
            commit_timestamp,
            domain_metadata_additions: vec![],
            domain_removals: vec![],
        })
    }

    /// The snapshot this transaction reads from.
    pub fn read_snapshot(&self) -> &SnapshotRef {
        &self.read_snapshot
    }

    /// Consume the transaction and commit it to the table. The result is a result of
    /// [CommitResult] with the following semantics:
    /// - Ok(CommitResult) for either success or a conflict (includes the failed transaction in
    ///   case of a conflict so the user can inspect it)
    /// - Err(Error) indicates a non-retryable error (e.g. logic/validation error, or an add
    ///   without `numRecords` on a row tracking table). Nothing is written in that case.
    pub fn commit(self) -> DeltaResult<CommitResult> {
        let commit_version = self.commit_version()?;
        match self.commit_actions(commit_version)? {
            CommitResponse::Committed { version } => {
                info!(version, "Committed transaction");
                Ok(CommitResult::CommittedTransaction(
                    self.into_committed(version),
                ))
            }
            CommitResponse::Conflict { version } => {
                info!(version, "Transaction conflicted with an existing commit");
                Ok(CommitResult::ConflictedTransaction(
                    self.into_conflicted(version),
                ))
            }
        }
    }

    fn commit_version(&self) -> DeltaResult<Version> {
        self.read_snapshot
            .version()
            .checked_add(1)
            .ok_or_else(|| Error::overflow("Table version exceeds u64"))
    }

    fn commit_actions(&self, commit_version: Version) -> DeltaResult<CommitResponse> {
        // Step 1: Check for duplicate app_ids. The commit info must always be the first action in
        // the commit but we generate it later to fail early on duplicate transaction appIds.
        let mut app_ids = HashSet::new();
        if let Some(dup) = self
            .set_transactions
            .iter()
            .find(|t| !app_ids.insert(&t.app_id))
        {
            return Err(Error::generic(format!(
                "app_id {} already exists in transaction",
                dup.app_id
            )));
        }

        let table_configuration = self.read_snapshot.table_configuration();
        require!(
            !(!self.remove_files.is_empty() && table_configuration.is_append_only()),
            Error::unsupported("Cannot remove files from an append-only table (delta.appendOnly = true)")
        );

        // Adding and removing data in the same commit would need `cdc` files on a table with
        // change data feed enabled. Removes are known up front; adds are checked while streaming.
        let cdf_enabled = table_configuration
            .table_properties()
            .enable_change_data_feed
            .unwrap_or(false);
        let reject_data_change_adds =
            cdf_enabled && self.remove_files.iter().any(|remove| remove.data_change);

        // Step 2: Validate and generate user domain metadata actions
        let user_domain_actions = self.generate_user_domain_metadata_actions()?;

        // Step 3: Assign row ids to the staged files and compute the new high water mark. The
        // recompute pass runs before anything is written so a failure leaves no commit behind.
        let row_tracking_supported = table_configuration.should_write_row_tracking();
        let file_actions = RowTrackingActions::try_new(
            row_tracking_supported,
            &self.read_snapshot,
            commit_version,
            StagedFiles {
                add_files: &self.add_files,
                remove_files: &self.remove_files,
                reject_data_change_adds,
            },
        )?;
        let row_tracking_domain_metadata = update_row_id_high_water_mark(&file_actions)?;

        // Step 4: Commit info, then files, then `txn` actions, then all domain metadata
        let commit_info = CommitInfo::new(
            self.commit_timestamp,
            self.operation.clone(),
            self.engine_info.clone(),
        );
        let set_transaction_actions = self
            .set_transactions
            .iter()
            .cloned()
            .map(|txn| Ok(Action::SetTransaction(txn)));
        let domain_metadata_actions = user_domain_actions
            .into_iter()
            .chain(row_tracking_domain_metadata)
            .map(|dm| Ok(Action::DomainMetadata(dm)));
        let actions = iter::once(Ok(Action::CommitInfo(commit_info)))
            .chain(file_actions.actions()?)
            .chain(set_transaction_actions)
            .chain(domain_metadata_actions);

        // Step 5: Commit via the committer
        let log_root = LogRoot::new(self.read_snapshot.table_root())?;
        let commit_metadata = CommitMetadata::new(log_root, commit_version, self.commit_timestamp);
        debug!(commit_version, row_tracking_supported, "Committing transaction");
        self.committer.commit(Box::new(actions), commit_metadata)
    }

    /// Set the operation that this transaction is performing. This string will be persisted in the
    /// commit and visible to anyone who describes the table history.
    pub fn with_operation(mut self, operation: String) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Set the engine info field of this transaction's commit info action. This field is optional.
    pub fn with_engine_info(mut self, engine_info: impl Into<String>) -> Self {
        self.engine_info = Some(engine_info.into());
        self
    }

    /// Include a SetTransaction (app_id and version) action for this transaction.
    /// Note that each app_id can only appear once per transaction. If a duplicate app_id is
    /// included, the `commit` will fail (that is, we don't eagerly check app_id validity here).
    pub fn with_transaction_id(mut self, app_id: String, version: i64) -> Self {
        let set_transaction = SetTransaction::new(app_id, version, Some(self.commit_timestamp));
        self.set_transactions.push(set_transaction);
        self
    }

    /// Set domain metadata to be written to the Delta log.
    /// Note that each domain can only appear once per transaction. That is, multiple configurations
    /// of the same domain are disallowed in a single transaction, as well as setting and removing
    /// the same domain in a single transaction. If a duplicate domain is included, the commit will
    /// fail (that is, we don't eagerly check domain validity here).
    pub fn with_domain_metadata(mut self, domain: String, configuration: String) -> Self {
        self.domain_metadata_additions
            .push(DomainMetadata::new(domain, configuration));
        self
    }

    /// Remove domain metadata from the Delta log.
    /// If the domain exists in the read snapshot, this creates a tombstone to logically delete
    /// the domain. The tombstone preserves the previous configuration value.
    /// If the domain does not exist, this is a no-op. The same uniqueness rules as
    /// [`Transaction::with_domain_metadata`] apply.
    pub fn with_domain_metadata_removed(mut self, domain: String) -> Self {
        self.domain_removals.push(domain);
        self
    }

    /// Stage files to be added to the table. This can be called multiple times; the files are
    /// committed in call order, ahead of any removed files.
    ///
    /// `add_files` may be any re-iterable [`ActionSource`] (e.g. a `Vec<Add>`, or a
    /// [`JsonActionSource`] for more files than fit in memory). It is traversed twice during
    /// commit and must yield only `add` actions; any other action fails the commit. On tables that
    /// write row tracking information every add without a `baseRowId` must carry the
    /// `numRecords` statistic.
    ///
    /// [`JsonActionSource`]: crate::action_source::JsonActionSource
    pub fn add_files(&mut self, add_files: impl ActionSource + 'static) {
        self.add_files.push(Box::new(add_files));
    }

    /// Stage files to be removed from the table. Typically built with [`Remove::from_add`] so the
    /// removed rows keep their row ids. Removing files from an append-only table fails the commit,
    /// as does removing data alongside added data on a table with change data feed enabled.
    pub fn remove_files(&mut self, remove_files: Vec<Remove>) {
        self.remove_files.extend(remove_files);
    }

    /// Validate that user domains don't conflict with system domains or each other.
    fn validate_user_domain_operations(&self) -> DeltaResult<()> {
        let mut seen_domains = HashSet::new();
        let domains = self
            .domain_metadata_additions
            .iter()
            .map(DomainMetadata::domain)
            .chain(self.domain_removals.iter().map(String::as_str));
        for domain in domains {
            if domain.starts_with(INTERNAL_DOMAIN_PREFIX) {
                return Err(Error::generic(
                    "Cannot modify domains that start with 'delta.' as those are system controlled",
                ));
            }
            if !seen_domains.insert(domain) {
                return Err(Error::generic(format!(
                    "Metadata for domain {domain} already specified in this transaction"
                )));
            }
        }
        Ok(())
    }

    /// Generate the user domain metadata actions of this transaction: additions first, then
    /// tombstones for removed domains that exist in the read snapshot.
    fn generate_user_domain_metadata_actions(&self) -> DeltaResult<Vec<DomainMetadata>> {
        if self.domain_metadata_additions.is_empty() && self.domain_removals.is_empty() {
            return Ok(vec![]);
        }
        require!(
            self.read_snapshot
                .table_configuration()
                .is_domain_metadata_supported(),
            Error::unsupported(
                "Domain metadata operations require writer version 7 and the 'domainMetadata' writer feature"
            )
        );
        self.validate_user_domain_operations()?;

        let removals = self.domain_removals.iter().filter_map(|domain| {
            // a domain that doesn't exist in the snapshot needs no tombstone
            self.read_snapshot
                .domain_metadata_configuration(domain)
                .map(|existing| DomainMetadata::remove(domain.clone(), existing.to_owned()))
        });
        Ok(self
            .domain_metadata_additions
            .iter()
            .cloned()
            .chain(removals)
            .collect())
    }

    fn into_committed(self, commit_version: Version) -> CommittedTransaction {
        CommittedTransaction {
            transaction: self,
            commit_version,
        }
    }

    fn into_conflicted(self, conflict_version: Version) -> ConflictedTransaction {
        ConflictedTransaction {
            transaction: self,
            conflict_version,
        }
    }
}

/// The file actions of a transaction: the staged adds, then the staged removes.
struct StagedFiles<'a> {
    add_files: &'a ChainedActionSource,
    remove_files: &'a [Remove],
    reject_data_change_adds: bool,
}

impl StagedFiles<'_> {
    fn check_staged_add(&self, action: Action) -> DeltaResult<Action> {
        let add = match action {
            Action::Add(add) => add,
            action => {
                return Err(Error::generic(format!(
                    "Only add actions can be staged with add_files, found a {} action",
                    action.action_type()
                )))
            }
        };
        require!(
            !(self.reject_data_change_adds && add.data_change),
            Error::generic(format!(
                "Cannot add and remove data in the same transaction when Change Data Feed is \
                 enabled (delta.enableChangeDataFeed = true). Adding {} would require writing CDC \
                 files, which is not supported. Use separate transactions to add and remove files.",
                add.path
            ))
        );
        Ok(Action::Add(add))
    }
}

impl ActionSource for StagedFiles<'_> {
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        let adds = self
            .add_files
            .actions()?
            .map(|action| action.and_then(|action| self.check_staged_add(action)));
        let removes = self
            .remove_files
            .iter()
            .cloned()
            .map(|remove| Ok(Action::Remove(remove)));
        Ok(Box::new(adds.chain(removes)))
    }
}

/// The result of attempting to commit this transaction. If the commit was successful or
/// conflicted, the result is Ok(CommitResult), otherwise, if a nonrecoverable error occurred, the
/// result is Err(Error).
///
/// The commit result can be one of the following:
/// - [CommittedTransaction]: the transaction was successfully committed.
/// - [ConflictedTransaction]: the transaction conflicted with an existing version. Row ids were
///   assigned against a stale high water mark, so the caller must create a new transaction from a
///   fresh snapshot before retrying.
#[derive(Debug)]
#[must_use]
pub enum CommitResult {
    /// The transaction was successfully committed.
    CommittedTransaction(CommittedTransaction),
    /// This transaction conflicted with an existing version (see
    /// [ConflictedTransaction::conflict_version]). The transaction is returned so the caller can
    /// resolve the conflict.
    ConflictedTransaction(ConflictedTransaction),
}

impl CommitResult {
    /// Returns true if the commit was successful.
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitResult::CommittedTransaction(_))
    }
}

/// This is the result of a successfully committed [Transaction].
#[derive(Debug)]
pub struct CommittedTransaction {
    transaction: Transaction,
    /// the version of the table that was just committed
    commit_version: Version,
}

impl CommittedTransaction {
    /// The version of the table that was just sucessfully committed
    pub fn commit_version(&self) -> Version {
        self.commit_version
    }

    /// The committed transaction.
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }
}

/// This is the result of a conflicted [Transaction]. One can retrieve the [conflict version] from
/// this struct.
///
/// [conflict version]: Self::conflict_version
#[derive(Debug)]
pub struct ConflictedTransaction {
    transaction: Transaction,
    conflict_version: Version,
}

impl ConflictedTransaction {
    /// The version attempted commit that yielded a conflict
    pub fn conflict_version(&self) -> Version {
        self.conflict_version
    }

    /// The transaction that conflicted, unchanged.
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }
}
